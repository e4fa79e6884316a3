use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use shield::Shield;
use shield::analysis::{self, DistStats, LedgerViolation, RunDistribution};
use shield::commands::{self, JournalResult};
use shield::config::ShieldConfig;
use shield::evidence::FsEvidenceStore;
use shield::ledger::{LedgerStore, MemoryLedger};
use shield::records::RiskPoolMetrics;
use shield::scenario::{self, ScenarioReport};

#[derive(Parser)]
#[command(name = "shield", version, about = "Freelancer risk pool administration")]
struct Cli {
    /// TOML file overlaid on the canonical config.
    #[arg(long, global = true, env = "SHIELD_CONFIG")]
    config: Option<PathBuf>,

    /// Suppress tables; only errors are printed.
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Execute NDJSON requests against a ledger file and journal the results.
    Replay {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "ledger.json")]
        ledger: PathBuf,
        #[arg(long, default_value = "journal.ndjson")]
        journal: PathBuf,
    },
    /// Run the seeded synthetic workload, once or across many seeds.
    Simulate {
        #[arg(long)]
        seed: Option<u64>,
        /// Number of consecutive seeds to run in parallel.
        #[arg(long)]
        runs: Option<u64>,
        /// Save the ledger of a single run.
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Per-run results as CSV (multi-run only).
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print the latest pool metrics of a ledger file.
    Metrics {
        #[arg(long, default_value = "ledger.json")]
        ledger: PathBuf,
        /// Also list this many most recent snapshots.
        #[arg(long)]
        history: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Scenario runs emit one info line per operation; keep them quiet by default.
    let default_filter = match cli.command {
        Cmd::Simulate { .. } => "warn",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ShieldConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ShieldConfig::canonical(),
    };

    match cli.command {
        Cmd::Replay { input, ledger, journal } => {
            replay(config, &input, &ledger, &journal, cli.quiet)
        }
        Cmd::Simulate { seed, runs, ledger, csv } => {
            let start_seed = seed.unwrap_or(config.scenario.seed);
            match runs {
                Some(n) => simulate_many(&config, start_seed, n, csv.as_deref(), cli.quiet),
                None => simulate_one(&config, start_seed, ledger.as_deref(), cli.quiet),
            }
        }
        Cmd::Metrics { ledger, history } => metrics(&ledger, history),
    }
}

// ── replay ────────────────────────────────────────────────────────────────────

fn replay(
    config: ShieldConfig,
    input: &Path,
    ledger_path: &Path,
    journal_path: &Path,
    quiet: bool,
) -> Result<()> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let requests = commands::read_requests(BufReader::new(file))?;

    let ledger = MemoryLedger::load(ledger_path)
        .with_context(|| format!("loading ledger {}", ledger_path.display()))?;
    let evidence = FsEvidenceStore::new(config.evidence_dir.clone());
    let mut shield = Shield::new(ledger, Box::new(evidence), config);

    let journal = shield.replay(requests);

    let out = File::create(journal_path)
        .with_context(|| format!("creating {}", journal_path.display()))?;
    commands::write_journal(BufWriter::new(out), &journal)?;
    shield
        .ledger()
        .save(ledger_path)
        .with_context(|| format!("saving ledger {}", ledger_path.display()))?;

    if !quiet {
        let accepted = journal.iter().filter(|e| e.is_ok()).count();
        println!("Requests: {} accepted, {} rejected", accepted, journal.len() - accepted);
        for entry in &journal {
            if let JournalResult::Err { kind, message } = &entry.result {
                println!("  #{:<5} {:<20} {:?}: {message}", entry.seq, entry.command.name(), kind);
            }
        }
        if let Some(snapshot) = shield.ledger().latest_metrics()? {
            print_metrics(&snapshot);
        }
        print_audit(&analysis::verify_ledger(shield.ledger())?);
    }
    Ok(())
}

// ── simulate ──────────────────────────────────────────────────────────────────

fn simulate_one(
    config: &ShieldConfig,
    seed: u64,
    ledger_path: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let (shield, report) = scenario::run_seed(config, seed)?;
    if let Some(path) = ledger_path {
        shield.ledger().save(path).with_context(|| format!("saving ledger {}", path.display()))?;
    }
    if !quiet {
        let s = &report.stats;
        println!(
            "Seed {seed}: {} users, {} policies, {} claims ({} paid, {} rejected), {} expired",
            s.users,
            s.policies,
            s.claims_filed,
            s.claims_paid,
            s.claims_rejected,
            s.policies_expired
        );
        println!(
            "  withdrawals: {} requested, {} completed, {} rejected",
            s.withdrawals_requested, s.withdrawals_completed, s.withdrawals_rejected
        );
        if let Some(snapshot) = shield.ledger().latest_metrics()? {
            print_metrics(&snapshot);
        }
        print_audit(&analysis::verify_ledger(shield.ledger())?);
    }
    Ok(())
}

fn simulate_many(
    config: &ShieldConfig,
    start_seed: u64,
    n: u64,
    csv: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let reports: Vec<ScenarioReport> = (0..n)
        .into_par_iter()
        .map(|i| scenario::run_seed(config, start_seed + i).map(|(_, report)| report))
        .collect::<shield::Result<_>>()?;

    if let Some(path) = csv {
        write_runs_csv(&reports, path)?;
    }
    if quiet {
        return Ok(());
    }

    println!("\n=== Per-Run Results ===");
    println!(
        "{:>6} | {:>12} | {:>8} | {:>6} | {:>7} | {:>7} | {:>6}",
        "Seed", "Capital($)", "Reserve", "Risk", "Claims#", "Paid#", "Wdr#"
    );
    println!("{}", "-".repeat(70));
    for r in &reports {
        println!(
            "{:>6} | {:>12.2} | {:>8.3} | {:>6.3} | {:>7} | {:>7} | {:>6}",
            r.seed,
            r.metrics.total_capital as f64 / 100.0,
            r.metrics.reserve_ratio,
            r.metrics.risk_score,
            r.stats.claims_filed,
            r.stats.claims_paid,
            r.stats.withdrawals_completed,
        );
    }

    match analysis::analyse_runs(&reports) {
        Some(dist) => print_distribution(&dist),
        None => eprintln!("Warning: Distribution requires >= 2 runs"),
    }
    Ok(())
}

fn write_runs_csv(reports: &[ScenarioReport], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(
        w,
        "seed,total_capital,coverage_liability,premiums,claims_paid,reserve_ratio,risk_score,\
         active_policies,claims_filed,withdrawals_completed"
    )?;
    for r in reports {
        let m = &r.metrics;
        writeln!(
            w,
            "{},{},{},{},{},{:.6},{:.6},{},{},{}",
            r.seed,
            m.total_capital,
            m.total_coverage_liability,
            m.total_premiums_collected,
            m.total_claims_paid,
            m.reserve_ratio,
            m.risk_score,
            m.active_policies_count,
            r.stats.claims_filed,
            r.stats.withdrawals_completed,
        )?;
    }
    w.flush()?;
    Ok(())
}

// ── metrics ───────────────────────────────────────────────────────────────────

fn metrics(ledger_path: &Path, history: Option<usize>) -> Result<()> {
    if !ledger_path.exists() {
        anyhow::bail!("no ledger at {}", ledger_path.display());
    }
    let ledger = MemoryLedger::load(ledger_path)
        .with_context(|| format!("loading ledger {}", ledger_path.display()))?;
    match ledger.latest_metrics()? {
        Some(snapshot) => print_metrics(&snapshot),
        None => println!("No metrics snapshot recorded yet."),
    }
    if let Some(limit) = history {
        println!("\n=== Snapshot history (newest first) ===");
        println!(
            "{:>6} | {:>25} | {:>12} | {:>8} | {:>6}",
            "Id", "Snapshot date", "Capital($)", "Reserve", "Risk"
        );
        for s in ledger.metrics_history(limit)? {
            println!(
                "{:>6} | {:>25} | {:>12.2} | {:>8.3} | {:>6.3}",
                s.id,
                s.snapshot_date.format("%Y-%m-%d %H:%M:%S%.3f"),
                s.values.total_capital as f64 / 100.0,
                s.values.reserve_ratio,
                s.values.risk_score,
            );
        }
    }
    Ok(())
}

// ── output ────────────────────────────────────────────────────────────────────

fn print_metrics(snapshot: &RiskPoolMetrics) {
    let v = &snapshot.values;
    println!(
        "\n=== Risk pool (snapshot {} at {}) ===",
        snapshot.id,
        snapshot.snapshot_date.to_rfc3339()
    );
    println!("  Total capital:        {:>14.2}", v.total_capital as f64 / 100.0);
    println!("  Coverage liability:   {:>14.2}", v.total_coverage_liability as f64 / 100.0);
    println!("  Premiums collected:   {:>14.2}", v.total_premiums_collected as f64 / 100.0);
    println!("  Claims paid:          {:>14.2}", v.total_claims_paid as f64 / 100.0);
    println!("  Reserve ratio:        {:>14.4}", v.reserve_ratio);
    println!("  Risk score:           {:>14.4}", v.risk_score);
    println!("  Active policies:      {:>14}", v.active_policies_count);
    println!("  Pending claims:       {:>14}", v.pending_claims_count);
}

fn print_audit(violations: &[LedgerViolation]) {
    if violations.is_empty() {
        println!("\nLedger audit: PASS");
        return;
    }
    println!(
        "\nLedger audit: FAIL ({} violation(s), run shield-audit for detail)",
        violations.len()
    );
    for v in violations.iter().take(10) {
        println!("  {v}");
    }
}

fn print_dist_row(label: &str, ds: &DistStats) {
    println!(
        "{:<12} | {:>9.3} | {:>9.3} | {:>9.3} | {:>9.3} | {:>9.3} | {:>9.3} | {:>9.3} | {:>9.3} | {:>9.3}",
        label, ds.min, ds.p5, ds.p25, ds.p50, ds.p75, ds.p95, ds.max, ds.mean, ds.std_dev,
    );
}

fn print_distribution(dist: &RunDistribution) {
    println!("\n=== Multi-Run Distribution (N={} runs) ===", dist.runs);
    println!(
        "{:<12} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9}",
        "Metric", "min", "p5", "p25", "p50", "p75", "p95", "max", "mean", "stddev"
    );
    print_dist_row("Capital($)", &dist.total_capital);
    print_dist_row("Reserve", &dist.reserve_ratio);
    print_dist_row("Risk", &dist.risk_score);
    print_dist_row("Paid($)", &dist.claims_paid);

    println!("\n--- Discrete Counts (p50 | max | mean) ---");
    println!(
        "  Claims filed:          {:>6} | {:>6} | {:>8.2}",
        dist.claims_filed.p50, dist.claims_filed.max, dist.claims_filed.mean
    );
    println!(
        "  Withdrawals completed: {:>6} | {:>6} | {:>8.2}",
        dist.withdrawals_completed.p50,
        dist.withdrawals_completed.max,
        dist.withdrawals_completed.mean
    );
}
