//! Ledger auditor for shield ledger files.
//!
//! Loads `ledger.json` (or the first positional argument), then prints:
//!   Invariants: PASS/FAIL per ledger invariant, followed by each violation
//!   Contents:   record counts by status and the latest pool snapshot
//!
//! Exits non-zero when any invariant fails.

use std::collections::BTreeMap;
use std::path::PathBuf;

use shield::{
    analysis::{LedgerViolation, verify_ledger},
    ledger::{
        ClaimFilter, DepositFilter, LedgerStore, MemoryLedger, PolicyFilter, WithdrawalFilter,
    },
};

fn main() {
    // ── Resolve ledger path: first positional arg, else default ──────────────
    let ledger_path =
        PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "ledger.json".to_string()));

    if !ledger_path.exists() {
        eprintln!("error: no ledger at {}", ledger_path.display());
        eprintln!("Run `shield replay` or `shield simulate --ledger` first to produce one.");
        std::process::exit(1);
    }
    let ledger = MemoryLedger::load(&ledger_path).unwrap_or_else(|e| {
        eprintln!("error: cannot load {}: {e}", ledger_path.display());
        std::process::exit(1);
    });

    let violations = verify_ledger(&ledger).unwrap_or_else(|e| {
        eprintln!("error: audit failed: {e}");
        std::process::exit(1);
    });

    // ── Invariants ───────────────────────────────────────────────────────────
    println!("=== Ledger Invariants ===");

    let has = |f: fn(&LedgerViolation) -> bool| violations.iter().any(f);

    fn status(fail: bool) -> &'static str {
        if fail { "FAIL" } else { "PASS" }
    }

    use LedgerViolation as V;
    let rows = [
        ("Metrics snapshot recorded", has(|v| matches!(v, V::MissingSnapshot))),
        ("Capital and policy figures current", has(|v| matches!(v, V::StaleSnapshot { .. }))),
        ("Every claim references a policy", has(|v| matches!(v, V::ClaimWithoutPolicy { .. }))),
        ("Claim amount ≤ policy coverage", has(|v| matches!(v, V::ClaimExceedsCoverage { .. }))),
        ("Monetary amounts > 0", has(|v| matches!(v, V::ZeroAmount { .. }))),
        (
            "Policy creation in history",
            has(|v| matches!(v, V::PolicyWithoutCreationHistory { .. })),
        ),
        ("Withdrawals ≤ deposits per user", has(|v| matches!(v, V::OverdrawnBalance { .. }))),
        (
            "Paid claims carry resolution time",
            has(|v| matches!(v, V::PaidWithoutResolutionTime { .. })),
        ),
    ];
    for (i, (label, fail)) in rows.iter().enumerate() {
        println!("  [{}] Inv {} — {label}", status(*fail), i + 1);
    }

    if !violations.is_empty() {
        println!("\n  Violations ({}):", violations.len());
        for v in &violations {
            println!("    {v}");
        }
    }

    // ── Contents ─────────────────────────────────────────────────────────────
    if let Err(e) = print_contents(&ledger) {
        eprintln!("error: cannot read ledger: {e}");
        std::process::exit(1);
    }

    if !violations.is_empty() {
        std::process::exit(1);
    }
}

fn print_contents(ledger: &MemoryLedger) -> shield::Result<()> {
    println!("\n=== Ledger Contents ===");

    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    for p in ledger.find_policies(&PolicyFilter::default())? {
        *by_status.entry(p.status.to_string()).or_default() += 1;
    }
    println!("  Policies: {}", fmt_counts(&by_status));

    by_status.clear();
    for c in ledger.find_claims(&ClaimFilter::default())? {
        *by_status.entry(c.status.to_string()).or_default() += 1;
    }
    println!("  Claims:   {}", fmt_counts(&by_status));

    by_status.clear();
    for w in ledger.find_withdrawals(&WithdrawalFilter::default())? {
        *by_status.entry(w.status.to_string()).or_default() += 1;
    }
    println!("  Withdrawals: {}", fmt_counts(&by_status));

    let deposits = ledger.find_deposits(&DepositFilter::default())?;
    let active = ledger.sum_deposits(&DepositFilter::active())?;
    println!(
        "  Deposits: {} ({} active, {:.2} total active)",
        deposits.len(),
        deposits.iter().filter(|d| d.is_active).count(),
        active as f64 / 100.0,
    );

    match ledger.latest_metrics()? {
        None => println!("  Latest snapshot: none"),
        Some(s) => {
            let v = &s.values;
            println!(
                "  Latest snapshot #{} at {}: capital={:.2} liability={:.2} reserve={:.3} risk={:.3} active={} pending={}",
                s.id,
                s.snapshot_date.to_rfc3339(),
                v.total_capital as f64 / 100.0,
                v.total_coverage_liability as f64 / 100.0,
                v.reserve_ratio,
                v.risk_score,
                v.active_policies_count,
                v.pending_claims_count,
            );
        }
    }
    Ok(())
}

fn fmt_counts(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    counts.iter().map(|(k, n)| format!("{k}={n}")).collect::<Vec<_>>().join(" ")
}
