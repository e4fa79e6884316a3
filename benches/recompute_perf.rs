
use chrono::Utc;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use shield::ledger::LedgerStore;
use shield::metrics::{self, PoolTotals};
use shield::riskpool::UserBalance;
use shield::scenario;
use shield::types::UserId;

use fixtures::{LARGE, MEDIUM, SMALL, Scale, build_ledger, config_for};

fn scales() -> [(&'static str, Scale); 3] {
    [("small", SMALL), ("medium", MEDIUM), ("large", LARGE)]
}

fn record_count(scale: &Scale) -> u64 {
    (scale.freelancers * scale.policies_per_freelancer + scale.backers) as u64
}

// ── Group 1: gather: aggregate scan over the whole ledger ────────────────────

fn bench_gather(c: &mut Criterion) {
    let mut group = c.benchmark_group("gather");
    for (name, scale) in scales() {
        let ledger = build_ledger(&scale, 42);
        group.throughput(Throughput::Elements(record_count(&scale)));
        group.bench_with_input(BenchmarkId::from_parameter(name), &ledger, |b, ledger| {
            b.iter(|| PoolTotals::gather(ledger).map(|t| t.derive()))
        });
    }
    group.finish();
}

// ── Group 2: recompute: gather plus snapshot append ──────────────────────────

fn bench_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute");
    for (name, scale) in scales() {
        let ledger = build_ledger(&scale, 42);
        group.throughput(Throughput::Elements(record_count(&scale)));
        group.bench_with_input(BenchmarkId::from_parameter(name), &ledger, |b, ledger| {
            b.iter_batched(
                || ledger.clone(),
                |mut ledger| metrics::recompute(&mut ledger, Utc::now()),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

// ── Group 3: user_balance: per-user withdrawal authorization scan ────────────

fn bench_user_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("user_balance");
    for (name, scale) in scales() {
        let ledger = build_ledger(&scale, 42);
        // Backers are registered right after the scenario admin.
        let backer = UserId(2);
        group.bench_with_input(BenchmarkId::from_parameter(name), &ledger, |b, ledger| {
            b.iter(|| UserBalance::gather(ledger, backer).map(|bal| bal.available()))
        });
    }
    group.finish();
}

// ── Group 4: scenario: end-to-end seeded workload ────────────────────────────

fn bench_scenario(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenario");
    group.sample_size(10);
    for (name, scale) in [("small", SMALL), ("medium", MEDIUM)] {
        let config = config_for(&scale);
        group.bench_with_input(BenchmarkId::from_parameter(name), &config, |b, config| {
            b.iter(|| {
                let (shield, report) = scenario::run_seed(config, 7).expect("scenario run");
                (shield.ledger().latest_metrics().is_ok(), report.stats.claims_filed)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_gather, bench_recompute, bench_user_balance, bench_scenario);
criterion_main!(benches);
