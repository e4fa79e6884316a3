//! Ledger audit and cross-run statistics.
//!
//! [`verify_ledger`] checks the invariants every committed ledger must hold,
//! whatever sequence of operations produced it. [`analyse_runs`] summarises
//! the final pool figures of many seeded scenario runs.

use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::ledger::{ClaimFilter, DepositFilter, LedgerStore, PolicyFilter, WithdrawalFilter};
use crate::metrics::PoolTotals;
use crate::records::{ClaimStatus, Policy};
use crate::riskpool::UserBalance;
use crate::scenario::ScenarioReport;
use crate::types::{PolicyId, UserId};

// ── Integrity audit ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerViolation {
    /// The ledger holds policies or deposits but no metrics snapshot.
    MissingSnapshot,
    /// The latest snapshot's capital or policy figures disagree with a fresh
    /// recomputation.
    StaleSnapshot { snapshot_id: u64, detail: String },
    ClaimWithoutPolicy { claim_id: u64, policy_id: u64 },
    ClaimExceedsCoverage { claim_id: u64, policy_id: u64, amount: u64, coverage: u64 },
    ZeroAmount { entity: &'static str, id: u64 },
    PolicyWithoutCreationHistory { policy_id: u64 },
    /// Pending plus completed withdrawals exceed the user's active deposits.
    OverdrawnBalance { user_id: u64, reserved: u64, deposits: u64 },
    PaidWithoutResolutionTime { claim_id: u64 },
}

impl std::fmt::Display for LedgerViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSnapshot => write!(f, "MissingSnapshot"),
            Self::StaleSnapshot { snapshot_id, detail } => {
                write!(f, "StaleSnapshot snapshot={snapshot_id}: {detail}")
            }
            Self::ClaimWithoutPolicy { claim_id, policy_id } => {
                write!(f, "ClaimWithoutPolicy claim={claim_id} policy={policy_id}")
            }
            Self::ClaimExceedsCoverage { claim_id, policy_id, amount, coverage } => {
                write!(
                    f,
                    "ClaimExceedsCoverage claim={claim_id} policy={policy_id} \
                     amount={amount} coverage={coverage}"
                )
            }
            Self::ZeroAmount { entity, id } => write!(f, "ZeroAmount {entity}={id}"),
            Self::PolicyWithoutCreationHistory { policy_id } => {
                write!(f, "PolicyWithoutCreationHistory policy={policy_id}")
            }
            Self::OverdrawnBalance { user_id, reserved, deposits } => {
                write!(f, "OverdrawnBalance user={user_id} reserved={reserved} deposits={deposits}")
            }
            Self::PaidWithoutResolutionTime { claim_id } => {
                write!(f, "PaidWithoutResolutionTime claim={claim_id}")
            }
        }
    }
}

/// Check every ledger invariant. Returns one item per violation found.
pub fn verify_ledger<L: LedgerStore>(ledger: &L) -> Result<Vec<LedgerViolation>> {
    let mut violations = Vec::new();

    let policies: HashMap<PolicyId, Policy> = ledger
        .find_policies(&PolicyFilter::default())?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let claims = ledger.find_claims(&ClaimFilter::default())?;
    let deposits = ledger.find_deposits(&DepositFilter::default())?;
    let withdrawals = ledger.find_withdrawals(&WithdrawalFilter::default())?;

    // ── Snapshot ──────────────────────────────────────────────────────────────
    match ledger.latest_metrics()? {
        None if !policies.is_empty() || !deposits.is_empty() => {
            violations.push(LedgerViolation::MissingSnapshot);
        }
        None => {}
        Some(snapshot) => {
            // Only capital and policy figures are compared. Claim figures lag
            // status changes that do not recompute, such as `disputed`.
            let fresh = PoolTotals::gather(ledger)?.derive();
            let recorded = &snapshot.values;
            if recorded.total_capital != fresh.total_capital
                || recorded.total_coverage_liability != fresh.total_coverage_liability
                || recorded.total_premiums_collected != fresh.total_premiums_collected
                || recorded.active_policies_count != fresh.active_policies_count
            {
                violations.push(LedgerViolation::StaleSnapshot {
                    snapshot_id: snapshot.id.0,
                    detail: format!(
                        "recorded capital={} liability={} premiums={} active={}, \
                         expected capital={} liability={} premiums={} active={}",
                        recorded.total_capital,
                        recorded.total_coverage_liability,
                        recorded.total_premiums_collected,
                        recorded.active_policies_count,
                        fresh.total_capital,
                        fresh.total_coverage_liability,
                        fresh.total_premiums_collected,
                        fresh.active_policies_count,
                    ),
                });
            }
        }
    }

    // ── Policies ──────────────────────────────────────────────────────────────
    let mut policy_ids: Vec<&PolicyId> = policies.keys().collect();
    policy_ids.sort();
    for &id in policy_ids {
        let policy = &policies[&id];
        if policy.premium_amount == 0 || policy.coverage_amount == 0 {
            violations.push(LedgerViolation::ZeroAmount { entity: "policy", id: id.0 });
        }
        let created = ledger
            .find_history(id)?
            .iter()
            .any(|h| h.previous_status.is_none());
        if !created {
            violations.push(LedgerViolation::PolicyWithoutCreationHistory { policy_id: id.0 });
        }
    }

    // ── Claims ────────────────────────────────────────────────────────────────
    for claim in &claims {
        if claim.claim_amount == 0 {
            violations.push(LedgerViolation::ZeroAmount { entity: "claim", id: claim.id.0 });
        }
        match policies.get(&claim.policy_id) {
            None => violations.push(LedgerViolation::ClaimWithoutPolicy {
                claim_id: claim.id.0,
                policy_id: claim.policy_id.0,
            }),
            Some(policy) if claim.claim_amount > policy.coverage_amount => {
                violations.push(LedgerViolation::ClaimExceedsCoverage {
                    claim_id: claim.id.0,
                    policy_id: policy.id.0,
                    amount: claim.claim_amount,
                    coverage: policy.coverage_amount,
                });
            }
            Some(_) => {}
        }
        if claim.status == ClaimStatus::Paid && claim.resolution_time.is_none() {
            violations.push(LedgerViolation::PaidWithoutResolutionTime { claim_id: claim.id.0 });
        }
    }

    // ── Capital ───────────────────────────────────────────────────────────────
    for d in deposits.iter().filter(|d| d.amount == 0) {
        violations.push(LedgerViolation::ZeroAmount { entity: "deposit", id: d.id.0 });
    }
    for w in withdrawals.iter().filter(|w| w.amount == 0) {
        violations.push(LedgerViolation::ZeroAmount { entity: "withdrawal", id: w.id.0 });
    }
    let users: BTreeSet<UserId> = withdrawals.iter().map(|w| w.user_id).collect();
    for user_id in users {
        let balance = UserBalance::gather(ledger, user_id)?;
        if balance.reserved() > balance.deposits {
            violations.push(LedgerViolation::OverdrawnBalance {
                user_id: user_id.0,
                reserved: balance.reserved(),
                deposits: balance.deposits,
            });
        }
    }

    Ok(violations)
}

// ── Cross-run distributions ───────────────────────────────────────────────────

/// Distribution statistics for a continuous metric across N scenario runs.
#[derive(Debug, Clone)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Distribution statistics for a sparse integer count metric (p50 + max are sufficient).
#[derive(Debug, Clone)]
pub struct CountDist {
    pub n: usize,
    pub p50: u64,
    pub max: u64,
    pub mean: f64,
}

#[derive(Debug, Clone)]
pub struct RunDistribution {
    pub runs: usize,
    /// Capital in major units (cents / 100).
    pub total_capital: DistStats,
    pub reserve_ratio: DistStats,
    pub risk_score: DistStats,
    pub claims_paid: DistStats,
    pub claims_filed: CountDist,
    pub withdrawals_completed: CountDist,
}

fn percentile_stats(values: &mut [f64]) -> Option<DistStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();

    let interp = |p: f64| -> f64 {
        let h = p * (n - 1) as f64;
        let lo = h.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = h - lo as f64;
        values[lo] * (1.0 - frac) + values[hi] * frac
    };

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };

    Some(DistStats {
        n,
        min: values[0],
        p5: interp(0.05),
        p25: interp(0.25),
        p50: interp(0.50),
        p75: interp(0.75),
        p95: interp(0.95),
        max: values[n - 1],
        mean,
        std_dev: variance.sqrt(),
    })
}

fn count_dist(values: &mut [u64]) -> Option<CountDist> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let n = values.len();
    let mean = values.iter().map(|&x| x as f64).sum::<f64>() / n as f64;

    let h = 0.5 * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    let p50 = (values[lo] as f64 * (1.0 - frac) + values[hi] as f64 * frac).round() as u64;

    Some(CountDist { n, p50, max: values[n - 1], mean })
}

/// Cross-run distribution of final pool figures. `None` with fewer than two
/// runs.
pub fn analyse_runs(reports: &[ScenarioReport]) -> Option<RunDistribution> {
    if reports.len() < 2 {
        return None;
    }
    let continuous = |f: fn(&ScenarioReport) -> f64| -> Option<DistStats> {
        let mut values: Vec<f64> = reports.iter().map(f).collect();
        percentile_stats(&mut values)
    };
    let count = |f: fn(&ScenarioReport) -> u64| -> Option<CountDist> {
        let mut values: Vec<u64> = reports.iter().map(f).collect();
        count_dist(&mut values)
    };

    Some(RunDistribution {
        runs: reports.len(),
        total_capital: continuous(|r| r.metrics.total_capital as f64 / 100.0)?,
        reserve_ratio: continuous(|r| r.metrics.reserve_ratio)?,
        risk_score: continuous(|r| r.metrics.risk_score)?,
        claims_paid: continuous(|r| r.metrics.total_claims_paid as f64 / 100.0)?,
        claims_filed: count(|r| r.stats.claims_filed)?,
        withdrawals_completed: count(|r| r.stats.withdrawals_completed)?,
    })
}
