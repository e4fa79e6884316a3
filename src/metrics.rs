//! Risk pool metrics aggregator.
//!
//! Every call re-reads the whole ledger and derives a fresh snapshot; nothing
//! is carried over from the previous snapshot. Calling [`recompute`] twice
//! without an intervening ledger write yields equal [`PoolMetrics`].

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;
use crate::ledger::{ClaimFilter, DepositFilter, LedgerStore, PolicyFilter, WithdrawalFilter};
use crate::records::{ClaimStatus, PolicyStatus, PoolMetrics, RiskPoolMetrics, WithdrawalStatus};
use crate::types::{Amount, SnapshotId};

/// Weight of the paid-claims / collected-premium ratio in the risk score.
pub const CLAIMS_WEIGHT: f64 = 0.7;
/// Weight of the reserve shortfall in the risk score.
pub const RESERVE_WEIGHT: f64 = 0.3;

/// Raw ledger sums feeding the solvency figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTotals {
    pub active_deposits: Amount,
    pub completed_withdrawals: Amount,
    pub active_policies: u64,
    pub coverage_liability: Amount,
    pub premiums_collected: Amount,
    pub pending_claims: u64,
    pub claims_paid: Amount,
}

impl PoolTotals {
    pub fn gather<L: LedgerStore>(ledger: &L) -> Result<Self> {
        let active = PolicyFilter::with_statuses(&[PolicyStatus::Active]);
        let premium_bearing = PolicyFilter::with_statuses(&PolicyStatus::PREMIUM_BEARING);
        Ok(PoolTotals {
            active_deposits: ledger.sum_deposits(&DepositFilter::active())?,
            completed_withdrawals: ledger.sum_withdrawals(&WithdrawalFilter::with_statuses(
                None,
                &[WithdrawalStatus::Completed],
            ))?,
            active_policies: ledger.count_policies(&active)?,
            coverage_liability: ledger.sum_policies(&active, |p| p.coverage_amount)?,
            premiums_collected: ledger.sum_policies(&premium_bearing, |p| p.premium_amount)?,
            pending_claims: ledger
                .count_claims(&ClaimFilter::with_statuses(&ClaimStatus::AWAITING_DECISION))?,
            claims_paid: ledger.sum_claims(&ClaimFilter::with_statuses(&[ClaimStatus::Paid]))?,
        })
    }

    pub fn total_capital(&self) -> i64 {
        let capital = self.active_deposits as i128 - self.completed_withdrawals as i128;
        capital.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn derive(&self) -> PoolMetrics {
        let total_capital = self.total_capital();
        let reserve_ratio = reserve_ratio(total_capital, self.coverage_liability);
        PoolMetrics {
            total_capital,
            total_coverage_liability: self.coverage_liability,
            total_premiums_collected: self.premiums_collected,
            total_claims_paid: self.claims_paid,
            reserve_ratio,
            active_policies_count: self.active_policies,
            pending_claims_count: self.pending_claims,
            risk_score: risk_score(
                self.claims_paid,
                self.premiums_collected,
                reserve_ratio,
                self.coverage_liability,
            ),
        }
    }
}

/// Capital over coverage liability; 1.0 when nothing is covered.
pub fn reserve_ratio(total_capital: i64, coverage_liability: Amount) -> f64 {
    if coverage_liability == 0 {
        return 1.0;
    }
    total_capital as f64 / coverage_liability as f64
}

/// `0.7 · claims_ratio + 0.3 · (1 − clamp(reserve_ratio, 0, 1))`, or 0 when
/// there is no coverage liability.
pub fn risk_score(
    claims_paid: Amount,
    premiums_collected: Amount,
    reserve_ratio: f64,
    coverage_liability: Amount,
) -> f64 {
    if coverage_liability == 0 {
        return 0.0;
    }
    let claims_ratio = if premiums_collected == 0 {
        0.0
    } else {
        claims_paid as f64 / premiums_collected as f64
    };
    let reserve_factor = 1.0 - reserve_ratio.clamp(0.0, 1.0);
    CLAIMS_WEIGHT * claims_ratio + RESERVE_WEIGHT * reserve_factor
}

/// Derive a snapshot from the current ledger state and append it.
///
/// Callers run this inside the same [`LedgerStore::transaction`] as the
/// mutation that made it necessary, after that mutation has succeeded.
pub fn recompute<L: LedgerStore>(ledger: &mut L, now: DateTime<Utc>) -> Result<RiskPoolMetrics> {
    let values = PoolTotals::gather(ledger)?.derive();
    debug!(
        capital = values.total_capital,
        liability = values.total_coverage_liability,
        reserve_ratio = values.reserve_ratio,
        risk_score = values.risk_score,
        "risk pool metrics recomputed"
    );
    ledger.append_metrics(RiskPoolMetrics {
        id: SnapshotId::default(),
        values,
        last_update_time: now,
        snapshot_date: now,
    })
}
