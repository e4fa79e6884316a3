//! Risk pool capital: deposits, withdrawal authorization and metrics reads.
//!
//! A user's available balance is their active deposits minus every
//! withdrawal still `pending` or already `completed`. Rejected withdrawals
//! release their amount as soon as they are rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ShieldError};
use crate::ledger::{DepositFilter, LedgerStore, WithdrawalFilter};
use crate::metrics;
use crate::records::{
    Deposit, Metadata, PoolMetrics, RiskPoolMetrics, RiskPoolWithdrawal, WithdrawalStatus,
};
use crate::shield::Shield;
use crate::types::{Actor, Amount, DepositId, Page, SnapshotId, UserId, WithdrawalId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDeposit {
    pub amount: Amount,
    pub reference: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Pool-wide half of [`PoolSummary`], taken from the latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolView {
    pub total_capital: i64,
    pub total_coverage_liability: Amount,
    pub reserve_ratio: f64,
    pub risk_score: f64,
    pub active_policies_count: u64,
    pub pending_claims_count: u64,
    pub last_update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPoolView {
    pub total_deposits: Amount,
    /// Pending plus completed.
    pub total_withdrawals: Amount,
    pub pending_withdrawals: Amount,
    /// Deposits minus completed withdrawals.
    pub current_balance: Amount,
    pub available_for_withdrawal: Amount,
    /// Share of total pool capital held by this user; 0 when the pool has no
    /// positive capital.
    pub percentage_of_pool: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub pool: PoolView,
    pub user: UserPoolView,
}

/// Per-user balance arithmetic, shared by authorization and the summary view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserBalance {
    pub deposits: Amount,
    pub pending: Amount,
    pub completed: Amount,
}

impl UserBalance {
    pub fn gather<L: LedgerStore>(ledger: &L, user_id: UserId) -> Result<Self> {
        let of =
            |status: WithdrawalStatus| WithdrawalFilter::with_statuses(Some(user_id), &[status]);
        Ok(UserBalance {
            deposits: ledger.sum_deposits(&DepositFilter::active_for(user_id))?,
            pending: ledger.sum_withdrawals(&of(WithdrawalStatus::Pending))?,
            completed: ledger.sum_withdrawals(&of(WithdrawalStatus::Completed))?,
        })
    }

    pub fn reserved(&self) -> Amount {
        self.pending.saturating_add(self.completed)
    }

    pub fn current(&self) -> Amount {
        self.deposits.saturating_sub(self.completed)
    }

    pub fn available(&self) -> Amount {
        self.deposits.saturating_sub(self.reserved())
    }
}

impl<L: LedgerStore> Shield<L> {
    pub fn create_deposit(&mut self, actor: &Actor, new: NewDeposit) -> Result<Deposit> {
        self.authorize(actor)?;
        if new.amount == 0 {
            return Err(ShieldError::Validation("deposit amount must be positive".into()));
        }
        let user_id = actor.user_id;
        let deposit = self.ledger.transaction(|tx| {
            let now = Utc::now();
            let deposit = tx.insert_deposit(Deposit {
                id: DepositId::default(),
                user_id,
                amount: new.amount,
                reference: new.reference,
                metadata: new.metadata,
                timestamp: now,
                is_active: true,
            })?;
            metrics::recompute(tx, now)?;
            Ok(deposit)
        })?;
        info!(
            deposit_id = %deposit.id,
            user_id = %user_id,
            amount = deposit.amount,
            "deposit recorded"
        );
        Ok(deposit)
    }

    /// Admit a withdrawal request if the actor's available balance covers it.
    /// The request reserves the amount but moves no capital until completed.
    pub fn request_withdrawal(
        &mut self,
        actor: &Actor,
        amount: Amount,
        notes: Option<String>,
    ) -> Result<RiskPoolWithdrawal> {
        self.authorize(actor)?;
        if amount == 0 {
            return Err(ShieldError::Validation("withdrawal amount must be positive".into()));
        }
        let user_id = actor.user_id;
        let withdrawal = self.ledger.transaction(|tx| {
            let available = UserBalance::gather(tx, user_id)?.available();
            if amount > available {
                return Err(ShieldError::Validation(format!(
                    "Insufficient balance. Available: {available}, Requested: {amount}"
                )));
            }
            tx.insert_withdrawal(RiskPoolWithdrawal {
                id: WithdrawalId::default(),
                user_id,
                amount,
                status: WithdrawalStatus::Pending,
                notes,
                timestamp: Utc::now(),
                processed_time: None,
            })
        })?;
        info!(withdrawal_id = %withdrawal.id, user_id = %user_id, amount, "withdrawal requested");
        Ok(withdrawal)
    }

    /// Resolve a pending withdrawal exactly once. Notes are appended to any
    /// the requester left.
    pub fn process_withdrawal(
        &mut self,
        actor: &Actor,
        id: WithdrawalId,
        status: WithdrawalStatus,
        notes: Option<String>,
    ) -> Result<RiskPoolWithdrawal> {
        self.authorize_admin(actor)?;
        if status == WithdrawalStatus::Pending {
            return Err(ShieldError::Validation(
                "withdrawal can only be processed to completed or rejected".into(),
            ));
        }
        let withdrawal = self.ledger.transaction(|tx| {
            let mut withdrawal = tx.require_withdrawal(id)?;
            if withdrawal.status != WithdrawalStatus::Pending {
                return Err(ShieldError::StateConflict(format!(
                    "withdrawal {id} already processed (status: {})",
                    withdrawal.status
                )));
            }
            let now = Utc::now();
            withdrawal.status = status;
            withdrawal.processed_time = Some(now);
            if let Some(extra) = notes {
                withdrawal.notes = Some(match withdrawal.notes.take() {
                    Some(existing) => format!("{existing}\n\n{extra}"),
                    None => extra,
                });
            }
            tx.update_withdrawal(&withdrawal)?;
            if status == WithdrawalStatus::Completed {
                metrics::recompute(tx, now)?;
            }
            Ok(withdrawal)
        })?;
        info!(withdrawal_id = %withdrawal.id, status = %withdrawal.status, "withdrawal processed");
        Ok(withdrawal)
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// The actor's own deposits, newest first.
    pub fn list_deposits(&self, actor: &Actor, page: Option<Page>) -> Result<Vec<Deposit>> {
        self.authorize(actor)?;
        let filter = DepositFilter { user_id: Some(actor.user_id), active_only: false };
        let mut deposits = self.ledger.find_deposits(&filter)?;
        deposits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(self.page(page).apply(deposits))
    }

    pub fn admin_list_deposits(
        &self,
        actor: &Actor,
        user_id: Option<UserId>,
        page: Option<Page>,
    ) -> Result<Vec<Deposit>> {
        self.authorize_admin(actor)?;
        let mut deposits =
            self.ledger.find_deposits(&DepositFilter { user_id, active_only: false })?;
        deposits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(self.page(page).apply(deposits))
    }

    /// The actor's own withdrawals, newest first.
    pub fn list_withdrawals(
        &self,
        actor: &Actor,
        page: Option<Page>,
    ) -> Result<Vec<RiskPoolWithdrawal>> {
        self.authorize(actor)?;
        let filter = WithdrawalFilter { user_id: Some(actor.user_id), statuses: vec![] };
        let mut withdrawals = self.ledger.find_withdrawals(&filter)?;
        withdrawals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(self.page(page).apply(withdrawals))
    }

    /// Pending requests first, then newest first.
    pub fn admin_list_withdrawals(
        &self,
        actor: &Actor,
        user_id: Option<UserId>,
        status: Option<WithdrawalStatus>,
        page: Option<Page>,
    ) -> Result<Vec<RiskPoolWithdrawal>> {
        self.authorize_admin(actor)?;
        let filter = WithdrawalFilter { user_id, statuses: status.into_iter().collect() };
        let mut withdrawals = self.ledger.find_withdrawals(&filter)?;
        withdrawals.sort_by(|a, b| {
            (a.status != WithdrawalStatus::Pending)
                .cmp(&(b.status != WithdrawalStatus::Pending))
                .then(b.timestamp.cmp(&a.timestamp))
                .then(b.id.cmp(&a.id))
        });
        Ok(self.page(page).apply(withdrawals))
    }

    /// Latest snapshot, or a zero-valued one (not persisted) before the first
    /// recomputation.
    pub fn current_metrics(&self, actor: &Actor) -> Result<RiskPoolMetrics> {
        self.authorize(actor)?;
        match self.ledger.latest_metrics()? {
            Some(snapshot) => Ok(snapshot),
            None => {
                let now = Utc::now();
                Ok(RiskPoolMetrics {
                    id: SnapshotId::default(),
                    values: PoolMetrics::empty(),
                    last_update_time: now,
                    snapshot_date: now,
                })
            }
        }
    }

    /// Snapshots newest first.
    pub fn metrics_history(&self, actor: &Actor, limit: usize) -> Result<Vec<RiskPoolMetrics>> {
        self.authorize_admin(actor)?;
        self.ledger.metrics_history(limit)
    }

    /// Force a recomputation outside of any lifecycle operation.
    pub fn recompute_metrics(&mut self, actor: &Actor) -> Result<RiskPoolMetrics> {
        self.authorize_admin(actor)?;
        self.ledger.transaction(|tx| metrics::recompute(tx, Utc::now()))
    }

    pub fn summary(&self, actor: &Actor) -> Result<PoolSummary> {
        let snapshot = self.current_metrics(actor)?;
        let balance = UserBalance::gather(&self.ledger, actor.user_id)?;
        let capital = snapshot.values.total_capital;
        let current = balance.current();
        let percentage_of_pool = if capital > 0 {
            current as f64 / capital as f64 * 100.0
        } else {
            0.0
        };
        Ok(PoolSummary {
            pool: PoolView {
                total_capital: capital,
                total_coverage_liability: snapshot.values.total_coverage_liability,
                reserve_ratio: snapshot.values.reserve_ratio,
                risk_score: snapshot.values.risk_score,
                active_policies_count: snapshot.values.active_policies_count,
                pending_claims_count: snapshot.values.pending_claims_count,
                last_update_time: snapshot.last_update_time,
            },
            user: UserPoolView {
                total_deposits: balance.deposits,
                total_withdrawals: balance.reserved(),
                pending_withdrawals: balance.pending,
                current_balance: current,
                available_for_withdrawal: balance.available(),
                percentage_of_pool,
            },
        })
    }
}
