//! Ledger store: durable record of users, policies, claims and pool capital.
//!
//! Lifecycle operations go through [`LedgerStore::transaction`] so that a
//! mutation and the metrics recomputation it triggers commit together or not
//! at all. Record ids are assigned by the store on insert; the `id` field of a
//! record passed to an `insert_*` method is ignored.

pub mod memory;

use crate::error::{Result, ShieldError};
use crate::records::{
    Claim, ClaimEvidence, ClaimStatus, Deposit, Policy, PolicyHistory, PolicyStatus,
    RiskPoolMetrics, RiskPoolWithdrawal, User, WithdrawalStatus,
};
use crate::types::{Amount, ClaimId, PolicyId, UserId, WithdrawalId};

pub use memory::MemoryLedger;

// ── Filters ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    /// Empty means any status.
    pub statuses: Vec<PolicyStatus>,
    /// Freelancer or client.
    pub party: Option<UserId>,
    pub policy_type: Option<String>,
}

impl PolicyFilter {
    pub fn with_statuses(statuses: &[PolicyStatus]) -> Self {
        PolicyFilter { statuses: statuses.to_vec(), ..Default::default() }
    }

    pub fn matches(&self, policy: &Policy) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&policy.status))
            && self.party.is_none_or(|u| policy.is_party(u))
            && self.policy_type.as_deref().is_none_or(|t| policy.policy_type == t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
    pub statuses: Vec<ClaimStatus>,
    pub policy_id: Option<PolicyId>,
    /// Claimant, or freelancer/client of the claimed policy.
    pub involving: Option<UserId>,
}

impl ClaimFilter {
    pub fn with_statuses(statuses: &[ClaimStatus]) -> Self {
        ClaimFilter { statuses: statuses.to_vec(), ..Default::default() }
    }

    /// `policy` is the claim's policy, needed to resolve `involving`.
    pub fn matches(&self, claim: &Claim, policy: Option<&Policy>) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&claim.status))
            && self.policy_id.is_none_or(|p| claim.policy_id == p)
            && self.involving.is_none_or(|u| {
                claim.claimant_id == u || policy.is_some_and(|p| p.is_party(u))
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DepositFilter {
    pub user_id: Option<UserId>,
    pub active_only: bool,
}

impl DepositFilter {
    pub fn active() -> Self {
        DepositFilter { user_id: None, active_only: true }
    }

    pub fn active_for(user_id: UserId) -> Self {
        DepositFilter { user_id: Some(user_id), active_only: true }
    }

    pub fn matches(&self, deposit: &Deposit) -> bool {
        self.user_id.is_none_or(|u| deposit.user_id == u)
            && (!self.active_only || deposit.is_active)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WithdrawalFilter {
    pub user_id: Option<UserId>,
    pub statuses: Vec<WithdrawalStatus>,
}

impl WithdrawalFilter {
    pub fn with_statuses(user_id: Option<UserId>, statuses: &[WithdrawalStatus]) -> Self {
        WithdrawalFilter { user_id, statuses: statuses.to_vec() }
    }

    pub fn matches(&self, w: &RiskPoolWithdrawal) -> bool {
        self.user_id.is_none_or(|u| w.user_id == u)
            && (self.statuses.is_empty() || self.statuses.contains(&w.status))
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

pub trait LedgerStore {
    /// Run `f` atomically: if it returns `Err`, every write it made is
    /// discarded and the store is left as it was before the call.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
        Self: Sized;

    fn insert_user(&mut self, user: User) -> Result<User>;
    fn update_user(&mut self, user: &User) -> Result<()>;
    fn get_user(&self, id: UserId) -> Result<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    fn insert_policy(&mut self, policy: Policy) -> Result<Policy>;
    fn update_policy(&mut self, policy: &Policy) -> Result<()>;
    fn get_policy(&self, id: PolicyId) -> Result<Option<Policy>>;
    fn find_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>>;

    fn append_history(&mut self, entry: PolicyHistory) -> Result<PolicyHistory>;
    fn find_history(&self, policy_id: PolicyId) -> Result<Vec<PolicyHistory>>;

    fn insert_claim(&mut self, claim: Claim) -> Result<Claim>;
    fn update_claim(&mut self, claim: &Claim) -> Result<()>;
    fn get_claim(&self, id: ClaimId) -> Result<Option<Claim>>;
    fn find_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>>;

    fn insert_evidence(&mut self, evidence: ClaimEvidence) -> Result<ClaimEvidence>;
    fn find_evidence(&self, claim_id: ClaimId) -> Result<Vec<ClaimEvidence>>;

    fn insert_deposit(&mut self, deposit: Deposit) -> Result<Deposit>;
    fn find_deposits(&self, filter: &DepositFilter) -> Result<Vec<Deposit>>;

    fn insert_withdrawal(&mut self, withdrawal: RiskPoolWithdrawal) -> Result<RiskPoolWithdrawal>;
    fn update_withdrawal(&mut self, withdrawal: &RiskPoolWithdrawal) -> Result<()>;
    fn get_withdrawal(&self, id: WithdrawalId) -> Result<Option<RiskPoolWithdrawal>>;
    fn find_withdrawals(&self, filter: &WithdrawalFilter) -> Result<Vec<RiskPoolWithdrawal>>;

    /// Most recent snapshot by `snapshot_date`.
    fn latest_metrics(&self) -> Result<Option<RiskPoolMetrics>>;
    fn append_metrics(&mut self, snapshot: RiskPoolMetrics) -> Result<RiskPoolMetrics>;
    /// Snapshots newest first.
    fn metrics_history(&self, limit: usize) -> Result<Vec<RiskPoolMetrics>>;

    // ── Lookups that must succeed ─────────────────────────────────────────────

    fn require_user(&self, id: UserId) -> Result<User> {
        self.get_user(id)?.ok_or(ShieldError::not_found("user", id))
    }

    fn require_policy(&self, id: PolicyId) -> Result<Policy> {
        self.get_policy(id)?.ok_or(ShieldError::not_found("policy", id))
    }

    fn require_claim(&self, id: ClaimId) -> Result<Claim> {
        self.get_claim(id)?.ok_or(ShieldError::not_found("claim", id))
    }

    fn require_withdrawal(&self, id: WithdrawalId) -> Result<RiskPoolWithdrawal> {
        self.get_withdrawal(id)?.ok_or(ShieldError::not_found("withdrawal", id))
    }

    // ── Aggregates ────────────────────────────────────────────────────────────

    fn count_policies(&self, filter: &PolicyFilter) -> Result<u64> {
        Ok(self.find_policies(filter)?.len() as u64)
    }

    fn sum_policies(&self, filter: &PolicyFilter, field: fn(&Policy) -> Amount) -> Result<Amount> {
        checked_total("policy", self.find_policies(filter)?.iter().map(field))
    }

    fn count_claims(&self, filter: &ClaimFilter) -> Result<u64> {
        Ok(self.find_claims(filter)?.len() as u64)
    }

    fn sum_claims(&self, filter: &ClaimFilter) -> Result<Amount> {
        checked_total("claim", self.find_claims(filter)?.iter().map(|c| c.claim_amount))
    }

    fn sum_deposits(&self, filter: &DepositFilter) -> Result<Amount> {
        checked_total("deposit", self.find_deposits(filter)?.iter().map(|d| d.amount))
    }

    fn sum_withdrawals(&self, filter: &WithdrawalFilter) -> Result<Amount> {
        checked_total("withdrawal", self.find_withdrawals(filter)?.iter().map(|w| w.amount))
    }
}

/// Totals that no longer fit in an [`Amount`] are refused rather than wrapped.
fn checked_total(entity: &str, mut amounts: impl Iterator<Item = Amount>) -> Result<Amount> {
    amounts
        .try_fold(0, |total: Amount, amount| total.checked_add(amount))
        .ok_or_else(|| ShieldError::Validation(format!("{entity} total exceeds {}", Amount::MAX)))
}
