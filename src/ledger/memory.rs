//! In-memory ledger, optionally persisted to a single JSON file.
//!
//! Each table is a `Vec` ordered by id; a record with id `n` lives at index
//! `n - 1`. Ids are never reused because rows are never deleted.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ClaimFilter, DepositFilter, LedgerStore, PolicyFilter, WithdrawalFilter};
use crate::error::{Result, ShieldError};
use crate::records::{
    Claim, ClaimEvidence, Deposit, Policy, PolicyHistory, RiskPoolMetrics, RiskPoolWithdrawal,
    User,
};
use crate::types::{
    ClaimId, DepositId, EvidenceId, HistoryId, PolicyId, SnapshotId, UserId, WithdrawalId,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryLedger {
    users: Vec<User>,
    policies: Vec<Policy>,
    history: Vec<PolicyHistory>,
    claims: Vec<Claim>,
    evidence: Vec<ClaimEvidence>,
    deposits: Vec<Deposit>,
    withdrawals: Vec<RiskPoolWithdrawal>,
    snapshots: Vec<RiskPoolMetrics>,
}

fn row<T>(table: &[T], id: u64) -> Option<&T> {
    id.checked_sub(1).and_then(|i| table.get(i as usize))
}

fn row_mut<'a, T>(table: &'a mut [T], id: u64, entity: &'static str) -> Result<&'a mut T> {
    id.checked_sub(1)
        .and_then(|i| table.get_mut(i as usize))
        .ok_or(ShieldError::NotFound { entity, id })
}

fn next_id<T>(table: &[T]) -> u64 {
    table.len() as u64 + 1
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ledger previously written by [`MemoryLedger::save`].
    /// A missing file yields an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn withdrawals(&self) -> &[RiskPoolWithdrawal] {
        &self.withdrawals
    }
}

impl LedgerStore for MemoryLedger {
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let savepoint = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = savepoint;
        }
        result
    }

    // ── Users ─────────────────────────────────────────────────────────────────

    fn insert_user(&mut self, mut user: User) -> Result<User> {
        user.id = UserId(next_id(&self.users));
        self.users.push(user.clone());
        Ok(user)
    }

    fn update_user(&mut self, user: &User) -> Result<()> {
        *row_mut(&mut self.users, user.id.0, "user")? = user.clone();
        Ok(())
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(row(&self.users, id.0).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    // ── Policies ──────────────────────────────────────────────────────────────

    fn insert_policy(&mut self, mut policy: Policy) -> Result<Policy> {
        policy.id = PolicyId(next_id(&self.policies));
        self.policies.push(policy.clone());
        Ok(policy)
    }

    fn update_policy(&mut self, policy: &Policy) -> Result<()> {
        *row_mut(&mut self.policies, policy.id.0, "policy")? = policy.clone();
        Ok(())
    }

    fn get_policy(&self, id: PolicyId) -> Result<Option<Policy>> {
        Ok(row(&self.policies, id.0).cloned())
    }

    fn find_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>> {
        Ok(self.policies.iter().filter(|p| filter.matches(p)).cloned().collect())
    }

    fn append_history(&mut self, mut entry: PolicyHistory) -> Result<PolicyHistory> {
        entry.id = HistoryId(next_id(&self.history));
        self.history.push(entry.clone());
        Ok(entry)
    }

    fn find_history(&self, policy_id: PolicyId) -> Result<Vec<PolicyHistory>> {
        Ok(self.history.iter().filter(|h| h.policy_id == policy_id).cloned().collect())
    }

    // ── Claims ────────────────────────────────────────────────────────────────

    fn insert_claim(&mut self, mut claim: Claim) -> Result<Claim> {
        claim.id = ClaimId(next_id(&self.claims));
        self.claims.push(claim.clone());
        Ok(claim)
    }

    fn update_claim(&mut self, claim: &Claim) -> Result<()> {
        *row_mut(&mut self.claims, claim.id.0, "claim")? = claim.clone();
        Ok(())
    }

    fn get_claim(&self, id: ClaimId) -> Result<Option<Claim>> {
        Ok(row(&self.claims, id.0).cloned())
    }

    fn find_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>> {
        Ok(self
            .claims
            .iter()
            .filter(|c| filter.matches(c, row(&self.policies, c.policy_id.0)))
            .cloned()
            .collect())
    }

    fn insert_evidence(&mut self, mut evidence: ClaimEvidence) -> Result<ClaimEvidence> {
        evidence.id = EvidenceId(next_id(&self.evidence));
        self.evidence.push(evidence.clone());
        Ok(evidence)
    }

    fn find_evidence(&self, claim_id: ClaimId) -> Result<Vec<ClaimEvidence>> {
        Ok(self.evidence.iter().filter(|e| e.claim_id == claim_id).cloned().collect())
    }

    // ── Capital ───────────────────────────────────────────────────────────────

    fn insert_deposit(&mut self, mut deposit: Deposit) -> Result<Deposit> {
        deposit.id = DepositId(next_id(&self.deposits));
        self.deposits.push(deposit.clone());
        Ok(deposit)
    }

    fn find_deposits(&self, filter: &DepositFilter) -> Result<Vec<Deposit>> {
        Ok(self.deposits.iter().filter(|d| filter.matches(d)).cloned().collect())
    }

    fn insert_withdrawal(
        &mut self,
        mut withdrawal: RiskPoolWithdrawal,
    ) -> Result<RiskPoolWithdrawal> {
        withdrawal.id = WithdrawalId(next_id(&self.withdrawals));
        self.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    fn update_withdrawal(&mut self, withdrawal: &RiskPoolWithdrawal) -> Result<()> {
        *row_mut(&mut self.withdrawals, withdrawal.id.0, "withdrawal")? = withdrawal.clone();
        Ok(())
    }

    fn get_withdrawal(&self, id: WithdrawalId) -> Result<Option<RiskPoolWithdrawal>> {
        Ok(row(&self.withdrawals, id.0).cloned())
    }

    fn find_withdrawals(&self, filter: &WithdrawalFilter) -> Result<Vec<RiskPoolWithdrawal>> {
        Ok(self.withdrawals.iter().filter(|w| filter.matches(w)).cloned().collect())
    }

    // ── Metrics ───────────────────────────────────────────────────────────────

    fn latest_metrics(&self) -> Result<Option<RiskPoolMetrics>> {
        Ok(self.snapshots.iter().max_by_key(|m| m.snapshot_date).cloned())
    }

    fn append_metrics(&mut self, mut snapshot: RiskPoolMetrics) -> Result<RiskPoolMetrics> {
        snapshot.id = SnapshotId(next_id(&self.snapshots));
        self.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    fn metrics_history(&self, limit: usize) -> Result<Vec<RiskPoolMetrics>> {
        let mut out: Vec<RiskPoolMetrics> = self.snapshots.clone();
        out.sort_by(|a, b| b.snapshot_date.cmp(&a.snapshot_date).then(b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }
}
