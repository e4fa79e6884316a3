use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ShieldError;
use crate::types::{
    Amount, ClaimId, DepositId, EvidenceId, HistoryId, PolicyId, SnapshotId, UserId, WithdrawalId,
};

/// Free-form attributes attached to policies, claims, deposits and evidence.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Shallow merge: top-level keys in `patch` overwrite those in `target`.
/// Nested objects are replaced wholesale, never merged.
pub fn merge_metadata(target: &mut Metadata, patch: Metadata) {
    target.extend(patch);
}

macro_rules! status_labels {
    ($name:ident, $what:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ShieldError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(ShieldError::Validation(format!(
                        concat!("invalid ", $what, " status '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ── Policy ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Created,
    Active,
    Expired,
    Claimed,
    Canceled,
}

status_labels!(PolicyStatus, "policy" {
    Created => "created",
    Active => "active",
    Expired => "expired",
    Claimed => "claimed",
    Canceled => "canceled",
});

impl PolicyStatus {
    /// Statuses whose premium counts as collected by the pool.
    pub const PREMIUM_BEARING: [PolicyStatus; 3] =
        [PolicyStatus::Active, PolicyStatus::Expired, PolicyStatus::Claimed];

    pub fn is_terminal(&self) -> bool {
        matches!(self, PolicyStatus::Expired | PolicyStatus::Claimed | PolicyStatus::Canceled)
    }

    /// `created → {active, canceled}`, `active → {expired, claimed, canceled}`.
    /// Terminal statuses have no way out.
    ///
    /// Open question: the documented lifecycle only names
    /// `created → active → {expired, claimed, canceled}`. Cancelling a policy
    /// that was never activated is accepted here as well.
    pub fn can_transition_to(&self, next: PolicyStatus) -> bool {
        use PolicyStatus::*;
        if self.is_terminal() || next == Created {
            return false;
        }
        match self {
            Created => matches!(next, Active | Canceled),
            _ => next != Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub freelancer_id: UserId,
    pub client_id: Option<UserId>,
    pub premium_amount: Amount,
    pub coverage_amount: Amount,
    pub policy_type: String,
    pub project_name: Option<String>,
    pub project_description: Option<String>,
    pub status: PolicyStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Policy {
    /// Freelancer or named client.
    pub fn is_party(&self, user: UserId) -> bool {
        self.freelancer_id == user || self.client_id == Some(user)
    }
}

/// Append-only record of one policy status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyHistory {
    pub id: HistoryId,
    pub policy_id: PolicyId,
    pub changed_by: UserId,
    pub previous_status: Option<PolicyStatus>,
    pub new_status: PolicyStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

// ── Claim ─────────────────────────────────────────────────────────────────────

/// Claim status is an open label set: any administrator or assigned reviewer
/// may move a claim to any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    UnderReview,
    NeedsInfo,
    Approved,
    Rejected,
    Paid,
    Disputed,
}

status_labels!(ClaimStatus, "claim" {
    Pending => "pending",
    UnderReview => "under_review",
    NeedsInfo => "needs_info",
    Approved => "approved",
    Rejected => "rejected",
    Paid => "paid",
    Disputed => "disputed",
});

impl ClaimStatus {
    pub const AWAITING_DECISION: [ClaimStatus; 3] =
        [ClaimStatus::Pending, ClaimStatus::UnderReview, ClaimStatus::NeedsInfo];

    pub fn is_awaiting_decision(&self) -> bool {
        Self::AWAITING_DECISION.contains(self)
    }

    /// Moving a claim into one of these statuses changes pool solvency.
    pub fn affects_pool(&self) -> bool {
        matches!(self, ClaimStatus::Approved | ClaimStatus::Rejected | ClaimStatus::Paid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub policy_id: PolicyId,
    pub claimant_id: UserId,
    pub claim_amount: Amount,
    pub evidence_description: String,
    pub status: ClaimStatus,
    pub reviewer_id: Option<UserId>,
    pub resolution_notes: Option<String>,
    pub resolution_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
    pub submission_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceContent {
    Text { content: String },
    /// `sha256` is the lowercase hex digest of the stored bytes.
    File { path: String, sha256: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimEvidence {
    pub id: EvidenceId,
    pub claim_id: ClaimId,
    pub evidence_type: String,
    pub content: EvidenceContent,
    #[serde(default)]
    pub metadata: Metadata,
    pub upload_time: DateTime<Utc>,
}

// ── Risk pool ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: DepositId,
    pub user_id: UserId,
    pub amount: Amount,
    pub reference: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub timestamp: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
}

status_labels!(WithdrawalStatus, "withdrawal" {
    Pending => "pending",
    Completed => "completed",
    Rejected => "rejected",
});

impl WithdrawalStatus {
    /// Withdrawals that still count against a user's available balance.
    pub const RESERVING: [WithdrawalStatus; 2] =
        [WithdrawalStatus::Pending, WithdrawalStatus::Completed];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPoolWithdrawal {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub amount: Amount,
    pub status: WithdrawalStatus,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub processed_time: Option<DateTime<Utc>>,
}

/// Derived solvency figures. Two snapshots computed from the same ledger
/// compare equal here even when their timestamps differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolMetrics {
    /// Active deposits minus completed withdrawals; may go negative if
    /// deposits are deactivated after withdrawals complete.
    pub total_capital: i64,
    pub total_coverage_liability: Amount,
    pub total_premiums_collected: Amount,
    pub total_claims_paid: Amount,
    pub reserve_ratio: f64,
    pub active_policies_count: u64,
    pub pending_claims_count: u64,
    pub risk_score: f64,
}

impl PoolMetrics {
    /// The figures for an empty ledger: fully reserved, zero risk.
    pub fn empty() -> Self {
        PoolMetrics {
            total_capital: 0,
            total_coverage_liability: 0,
            total_premiums_collected: 0,
            total_claims_paid: 0,
            reserve_ratio: 1.0,
            active_policies_count: 0,
            pending_claims_count: 0,
            risk_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPoolMetrics {
    pub id: SnapshotId,
    #[serde(flatten)]
    pub values: PoolMetrics,
    pub last_update_time: DateTime<Utc>,
    pub snapshot_date: DateTime<Utc>,
}
