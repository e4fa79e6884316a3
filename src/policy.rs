//! Policy lifecycle: `created → active → {expired, claimed, canceled}`.
//!
//! Every status change appends a [`PolicyHistory`] row and recomputes pool
//! metrics inside the same ledger transaction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ShieldError};
use crate::ledger::{ClaimFilter, LedgerStore, PolicyFilter};
use crate::metrics;
use crate::records::{Claim, Metadata, Policy, PolicyHistory, PolicyStatus, merge_metadata};
use crate::shield::Shield;
use crate::types::{Actor, Amount, HistoryId, Page, PolicyId, UserId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPolicy {
    pub premium_amount: Amount,
    pub coverage_amount: Amount,
    pub policy_type: String,
    /// Resolved to a user at creation; an unknown address leaves the client unset.
    pub client_email: Option<String>,
    pub project_name: Option<String>,
    pub project_description: Option<String>,
    /// Defaults to now.
    pub start_date: Option<DateTime<Utc>>,
    /// Defaults to `start_date + policy_term_days`.
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Fields left `None` are not touched. `metadata` is merged, not replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub status: Option<PolicyStatus>,
    /// Recorded on the history row; a generated reason is used when absent.
    pub reason: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
    pub project_name: Option<String>,
    pub project_description: Option<String>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyQuery {
    pub status: Option<PolicyStatus>,
    pub policy_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDetail {
    pub policy: Policy,
    pub claims: Vec<Claim>,
}

/// Append the history row for a status change of `policy`.
pub(crate) fn record_transition<L: LedgerStore>(
    tx: &mut L,
    policy: &Policy,
    previous_status: Option<PolicyStatus>,
    changed_by: UserId,
    reason: String,
    now: DateTime<Utc>,
) -> Result<PolicyHistory> {
    tx.append_history(PolicyHistory {
        id: HistoryId::default(),
        policy_id: policy.id,
        changed_by,
        previous_status,
        new_status: policy.status,
        reason,
        timestamp: now,
    })
}

fn ensure_can_view(actor: &Actor, policy: &Policy) -> Result<()> {
    if actor.is_admin || policy.is_party(actor.user_id) {
        Ok(())
    } else {
        Err(ShieldError::PermissionDenied(format!("not authorized to view policy {}", policy.id)))
    }
}

impl<L: LedgerStore> Shield<L> {
    /// The actor becomes the policy's freelancer. The policy starts `created`
    /// and only counts towards pool metrics once activated.
    pub fn create_policy(&mut self, actor: &Actor, new: NewPolicy) -> Result<Policy> {
        self.authorize(actor)?;
        if new.premium_amount == 0 {
            return Err(ShieldError::Validation("premium_amount must be positive".into()));
        }
        if new.coverage_amount == 0 {
            return Err(ShieldError::Validation("coverage_amount must be positive".into()));
        }
        if new.policy_type.trim().is_empty() {
            return Err(ShieldError::Validation("policy_type is required".into()));
        }

        let now = Utc::now();
        let start_date = new.start_date.unwrap_or(now);
        let end_date = match new.end_date {
            Some(end) => end,
            None => Duration::try_days(self.config.policy_term_days)
                .and_then(|term| start_date.checked_add_signed(term))
                .ok_or_else(|| ShieldError::Validation("policy term out of range".into()))?,
        };
        if end_date <= start_date {
            return Err(ShieldError::Validation("end_date must be after start_date".into()));
        }

        let freelancer_id = actor.user_id;
        let policy = self.ledger.transaction(|tx| {
            let client_id = match new.client_email.as_deref() {
                Some(email) => tx.find_user_by_email(email)?.map(|u| u.id),
                None => None,
            };
            let policy = tx.insert_policy(Policy {
                id: PolicyId::default(),
                freelancer_id,
                client_id,
                premium_amount: new.premium_amount,
                coverage_amount: new.coverage_amount,
                policy_type: new.policy_type,
                project_name: new.project_name,
                project_description: new.project_description,
                status: PolicyStatus::Created,
                start_date,
                end_date,
                metadata: new.metadata,
                created_at: now,
                last_updated: now,
            })?;
            record_transition(tx, &policy, None, freelancer_id, "Policy created".into(), now)?;
            metrics::recompute(tx, now)?;
            Ok(policy)
        })?;

        info!(
            policy_id = %policy.id,
            freelancer = %policy.freelancer_id,
            coverage = policy.coverage_amount,
            "policy created"
        );
        Ok(policy)
    }

    /// Policies where the actor is freelancer or client, newest first.
    pub fn list_policies(
        &self,
        actor: &Actor,
        query: &PolicyQuery,
        page: Option<Page>,
    ) -> Result<Vec<Policy>> {
        self.authorize(actor)?;
        let filter = PolicyFilter {
            statuses: query.status.into_iter().collect(),
            party: Some(actor.user_id),
            policy_type: query.policy_type.clone(),
        };
        let mut policies = self.ledger.find_policies(&filter)?;
        policies.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(self.page(page).apply(policies))
    }

    pub fn get_policy(&self, actor: &Actor, id: PolicyId) -> Result<PolicyDetail> {
        self.authorize(actor)?;
        let policy = self.ledger.require_policy(id)?;
        ensure_can_view(actor, &policy)?;
        let claims = self
            .ledger
            .find_claims(&ClaimFilter { policy_id: Some(id), ..Default::default() })?;
        Ok(PolicyDetail { policy, claims })
    }

    /// Only the freelancer who owns the policy or an administrator may update
    /// it. Setting the current status again changes nothing but the other
    /// fields of the update.
    pub fn update_policy(
        &mut self,
        actor: &Actor,
        id: PolicyId,
        update: PolicyUpdate,
    ) -> Result<Policy> {
        self.authorize(actor)?;
        let actor = *actor;
        let (policy, previous) = self.ledger.transaction(|tx| {
            let mut policy = tx.require_policy(id)?;
            if !actor.is_admin && policy.freelancer_id != actor.user_id {
                return Err(ShieldError::PermissionDenied(format!(
                    "only the owner or an administrator may update policy {id}"
                )));
            }

            let now = Utc::now();
            let mut previous = None;
            if let Some(next) = update.status
                && next != policy.status
            {
                if !policy.status.can_transition_to(next) {
                    return Err(ShieldError::StateConflict(format!(
                        "policy {id} cannot move from {} to {next}",
                        policy.status
                    )));
                }
                previous = Some(policy.status);
                policy.status = next;
            }
            if let Some(end_date) = update.end_date {
                if end_date <= policy.start_date {
                    return Err(ShieldError::Validation("end_date must be after start_date".into()));
                }
                policy.end_date = end_date;
            }
            if let Some(name) = update.project_name {
                policy.project_name = Some(name);
            }
            if let Some(description) = update.project_description {
                policy.project_description = Some(description);
            }
            if let Some(patch) = update.metadata {
                merge_metadata(&mut policy.metadata, patch);
            }
            policy.last_updated = now;
            tx.update_policy(&policy)?;

            if let Some(prev) = previous {
                let reason = update
                    .reason
                    .unwrap_or_else(|| format!("Status updated from {prev} to {}", policy.status));
                record_transition(tx, &policy, Some(prev), actor.user_id, reason, now)?;
                metrics::recompute(tx, now)?;
            }
            Ok((policy, previous))
        })?;

        if let Some(prev) = previous {
            info!(
                policy_id = %policy.id,
                from = %prev,
                to = %policy.status,
                "policy status changed"
            );
        }
        Ok(policy)
    }

    /// Status history, newest first.
    pub fn policy_history(&self, actor: &Actor, id: PolicyId) -> Result<Vec<PolicyHistory>> {
        self.authorize(actor)?;
        let policy = self.ledger.require_policy(id)?;
        ensure_can_view(actor, &policy)?;
        let mut history = self.ledger.find_history(id)?;
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(history)
    }
}
