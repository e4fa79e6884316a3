//! Claim lifecycle and evidence.
//!
//! Claim status is a label set with no transition table: an administrator or
//! the assigned reviewer may set any status. Moving a claim to `approved`,
//! `rejected` or `paid` recomputes pool metrics.

use std::io::Read;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{Result, ShieldError};
use crate::ledger::{ClaimFilter, LedgerStore};
use crate::metrics;
use crate::policy::record_transition;
use crate::records::{
    Claim, ClaimEvidence, ClaimStatus, EvidenceContent, Metadata, Policy, PolicyStatus,
    merge_metadata,
};
use crate::shield::Shield;
use crate::types::{Actor, Amount, ClaimId, EvidenceId, Page, PolicyId, UserId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewClaim {
    pub policy_id: PolicyId,
    pub claim_amount: Amount,
    pub evidence_description: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Fields left `None` are not touched. `metadata` is merged, not replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimUpdate {
    pub status: Option<ClaimStatus>,
    /// Administrator only.
    pub reviewer_id: Option<UserId>,
    pub resolution_notes: Option<String>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimQuery {
    pub status: Option<ClaimStatus>,
    pub policy_id: Option<PolicyId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEvidence {
    pub evidence_type: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Describes an uploaded file; the bytes are passed separately as a reader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileUpload {
    pub evidence_type: String,
    pub file_name: String,
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDetail {
    pub claim: Claim,
    pub evidence: Vec<ClaimEvidence>,
}

fn ensure_can_view(actor: &Actor, claim: &Claim, policy: Option<&Policy>) -> Result<()> {
    let allowed = actor.is_admin
        || claim.claimant_id == actor.user_id
        || claim.reviewer_id == Some(actor.user_id)
        || policy.is_some_and(|p| p.is_party(actor.user_id));
    if allowed {
        Ok(())
    } else {
        Err(ShieldError::PermissionDenied(format!("not authorized to view claim {}", claim.id)))
    }
}

fn ensure_claimant(actor: &Actor, claim: &Claim) -> Result<()> {
    if claim.claimant_id == actor.user_id {
        Ok(())
    } else {
        Err(ShieldError::PermissionDenied(format!(
            "only the claimant may add evidence to claim {}",
            claim.id
        )))
    }
}

fn newest_first(claims: &mut [Claim]) {
    claims.sort_by(|a, b| b.submission_time.cmp(&a.submission_time).then(b.id.cmp(&a.id)));
}

impl<L: LedgerStore> Shield<L> {
    /// File a claim against an active policy. The policy moves to `claimed`
    /// in the same transaction, so a second claim against it conflicts.
    pub fn file_claim(&mut self, actor: &Actor, new: NewClaim) -> Result<Claim> {
        self.authorize(actor)?;
        if new.claim_amount == 0 {
            return Err(ShieldError::Validation("claim_amount must be positive".into()));
        }

        let claimant = actor.user_id;
        let claim = self.ledger.transaction(|tx| {
            let mut policy = tx.require_policy(new.policy_id)?;
            if policy.status != PolicyStatus::Active {
                return Err(ShieldError::StateConflict(format!(
                    "policy {} is not active (status: {})",
                    policy.id, policy.status
                )));
            }
            if !policy.is_party(claimant) {
                return Err(ShieldError::PermissionDenied(format!(
                    "only the freelancer or client of policy {} may file a claim",
                    policy.id
                )));
            }
            if new.claim_amount > policy.coverage_amount {
                return Err(ShieldError::Validation(format!(
                    "claim amount {} exceeds policy coverage {}",
                    new.claim_amount, policy.coverage_amount
                )));
            }

            let now = Utc::now();
            let claim = tx.insert_claim(Claim {
                id: ClaimId::default(),
                policy_id: policy.id,
                claimant_id: claimant,
                claim_amount: new.claim_amount,
                evidence_description: new.evidence_description,
                status: ClaimStatus::Pending,
                reviewer_id: None,
                resolution_notes: None,
                resolution_time: None,
                metadata: new.metadata,
                submission_time: now,
                last_updated: now,
            })?;

            policy.status = PolicyStatus::Claimed;
            policy.last_updated = now;
            tx.update_policy(&policy)?;
            let reason = format!("Claim {} filed", claim.id);
            record_transition(tx, &policy, Some(PolicyStatus::Active), claimant, reason, now)?;
            metrics::recompute(tx, now)?;
            Ok(claim)
        })?;

        info!(
            claim_id = %claim.id,
            policy_id = %claim.policy_id,
            amount = claim.claim_amount,
            "claim filed"
        );
        Ok(claim)
    }

    /// Claims the actor filed or that touch a policy they are party to,
    /// newest first.
    pub fn list_claims(
        &self,
        actor: &Actor,
        query: &ClaimQuery,
        page: Option<Page>,
    ) -> Result<Vec<Claim>> {
        self.authorize(actor)?;
        let filter = ClaimFilter {
            statuses: query.status.into_iter().collect(),
            policy_id: query.policy_id,
            involving: Some(actor.user_id),
        };
        let mut claims = self.ledger.find_claims(&filter)?;
        newest_first(&mut claims);
        Ok(self.page(page).apply(claims))
    }

    pub fn admin_list_claims(
        &self,
        actor: &Actor,
        query: &ClaimQuery,
        page: Option<Page>,
    ) -> Result<Vec<Claim>> {
        self.authorize_admin(actor)?;
        let filter = ClaimFilter {
            statuses: query.status.into_iter().collect(),
            policy_id: query.policy_id,
            involving: None,
        };
        let mut claims = self.ledger.find_claims(&filter)?;
        newest_first(&mut claims);
        Ok(self.page(page).apply(claims))
    }

    pub fn get_claim(&self, actor: &Actor, id: ClaimId) -> Result<ClaimDetail> {
        self.authorize(actor)?;
        let claim = self.ledger.require_claim(id)?;
        let policy = self.ledger.get_policy(claim.policy_id)?;
        ensure_can_view(actor, &claim, policy.as_ref())?;
        let evidence = self.list_evidence(actor, id)?;
        Ok(ClaimDetail { claim, evidence })
    }

    /// Status, notes and metadata need an administrator or the assigned
    /// reviewer; (re)assigning the reviewer needs an administrator.
    /// `resolution_time` is stamped the first time a claim becomes `paid`.
    pub fn update_claim(
        &mut self,
        actor: &Actor,
        id: ClaimId,
        update: ClaimUpdate,
    ) -> Result<Claim> {
        self.authorize(actor)?;
        let actor = *actor;
        let (claim, previous) = self.ledger.transaction(|tx| {
            let mut claim = tx.require_claim(id)?;
            if !actor.is_admin && claim.reviewer_id != Some(actor.user_id) {
                return Err(ShieldError::PermissionDenied(format!(
                    "only an administrator or the assigned reviewer may update claim {id}"
                )));
            }
            if update.reviewer_id.is_some() && !actor.is_admin {
                return Err(ShieldError::PermissionDenied(
                    "only an administrator may assign a reviewer".into(),
                ));
            }

            let now = Utc::now();
            let previous = claim.status;
            if let Some(next) = update.status {
                claim.status = next;
                if next == ClaimStatus::Paid && claim.resolution_time.is_none() {
                    claim.resolution_time = Some(now);
                }
            }
            if let Some(reviewer) = update.reviewer_id {
                tx.require_user(reviewer)?;
                claim.reviewer_id = Some(reviewer);
            }
            if let Some(notes) = update.resolution_notes {
                claim.resolution_notes = Some(notes);
            }
            if let Some(patch) = update.metadata {
                merge_metadata(&mut claim.metadata, patch);
            }
            claim.last_updated = now;
            tx.update_claim(&claim)?;

            if update.status.is_some_and(|s| s.affects_pool()) {
                metrics::recompute(tx, now)?;
            }
            Ok((claim, previous))
        })?;

        if claim.status != previous {
            info!(
                claim_id = %claim.id,
                from = %previous,
                to = %claim.status,
                "claim status changed"
            );
        }
        Ok(claim)
    }

    // ── Evidence ─────────────────────────────────────────────────────────────

    pub fn add_text_evidence(
        &mut self,
        actor: &Actor,
        claim_id: ClaimId,
        new: NewEvidence,
    ) -> Result<ClaimEvidence> {
        self.authorize(actor)?;
        if new.content.trim().is_empty() {
            return Err(ShieldError::Validation("evidence content is empty".into()));
        }
        let actor = *actor;
        self.ledger.transaction(|tx| {
            let claim = tx.require_claim(claim_id)?;
            ensure_claimant(&actor, &claim)?;
            tx.insert_evidence(ClaimEvidence {
                id: EvidenceId::default(),
                claim_id,
                evidence_type: new.evidence_type,
                content: EvidenceContent::Text { content: new.content },
                metadata: new.metadata,
                upload_time: Utc::now(),
            })
        })
    }

    /// Streams `reader` to the evidence store before the record is written,
    /// so no ledger transaction is held open during the copy.
    pub fn add_file_evidence(
        &mut self,
        actor: &Actor,
        claim_id: ClaimId,
        upload: FileUpload,
        reader: &mut dyn Read,
    ) -> Result<ClaimEvidence> {
        self.authorize(actor)?;
        let claim = self.ledger.require_claim(claim_id)?;
        ensure_claimant(actor, &claim)?;

        let stored = self.evidence.store(claim_id, &upload.file_name, reader)?;

        let mut metadata = upload.metadata;
        metadata.insert("original_filename".into(), Value::from(upload.file_name));
        if let Some(content_type) = upload.content_type {
            metadata.insert("content_type".into(), Value::from(content_type));
        }
        metadata.insert("size".into(), Value::from(stored.size));

        let evidence = self.ledger.insert_evidence(ClaimEvidence {
            id: EvidenceId::default(),
            claim_id,
            evidence_type: upload.evidence_type,
            content: EvidenceContent::File { path: stored.path, sha256: stored.sha256 },
            metadata,
            upload_time: Utc::now(),
        })?;
        info!(
            claim_id = %claim_id,
            evidence_id = %evidence.id,
            size = stored.size,
            "file evidence stored"
        );
        Ok(evidence)
    }

    /// Newest first.
    pub fn list_evidence(&self, actor: &Actor, claim_id: ClaimId) -> Result<Vec<ClaimEvidence>> {
        self.authorize(actor)?;
        let claim = self.ledger.require_claim(claim_id)?;
        let policy = self.ledger.get_policy(claim.policy_id)?;
        ensure_can_view(actor, &claim, policy.as_ref())?;
        let mut evidence = self.ledger.find_evidence(claim_id)?;
        evidence.sort_by(|a, b| b.upload_time.cmp(&a.upload_time).then(b.id.cmp(&a.id)));
        Ok(evidence)
    }

    /// Re-hash a stored evidence file and compare it with the recorded digest.
    pub fn verify_evidence(
        &self,
        actor: &Actor,
        claim_id: ClaimId,
        evidence_id: EvidenceId,
    ) -> Result<bool> {
        let evidence = self
            .list_evidence(actor, claim_id)?
            .into_iter()
            .find(|e| e.id == evidence_id)
            .ok_or(ShieldError::not_found("evidence", evidence_id))?;
        match &evidence.content {
            EvidenceContent::File { path, sha256 } => self.evidence.verify(path, sha256),
            EvidenceContent::Text { .. } => Err(ShieldError::Validation(format!(
                "evidence {evidence_id} is text and has no stored file"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::policy::NewPolicy;
    use crate::testkit::world;

    fn claim_for(policy_id: PolicyId, amount: Amount) -> NewClaim {
        NewClaim {
            policy_id,
            claim_amount: amount,
            evidence_description: "invoice unpaid".into(),
            metadata: Metadata::new(),
        }
    }

    fn set_status(status: ClaimStatus) -> ClaimUpdate {
        ClaimUpdate { status: Some(status), ..Default::default() }
    }

    // ── Filing ───────────────────────────────────────────────────────────────

    #[test]
    fn claim_for_full_coverage_marks_policy_claimed() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.shield.file_claim(&w.freelancer, claim_for(policy.id, 1_000)).unwrap();

        assert_eq!(claim.status, ClaimStatus::Pending);
        let detail = w.shield.get_policy(&w.freelancer, policy.id).unwrap();
        assert_eq!(detail.policy.status, PolicyStatus::Claimed);

        let history = w.shield.policy_history(&w.freelancer, policy.id).unwrap();
        assert_eq!(history[0].new_status, PolicyStatus::Claimed);
        assert_eq!(history[0].reason, format!("Claim {} filed", claim.id));

        let latest = w.shield.ledger().latest_metrics().unwrap().unwrap().values;
        assert_eq!(latest.active_policies_count, 0);
        assert_eq!(latest.total_premiums_collected, 50);
        assert_eq!(latest.pending_claims_count, 1);
    }

    #[test]
    fn one_unit_over_coverage_is_rejected_and_nothing_changes() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let err = w.shield.file_claim(&w.freelancer, claim_for(policy.id, 1_001)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(w.shield.ledger().claims().is_empty());
        let detail = w.shield.get_policy(&w.freelancer, policy.id).unwrap();
        assert_eq!(detail.policy.status, PolicyStatus::Active);
    }

    #[test]
    fn second_claim_against_claimed_policy_conflicts() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        w.file_claim(policy.id, 300);
        let err = w.shield.file_claim(&w.client, claim_for(policy.id, 300)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn filing_errors_are_classified() {
        let mut w = world();
        let err = w.shield.file_claim(&w.freelancer, claim_for(PolicyId(77), 10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let created = w
            .shield
            .create_policy(
                &w.freelancer,
                NewPolicy {
                    premium_amount: 5,
                    coverage_amount: 100,
                    policy_type: "project".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        // Status is checked before the requester.
        let err = w.shield.file_claim(&w.outsider, claim_for(created.id, 10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let active = w.active_policy(50, 1_000);
        let err = w.shield.file_claim(&w.outsider, claim_for(active.id, 10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let err = w.shield.file_claim(&w.freelancer, claim_for(active.id, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn named_client_may_file() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.shield.file_claim(&w.client, claim_for(policy.id, 200)).unwrap();
        assert_eq!(claim.claimant_id, w.client.user_id);
    }

    // ── Review ───────────────────────────────────────────────────────────────

    #[test]
    fn paying_twice_keeps_the_first_resolution_time() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);

        let first =
            w.shield.update_claim(&w.admin, claim.id, set_status(ClaimStatus::Paid)).unwrap();
        let stamped = first.resolution_time.unwrap();
        let second =
            w.shield.update_claim(&w.admin, claim.id, set_status(ClaimStatus::Paid)).unwrap();
        assert_eq!(second.resolution_time, Some(stamped));

        let latest = w.shield.ledger().latest_metrics().unwrap().unwrap().values;
        assert_eq!(latest.total_claims_paid, 400);
        assert_eq!(latest.pending_claims_count, 0);
    }

    #[test]
    fn non_terminal_status_changes_do_not_recompute() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);
        let before = w.shield.ledger().metrics_history(usize::MAX).unwrap().len();
        w.shield.update_claim(&w.admin, claim.id, set_status(ClaimStatus::UnderReview)).unwrap();
        w.shield.update_claim(&w.admin, claim.id, set_status(ClaimStatus::Disputed)).unwrap();
        assert_eq!(w.shield.ledger().metrics_history(usize::MAX).unwrap().len(), before);
        w.shield.update_claim(&w.admin, claim.id, set_status(ClaimStatus::Rejected)).unwrap();
        assert_eq!(w.shield.ledger().metrics_history(usize::MAX).unwrap().len(), before + 1);
    }

    #[test]
    fn claimant_cannot_change_status() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);
        let err = w
            .shield
            .update_claim(&w.freelancer, claim.id, set_status(ClaimStatus::Paid))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn assigned_reviewer_may_decide_but_not_reassign() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);
        let reviewer = w.outsider;

        w.shield
            .update_claim(
                &w.admin,
                claim.id,
                ClaimUpdate { reviewer_id: Some(reviewer.user_id), ..Default::default() },
            )
            .unwrap();
        assert!(w.shield.get_claim(&reviewer, claim.id).is_ok());

        let approved = w
            .shield
            .update_claim(
                &reviewer,
                claim.id,
                ClaimUpdate {
                    status: Some(ClaimStatus::Approved),
                    resolution_notes: Some("contract and invoices check out".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(approved.status, ClaimStatus::Approved);
        assert_eq!(approved.resolution_time, None);

        let err = w
            .shield
            .update_claim(
                &reviewer,
                claim.id,
                ClaimUpdate { reviewer_id: Some(w.client.user_id), ..Default::default() },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn unknown_reviewer_is_not_found() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);
        let err = w
            .shield
            .update_claim(
                &w.admin,
                claim.id,
                ClaimUpdate { reviewer_id: Some(UserId(999)), ..Default::default() },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn claim_metadata_merges_shallowly() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w
            .shield
            .file_claim(
                &w.freelancer,
                NewClaim {
                    metadata: json!({"channel": "email", "days_late": 10})
                        .as_object()
                        .cloned()
                        .unwrap(),
                    ..claim_for(policy.id, 400)
                },
            )
            .unwrap();
        let updated = w
            .shield
            .update_claim(
                &w.admin,
                claim.id,
                ClaimUpdate {
                    metadata: json!({"days_late": 45}).as_object().cloned(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            Value::Object(updated.metadata),
            json!({"channel": "email", "days_late": 45})
        );
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    #[test]
    fn listing_respects_involvement() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        w.file_claim(policy.id, 400);
        let all = ClaimQuery::default();

        assert_eq!(w.shield.list_claims(&w.freelancer, &all, None).unwrap().len(), 1);
        assert_eq!(w.shield.list_claims(&w.client, &all, None).unwrap().len(), 1);
        assert!(w.shield.list_claims(&w.outsider, &all, None).unwrap().is_empty());
        assert_eq!(w.shield.admin_list_claims(&w.admin, &all, None).unwrap().len(), 1);
        assert_eq!(
            w.shield.admin_list_claims(&w.freelancer, &all, None).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );

        let paid = ClaimQuery { status: Some(ClaimStatus::Paid), ..Default::default() };
        assert!(w.shield.admin_list_claims(&w.admin, &paid, None).unwrap().is_empty());
    }

    #[test]
    fn outsiders_cannot_read_claims() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);
        assert_eq!(
            w.shield.get_claim(&w.outsider, claim.id).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
    }

    // ── Evidence ─────────────────────────────────────────────────────────────

    #[test]
    fn only_the_claimant_adds_evidence() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);
        let note = NewEvidence {
            evidence_type: "correspondence".into(),
            content: "client stopped replying on 3 March".into(),
            metadata: Metadata::new(),
        };

        for other in [w.admin, w.client] {
            let err = w.shield.add_text_evidence(&other, claim.id, note.clone()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        }
        let added = w.shield.add_text_evidence(&w.freelancer, claim.id, note).unwrap();
        assert!(matches!(added.content, EvidenceContent::Text { .. }));

        let detail = w.shield.get_claim(&w.client, claim.id).unwrap();
        assert_eq!(detail.evidence.len(), 1);
    }

    #[test]
    fn evidence_can_be_added_after_resolution() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);
        w.shield.update_claim(&w.admin, claim.id, set_status(ClaimStatus::Rejected)).unwrap();
        let note = NewEvidence {
            evidence_type: "appeal".into(),
            content: "new invoice attached".into(),
            metadata: Metadata::new(),
        };
        assert!(w.shield.add_text_evidence(&w.freelancer, claim.id, note).is_ok());
    }

    #[test]
    fn file_evidence_is_hashed_and_verifiable() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);
        let upload = FileUpload {
            evidence_type: "invoice".into(),
            file_name: "invoice.pdf".into(),
            content_type: Some("application/pdf".into()),
            metadata: Metadata::new(),
        };
        let evidence = w
            .shield
            .add_file_evidence(&w.freelancer, claim.id, upload, &mut Cursor::new(b"%PDF-1.7 body"))
            .unwrap();

        assert_eq!(evidence.metadata["original_filename"], json!("invoice.pdf"));
        assert_eq!(evidence.metadata["content_type"], json!("application/pdf"));
        assert_eq!(evidence.metadata["size"], json!(13));
        assert!(w.shield.verify_evidence(&w.admin, claim.id, evidence.id).unwrap());

        let EvidenceContent::File { path, .. } = &evidence.content else {
            panic!("expected file evidence");
        };
        std::fs::write(path, b"forged").unwrap();
        assert!(!w.shield.verify_evidence(&w.admin, claim.id, evidence.id).unwrap());
    }

    #[test]
    fn verifying_text_or_missing_evidence_fails() {
        let mut w = world();
        let policy = w.active_policy(50, 1_000);
        let claim = w.file_claim(policy.id, 400);
        let text = w
            .shield
            .add_text_evidence(
                &w.freelancer,
                claim.id,
                NewEvidence {
                    evidence_type: "note".into(),
                    content: "see thread".into(),
                    metadata: Metadata::new(),
                },
            )
            .unwrap();
        assert_eq!(
            w.shield.verify_evidence(&w.admin, claim.id, text.id).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            w.shield.verify_evidence(&w.admin, claim.id, EvidenceId(50)).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
