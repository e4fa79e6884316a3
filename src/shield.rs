//! The serving component.
//!
//! A [`Shield`] owns the ledger store, the evidence store and the config for
//! the lifetime of the process. Lifecycle operations live in `policy`,
//! `claim` and `riskpool` as further `impl Shield` blocks.

use chrono::Utc;
use tracing::info;

use crate::config::ShieldConfig;
use crate::error::{Result, ShieldError};
use crate::evidence::{EvidenceStore, FsEvidenceStore};
use crate::ledger::{LedgerStore, MemoryLedger};
use crate::records::User;
use crate::types::{Actor, Page, UserId};

pub struct Shield<L = MemoryLedger> {
    pub(crate) ledger: L,
    pub(crate) evidence: Box<dyn EvidenceStore>,
    pub(crate) config: ShieldConfig,
}

impl Shield<MemoryLedger> {
    /// Empty in-memory ledger; evidence files go under `config.evidence_dir`.
    pub fn in_memory(config: ShieldConfig) -> Self {
        let evidence = FsEvidenceStore::new(config.evidence_dir.clone());
        Shield::new(MemoryLedger::new(), Box::new(evidence), config)
    }
}

impl<L: LedgerStore> Shield<L> {
    pub fn new(ledger: L, evidence: Box<dyn EvidenceStore>, config: ShieldConfig) -> Self {
        Shield { ledger, evidence, config }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn into_ledger(self) -> L {
        self.ledger
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    // ── Users ────────────────────────────────────────────────────────────────

    /// Provision a user. Credentials belong to the identity collaborator; the
    /// core only keeps the id, email and flags it checks actors against.
    pub fn register_user(&mut self, email: &str, is_admin: bool) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ShieldError::Validation(format!("invalid email '{email}'")));
        }
        let user = self.ledger.transaction(|tx| {
            if tx.find_user_by_email(email)?.is_some() {
                return Err(ShieldError::Validation(format!("email {email} already registered")));
            }
            tx.insert_user(User {
                id: UserId::default(),
                email: email.to_string(),
                is_admin,
                is_active: true,
                created_at: Utc::now(),
            })
        })?;
        info!(user_id = %user.id, is_admin, "user registered");
        Ok(user)
    }

    /// Administrators may switch any account on or off. Inactive users are
    /// refused at every operation.
    pub fn set_user_active(
        &mut self,
        actor: &Actor,
        user_id: UserId,
        active: bool,
    ) -> Result<User> {
        self.authorize_admin(actor)?;
        let user = self.ledger.transaction(|tx| {
            let mut user = tx.require_user(user_id)?;
            user.is_active = active;
            tx.update_user(&user)?;
            Ok(user)
        })?;
        info!(user_id = %user.id, active, "user activation changed");
        Ok(user)
    }

    // ── Access checks ────────────────────────────────────────────────────────

    /// The actor must be a known, active user, and may only claim
    /// administrator rights the stored user record grants. Every operation
    /// passes through here, so `actor.is_admin` is trustworthy afterwards.
    pub(crate) fn authorize(&self, actor: &Actor) -> Result<User> {
        let user = self.ledger.get_user(actor.user_id)?.ok_or_else(|| {
            ShieldError::PermissionDenied(format!("unknown user {}", actor.user_id))
        })?;
        if !user.is_active {
            return Err(ShieldError::PermissionDenied(format!(
                "user {} is inactive",
                actor.user_id
            )));
        }
        if actor.is_admin && !user.is_admin {
            return Err(ShieldError::PermissionDenied(format!(
                "user {} is not an administrator",
                actor.user_id
            )));
        }
        Ok(user)
    }

    pub(crate) fn authorize_admin(&self, actor: &Actor) -> Result<User> {
        let user = self.authorize(actor)?;
        if !(actor.is_admin && user.is_admin) {
            return Err(ShieldError::PermissionDenied("administrator required".into()));
        }
        Ok(user)
    }

    pub(crate) fn page(&self, page: Option<Page>) -> Page {
        page.unwrap_or(Page::first(self.config.page_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testkit::world;

    #[test]
    fn duplicate_email_is_rejected() {
        let mut w = world();
        let err = w.shield.register_user("FREELANCER@shield.test", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut w = world();
        assert!(w.shield.register_user("   ", false).is_err());
        assert!(w.shield.register_user("no-at-sign", false).is_err());
    }

    #[test]
    fn unknown_actor_is_denied() {
        let w = world();
        let err = w.shield.authorize(&Actor::user(UserId(99))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn deactivated_actor_is_denied() {
        let mut w = world();
        w.shield.set_user_active(&w.admin, w.outsider.user_id, false).unwrap();
        let err = w.shield.authorize(&w.outsider).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.to_string().contains("inactive"));
    }

    #[test]
    fn only_admins_toggle_activation() {
        let mut w = world();
        let err = w
            .shield
            .set_user_active(&w.freelancer, w.outsider.user_id, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn admin_flag_must_match_stored_user() {
        let mut w = world();
        let forged = Actor::admin(w.outsider.user_id);
        let err = w.shield.set_user_active(&forged, w.freelancer.user_id, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.to_string().contains("not an administrator"));
        assert!(w.shield.authorize(&w.freelancer).unwrap().is_active);
    }

    #[test]
    fn admin_acting_without_flag_has_user_rights() {
        let w = world();
        let plain = Actor::user(w.admin.user_id);
        assert!(w.shield.authorize(&plain).is_ok());
        let err = w.shield.authorize_admin(&plain).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn default_page_uses_config_limit() {
        let w = world();
        assert_eq!(w.shield.page(None), Page::first(w.shield.config().page_limit));
    }
}
