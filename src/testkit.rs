//! Record builders shared by unit tests.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use crate::claim::NewClaim;
use crate::config::ShieldConfig;
use crate::policy::{NewPolicy, PolicyUpdate};
use crate::records::{
    Claim, ClaimStatus, Deposit, Policy, PolicyStatus, RiskPoolWithdrawal, WithdrawalStatus,
};
use crate::shield::Shield;
use crate::types::{Actor, Amount, ClaimId, DepositId, PolicyId, UserId, WithdrawalId};

pub fn policy(freelancer: u64, premium: Amount, coverage: Amount, status: PolicyStatus) -> Policy {
    let now = Utc::now();
    Policy {
        id: PolicyId::default(),
        freelancer_id: UserId(freelancer),
        client_id: None,
        premium_amount: premium,
        coverage_amount: coverage,
        policy_type: "project".to_string(),
        project_name: None,
        project_description: None,
        status,
        start_date: now,
        end_date: now + Duration::days(30),
        metadata: Default::default(),
        created_at: now,
        last_updated: now,
    }
}

pub fn claim(policy_id: PolicyId, claimant: u64, amount: Amount, status: ClaimStatus) -> Claim {
    let now = Utc::now();
    Claim {
        id: ClaimId::default(),
        policy_id,
        claimant_id: UserId(claimant),
        claim_amount: amount,
        evidence_description: "client did not pay".to_string(),
        status,
        reviewer_id: None,
        resolution_notes: None,
        resolution_time: None,
        metadata: Default::default(),
        submission_time: now,
        last_updated: now,
    }
}

pub fn deposit(user: u64, amount: Amount, active: bool) -> Deposit {
    Deposit {
        id: DepositId::default(),
        user_id: UserId(user),
        amount,
        reference: None,
        metadata: Default::default(),
        timestamp: Utc::now(),
        is_active: active,
    }
}

pub fn withdrawal(user: u64, amount: Amount, status: WithdrawalStatus) -> RiskPoolWithdrawal {
    RiskPoolWithdrawal {
        id: WithdrawalId::default(),
        user_id: UserId(user),
        amount,
        status,
        notes: None,
        timestamp: Utc::now(),
        processed_time: None,
    }
}

// ── Service fixtures ─────────────────────────────────────────────────────────

/// A fresh in-memory shield with four registered users:
/// admin (1), freelancer (2), client (3), outsider (4).
pub struct World {
    pub shield: Shield,
    pub admin: Actor,
    pub freelancer: Actor,
    pub client: Actor,
    pub outsider: Actor,
    _evidence_dir: TempDir,
}

pub fn world() -> World {
    let dir = tempfile::tempdir().unwrap();
    let config =
        ShieldConfig { evidence_dir: dir.path().to_path_buf(), ..ShieldConfig::canonical() };
    let mut shield = Shield::in_memory(config);
    let admin = shield.register_user("admin@shield.test", true).unwrap();
    let freelancer = shield.register_user("freelancer@shield.test", false).unwrap();
    let client = shield.register_user("client@shield.test", false).unwrap();
    let outsider = shield.register_user("outsider@shield.test", false).unwrap();
    World {
        shield,
        admin: Actor::admin(admin.id),
        freelancer: Actor::user(freelancer.id),
        client: Actor::user(client.id),
        outsider: Actor::user(outsider.id),
        _evidence_dir: dir,
    }
}

impl World {
    /// Freelancer-owned policy naming the client, already activated.
    pub fn active_policy(&mut self, premium: Amount, coverage: Amount) -> Policy {
        let created = self
            .shield
            .create_policy(
                &self.freelancer,
                NewPolicy {
                    premium_amount: premium,
                    coverage_amount: coverage,
                    policy_type: "project".into(),
                    client_email: Some("client@shield.test".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        self.shield
            .update_policy(
                &self.freelancer,
                created.id,
                PolicyUpdate { status: Some(PolicyStatus::Active), ..Default::default() },
            )
            .unwrap()
    }

    pub fn file_claim(&mut self, policy_id: PolicyId, amount: Amount) -> Claim {
        self.shield
            .file_claim(
                &self.freelancer,
                NewClaim {
                    policy_id,
                    claim_amount: amount,
                    evidence_description: "client went silent".into(),
                    metadata: Default::default(),
                },
            )
            .unwrap()
    }
}
