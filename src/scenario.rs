//! Seeded synthetic workload.
//!
//! Drives a [`Shield`] through the same public operations a real caller
//! would use: backers fund the pool, freelancers buy and activate policies,
//! some policies are claimed and resolved, others expire, and some backers
//! withdraw. The same seed always produces the same ledger.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, LogNormal};
use serde::Serialize;

use crate::claim::{ClaimUpdate, NewClaim};
use crate::config::{ScenarioConfig, ShieldConfig};
use crate::error::{Result, ShieldError};
use crate::ledger::{LedgerStore, MemoryLedger};
use crate::policy::{NewPolicy, PolicyUpdate};
use crate::records::{ClaimStatus, PolicyStatus, PoolMetrics, WithdrawalStatus};
use crate::riskpool::NewDeposit;
use crate::shield::Shield;
use crate::types::{Actor, Amount};

/// Share of withdrawal requests an administrator completes rather than rejects.
const COMPLETION_PROBABILITY: f64 = 0.75;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioStats {
    pub users: u64,
    pub deposits: u64,
    pub policies: u64,
    pub claims_filed: u64,
    pub claims_paid: u64,
    pub claims_rejected: u64,
    pub policies_expired: u64,
    pub withdrawals_requested: u64,
    pub withdrawals_completed: u64,
    pub withdrawals_rejected: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub seed: u64,
    pub stats: ScenarioStats,
    /// Pool figures after the last operation.
    pub metrics: PoolMetrics,
}

pub struct Scenario {
    config: ScenarioConfig,
    rng: ChaCha20Rng,
    deposit_size: LogNormal<f64>,
    coverage_size: LogNormal<f64>,
}

impl Scenario {
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        let deposit_size = LogNormal::new(config.deposit_mu, config.deposit_sigma)
            .map_err(|e| ShieldError::Validation(format!("deposit size distribution: {e}")))?;
        let coverage_size = LogNormal::new(config.coverage_mu, config.coverage_sigma)
            .map_err(|e| ShieldError::Validation(format!("coverage size distribution: {e}")))?;
        Ok(Scenario {
            rng: ChaCha20Rng::seed_from_u64(config.seed),
            config,
            deposit_size,
            coverage_size,
        })
    }

    fn sample(&mut self, dist: LogNormal<f64>) -> Amount {
        (dist.sample(&mut self.rng) as Amount).max(1)
    }

    pub fn run<L: LedgerStore>(&mut self, shield: &mut Shield<L>) -> Result<ScenarioReport> {
        let mut stats = ScenarioStats::default();
        let admin = Actor::admin(shield.register_user("admin@scenario.local", true)?.id);
        stats.users += 1;

        // ── Capital ──────────────────────────────────────────────────────────
        let mut backers = Vec::with_capacity(self.config.backers);
        for i in 0..self.config.backers {
            let backer =
                Actor::user(shield.register_user(&format!("backer{i}@scenario.local"), false)?.id);
            let amount = self.sample(self.deposit_size);
            shield.create_deposit(
                &backer,
                NewDeposit { amount, reference: Some(format!("wire-{i}")), ..Default::default() },
            )?;
            stats.users += 1;
            stats.deposits += 1;
            backers.push(backer);
        }

        // ── Policies and claims ──────────────────────────────────────────────
        for i in 0..self.config.freelancers {
            let email = format!("freelancer{i}@scenario.local");
            let freelancer = Actor::user(shield.register_user(&email, false)?.id);
            stats.users += 1;
            for j in 0..self.config.policies_per_freelancer {
                let coverage = self.sample(self.coverage_size);
                let premium =
                    ((coverage as f64 * self.config.premium_rate).round() as Amount).max(1);
                let policy = shield.create_policy(
                    &freelancer,
                    NewPolicy {
                        premium_amount: premium,
                        coverage_amount: coverage,
                        policy_type: "project".into(),
                        project_name: Some(format!("project {i}-{j}")),
                        ..Default::default()
                    },
                )?;
                shield.update_policy(&freelancer, policy.id, set_policy(PolicyStatus::Active))?;
                stats.policies += 1;

                if self.rng.random_bool(self.config.claim_probability) {
                    let amount = self.rng.random_range(1..=coverage);
                    let claim = shield.file_claim(
                        &freelancer,
                        NewClaim {
                            policy_id: policy.id,
                            claim_amount: amount,
                            evidence_description: "client did not pay the final invoice".into(),
                            ..Default::default()
                        },
                    )?;
                    stats.claims_filed += 1;
                    shield.update_claim(&admin, claim.id, set_claim(ClaimStatus::UnderReview))?;
                    if self.rng.random_bool(self.config.payout_probability) {
                        shield.update_claim(&admin, claim.id, set_claim(ClaimStatus::Approved))?;
                        shield.update_claim(&admin, claim.id, set_claim(ClaimStatus::Paid))?;
                        stats.claims_paid += 1;
                    } else {
                        shield.update_claim(&admin, claim.id, set_claim(ClaimStatus::Rejected))?;
                        stats.claims_rejected += 1;
                    }
                } else if self.rng.random_bool(self.config.expiry_probability) {
                    shield.update_policy(&admin, policy.id, set_policy(PolicyStatus::Expired))?;
                    stats.policies_expired += 1;
                }
            }
        }

        // ── Withdrawals ──────────────────────────────────────────────────────
        for backer in &backers {
            if !self.rng.random_bool(self.config.withdrawal_probability) {
                continue;
            }
            let available = shield.summary(backer)?.user.available_for_withdrawal;
            if available == 0 {
                continue;
            }
            let amount = self.rng.random_range(1..=available);
            let request = shield.request_withdrawal(backer, amount, None)?;
            stats.withdrawals_requested += 1;
            if self.rng.random_bool(COMPLETION_PROBABILITY) {
                shield.process_withdrawal(&admin, request.id, WithdrawalStatus::Completed, None)?;
                stats.withdrawals_completed += 1;
            } else {
                let note = Some("insufficient documentation".to_string());
                shield.process_withdrawal(&admin, request.id, WithdrawalStatus::Rejected, note)?;
                stats.withdrawals_rejected += 1;
            }
        }

        let metrics = shield.current_metrics(&admin)?.values;
        Ok(ScenarioReport { seed: self.config.seed, stats, metrics })
    }
}

fn set_policy(status: PolicyStatus) -> PolicyUpdate {
    PolicyUpdate { status: Some(status), ..Default::default() }
}

fn set_claim(status: ClaimStatus) -> ClaimUpdate {
    ClaimUpdate { status: Some(status), ..Default::default() }
}

/// Run the configured scenario with `seed` against a fresh in-memory shield.
pub fn run_seed(
    config: &ShieldConfig,
    seed: u64,
) -> Result<(Shield<MemoryLedger>, ScenarioReport)> {
    let mut scenario_config = config.scenario.clone();
    scenario_config.seed = seed;
    let mut shield = Shield::in_memory(config.clone());
    let report = Scenario::new(scenario_config)?.run(&mut shield)?;
    Ok((shield, report))
}
