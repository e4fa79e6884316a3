use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShieldError};

/// Knobs for the synthetic workload used by `shield simulate`.
/// All monetary values in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub seed: u64,
    pub freelancers: usize,
    /// Users who only contribute capital.
    pub backers: usize,
    pub policies_per_freelancer: usize,
    /// ln-space parameters of the deposit size distribution.
    pub deposit_mu: f64,
    pub deposit_sigma: f64,
    /// ln-space parameters of the coverage amount distribution.
    pub coverage_mu: f64,
    pub coverage_sigma: f64,
    /// Premium as a fraction of coverage.
    pub premium_rate: f64,
    pub claim_probability: f64,
    /// Probability that a filed claim ends up paid rather than rejected.
    pub payout_probability: f64,
    /// Probability that an unclaimed policy is expired by the end of the run.
    pub expiry_probability: f64,
    pub withdrawal_probability: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

impl ScenarioConfig {
    pub fn canonical() -> Self {
        ScenarioConfig {
            seed: 42,
            freelancers: 40,
            backers: 10,
            policies_per_freelancer: 3,
            // mu=13.1, sigma=0.8 → median ≈ $4.9k per deposit
            deposit_mu: 13.1,
            deposit_sigma: 0.8,
            // mu=12.2, sigma=0.6 → median ≈ $2k coverage per project
            coverage_mu: 12.2,
            coverage_sigma: 0.6,
            premium_rate: 0.05,
            claim_probability: 0.08,
            payout_probability: 0.6,
            expiry_probability: 0.3,
            withdrawal_probability: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Policy length applied when a policy is created without an end date.
    pub policy_term_days: i64,
    /// Page size used when a list request does not give one.
    pub page_limit: usize,
    pub evidence_dir: PathBuf,
    pub scenario: ScenarioConfig,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

impl ShieldConfig {
    pub fn canonical() -> Self {
        ShieldConfig {
            policy_term_days: 30,
            page_limit: 100,
            evidence_dir: PathBuf::from("uploads/evidence"),
            scenario: ScenarioConfig::canonical(),
        }
    }

    /// Overlay a TOML file on the canonical config; absent keys keep their
    /// canonical values.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ShieldConfig = toml::from_str(text)
            .map_err(|e| ShieldError::Validation(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.policy_term_days <= 0 {
            return Err(ShieldError::Validation("policy_term_days must be positive".into()));
        }
        if self.page_limit == 0 {
            return Err(ShieldError::Validation("page_limit must be positive".into()));
        }
        let s = &self.scenario;
        for (name, p) in [
            ("claim_probability", s.claim_probability),
            ("payout_probability", s.payout_probability),
            ("expiry_probability", s.expiry_probability),
            ("withdrawal_probability", s.withdrawal_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ShieldError::Validation(format!("{name} must be within [0, 1]")));
            }
        }
        if s.deposit_sigma <= 0.0 || s.coverage_sigma <= 0.0 {
            return Err(ShieldError::Validation("distribution sigma must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_config_is_valid() {
        ShieldConfig::canonical().validate().unwrap();
        assert_eq!(ShieldConfig::canonical().policy_term_days, 30);
    }

    #[test]
    fn toml_overlay_keeps_unspecified_defaults() {
        let config = ShieldConfig::from_toml_str(
            r#"
            page_limit = 25

            [scenario]
            seed = 7
            freelancers = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.page_limit, 25);
        assert_eq!(config.policy_term_days, 30);
        assert_eq!(config.scenario.seed, 7);
        assert_eq!(config.scenario.freelancers, 3);
        assert_eq!(config.scenario.backers, ScenarioConfig::canonical().backers);
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let err = ShieldConfig::from_toml_str("[scenario]\nclaim_probability = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("claim_probability"));
    }

    #[test]
    fn non_positive_term_is_rejected() {
        assert!(ShieldConfig::from_toml_str("policy_term_days = 0").is_err());
    }
}
