use ghost_types::EPOCH_LENGTH;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The configuration surface (spec.md §6): every knob the simulation
/// driver exposes to the outside world, plus the two fields
/// (`seed`, and `fork_choice_rule` staying a bare `String` rather than
/// `ghost_chain::ForkChoiceRule`) that keep this crate decoupled from
/// which engine crate happens to parse the rule name.
///
/// Grounded in `sim/config.go`'s `SimConfig`; `seed` has no Go
/// counterpart (the original seeds its one global RNG with the literal
/// `1234`) but is threaded through explicitly here so a run is
/// reproducible without hardcoding a constant (P2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    pub validator_count: u64,
    pub latency_factor: f64,
    pub slot_skip_chance: f64,
    pub base_attest_weight: u64,
    pub max_extra_attest_weight: u64,
    pub blocks: u64,
    pub attestations_per_block: u64,
    pub justify_epochs_ago: u64,
    pub finalize_epochs_ago: u64,
    pub fork_choice_rule: String,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            validator_count: EPOCH_LENGTH * 4,
            latency_factor: 0.9,
            slot_skip_chance: 0.4,
            base_attest_weight: 1,
            max_extra_attest_weight: 9,
            blocks: 1_000,
            attestations_per_block: 4,
            justify_epochs_ago: 1,
            finalize_epochs_ago: 2,
            fork_choice_rule: "proto_array".to_string(),
            seed: 1234,
        }
    }
}

/// Configuration validation failures (spec.md §7, "Configuration" error
/// kind): fatal, reported before the simulation starts, mapped to a
/// non-zero exit code by the CLI (spec.md §6, "Exit codes").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ValidatorCountNotDivisibleByEpoch { validator_count: u64, epoch_length: u64 },
    FinalizeBeforeJustify { justify_epochs_ago: u64, finalize_epochs_ago: u64 },
    JustifyBelowOneEpoch { justify_epochs_ago: u64 },
    UnknownForkChoiceRule(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ValidatorCountNotDivisibleByEpoch {
                validator_count,
                epoch_length,
            } => write!(
                f,
                "validator_count {} is not divisible by EPOCH_LENGTH {}",
                validator_count, epoch_length
            ),
            ConfigError::FinalizeBeforeJustify {
                justify_epochs_ago,
                finalize_epochs_ago,
            } => write!(
                f,
                "finalize_epochs_ago {} must be >= justify_epochs_ago {}",
                finalize_epochs_ago, justify_epochs_ago
            ),
            ConfigError::JustifyBelowOneEpoch { justify_epochs_ago } => write!(
                f,
                "justify_epochs_ago {} must be >= 1",
                justify_epochs_ago
            ),
            ConfigError::UnknownForkChoiceRule(s) => write!(f, "unknown fork_choice_rule '{}'", s),
        }
    }
}

impl std::error::Error for ConfigError {}

impl SimConfig {
    /// Validates the configuration surface's documented constraints
    /// (spec.md §6): `validator_count` divisible by `EPOCH_LENGTH`,
    /// `finalize_epochs_ago >= justify_epochs_ago >= 1`, and a
    /// recognized `fork_choice_rule`. Does not construct a `Chain`, so
    /// it has no dependency on `ghost_chain`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validator_count % EPOCH_LENGTH != 0 {
            return Err(ConfigError::ValidatorCountNotDivisibleByEpoch {
                validator_count: self.validator_count,
                epoch_length: EPOCH_LENGTH,
            });
        }
        if self.justify_epochs_ago < 1 {
            return Err(ConfigError::JustifyBelowOneEpoch {
                justify_epochs_ago: self.justify_epochs_ago,
            });
        }
        if self.finalize_epochs_ago < self.justify_epochs_ago {
            return Err(ConfigError::FinalizeBeforeJustify {
                justify_epochs_ago: self.justify_epochs_ago,
                finalize_epochs_ago: self.finalize_epochs_ago,
            });
        }
        match self.fork_choice_rule.as_str() {
            "spec" | "cached" | "vitalik" | "simple_back_prop" | "stateful" | "proto_array" => {}
            other => return Err(ConfigError::UnknownForkChoiceRule(other.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_validator_count_not_divisible_by_epoch() {
        let mut cfg = SimConfig::default();
        cfg.validator_count = EPOCH_LENGTH + 1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ValidatorCountNotDivisibleByEpoch { .. })
        ));
    }

    #[test]
    fn rejects_finalize_before_justify() {
        let mut cfg = SimConfig::default();
        cfg.justify_epochs_ago = 3;
        cfg.finalize_epochs_ago = 2;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::FinalizeBeforeJustify { .. })
        ));
    }

    #[test]
    fn rejects_unknown_fork_choice_rule() {
        let mut cfg = SimConfig::default();
        cfg.fork_choice_rule = "made_up".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::UnknownForkChoiceRule(_))));
    }
}
