//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;
use crate::tally::DRAW_SENTINEL;

/// Tunables of the voting engine and its prediction markets.
///
/// Can be loaded from a TOML file via [`GovernanceConfig::from_toml_file`]
/// or built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Maximum number of choices per proposal, Abstain included.
    #[serde(default = "default_max_choices")]
    pub max_choices: u8,

    /// Fee withheld from a cancelled prediction stake, in basis points.
    #[serde(default = "default_cancellation_fee_bps")]
    pub cancellation_fee_bps: u16,

    /// Fixed-point scale of fractional-mode tallies (percentages sum to it).
    #[serde(default = "default_fractional_scale")]
    pub fractional_scale: u64,

    /// Bit width attested for encrypted choice indices.
    #[serde(default = "default_choice_bit_width")]
    pub choice_bit_width: u8,

    /// Bit width attested for encrypted fractional percentages.
    #[serde(default = "default_percentage_bit_width")]
    pub percentage_bit_width: u8,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_choices() -> u8 {
    16
}

fn default_cancellation_fee_bps() -> u16 {
    100
}

fn default_fractional_scale() -> u64 {
    100
}

fn default_choice_bit_width() -> u8 {
    8
}

fn default_percentage_bit_width() -> u8 {
    8
}

// ── Impl ───────────────────────────────────────────────────────────────

impl GovernanceConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, GovernanceError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| GovernanceError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, GovernanceError> {
        let config: Self = toml::from_str(s).map_err(|e| GovernanceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, GovernanceError> {
        toml::to_string_pretty(self).map_err(|e| GovernanceError::Config(e.to_string()))
    }

    /// Reject values that would break engine invariants.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.max_choices < 2 || self.max_choices >= DRAW_SENTINEL {
            return Err(GovernanceError::Config(format!(
                "max_choices must be in 2..{DRAW_SENTINEL}, got {}",
                self.max_choices
            )));
        }
        if self.cancellation_fee_bps > 10_000 {
            return Err(GovernanceError::Config(format!(
                "cancellation_fee_bps must be <= 10000, got {}",
                self.cancellation_fee_bps
            )));
        }
        if self.fractional_scale == 0 {
            return Err(GovernanceError::Config("fractional_scale must be non-zero".into()));
        }
        // The highest choice index and a full-scale share must both be provable.
        if !fits_in_bits(u128::from(self.max_choices - 1), self.choice_bit_width) {
            return Err(GovernanceError::Config(format!(
                "max_choices {} does not fit choice_bit_width {}",
                self.max_choices, self.choice_bit_width
            )));
        }
        if !fits_in_bits(u128::from(self.fractional_scale), self.percentage_bit_width) {
            return Err(GovernanceError::Config(format!(
                "fractional_scale {} does not fit percentage_bit_width {}",
                self.fractional_scale, self.percentage_bit_width
            )));
        }
        Ok(())
    }
}

fn fits_in_bits(value: u128, bits: u8) -> bool {
    bits >= 128 || value < (1u128 << bits)
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            max_choices: default_max_choices(),
            cancellation_fee_bps: default_cancellation_fee_bps(),
            fractional_scale: default_fractional_scale(),
            choice_bit_width: default_choice_bit_width(),
            percentage_bit_width: default_percentage_bit_width(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = GovernanceConfig::from_toml_str("").unwrap();
        assert_eq!(config, GovernanceConfig::default());
        assert_eq!(config.cancellation_fee_bps, 100);
        assert_eq!(config.fractional_scale, 100);
    }

    #[test]
    fn test_partial_override() {
        let config = GovernanceConfig::from_toml_str("max_choices = 8\n").unwrap();
        assert_eq!(config.max_choices, 8);
        assert_eq!(config.cancellation_fee_bps, 100);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = GovernanceConfig {
            cancellation_fee_bps: 250,
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(GovernanceConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_sentinel_sized_choice_count_rejected() {
        let err = GovernanceConfig::from_toml_str("max_choices = 255\n").unwrap_err();
        assert!(matches!(err, GovernanceError::Config(_)));
    }

    #[test]
    fn test_fee_above_100_percent_rejected() {
        assert!(GovernanceConfig::from_toml_str("cancellation_fee_bps = 10001\n").is_err());
    }

    #[test]
    fn test_scale_wider_than_percentage_bits_rejected() {
        let err = GovernanceConfig::from_toml_str("fractional_scale = 1000\n").unwrap_err();
        assert!(matches!(err, GovernanceError::Config(_)));
        let widened = "fractional_scale = 1000\npercentage_bit_width = 10\n";
        assert_eq!(GovernanceConfig::from_toml_str(widened).unwrap().fractional_scale, 1000);
    }

    #[test]
    fn test_choices_wider_than_choice_bits_rejected() {
        assert!(GovernanceConfig::from_toml_str("choice_bit_width = 3\n").is_err());
        let config = GovernanceConfig::from_toml_str("choice_bit_width = 3\nmax_choices = 8\n").unwrap();
        assert_eq!(config.max_choices, 8);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cancellation_fee_bps = 50").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let config = GovernanceConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.cancellation_fee_bps, 50);
    }
}
