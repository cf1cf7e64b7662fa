//! # Pipeline Configuration
//!
//! Tunable constants consumed by the two stages. The core never reads a
//! settings file; the host builds these structs (usually by deserializing its
//! own settings) and hands them in.

use crate::NeoError;
use crate::primitives::{
    DEFAULT_BASE_PREMIUM_EUR, DEFAULT_MIN_MISS_DISTANCE_KM, DEFAULT_MIN_VELOCITY_KM_S,
    DEFAULT_VELOCITY_DIVISOR,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// REFINEMENT
// =============================================================================

/// Thresholds and unit factors for the refinement stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Divisor turning `relative_velocity` into km/s.
    pub velocity_divisor: f64,
    /// Rows with `velocity_km_s <= min_velocity_km_s` are dropped. Not negative.
    pub min_velocity_km_s: f64,
    /// Rows with `miss_distance <= min_miss_distance_km` are dropped. Not negative.
    pub min_miss_distance_km: f64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            velocity_divisor: DEFAULT_VELOCITY_DIVISOR,
            min_velocity_km_s: DEFAULT_MIN_VELOCITY_KM_S,
            min_miss_distance_km: DEFAULT_MIN_MISS_DISTANCE_KM,
        }
    }
}

impl RefineConfig {
    /// Reject values the refinement stage cannot work with.
    pub fn validate(&self) -> Result<(), NeoError> {
        if !self.velocity_divisor.is_finite() || self.velocity_divisor <= 0.0 {
            return Err(NeoError::InvalidConfig(format!(
                "velocity_divisor must be a positive number, got {}",
                self.velocity_divisor
            )));
        }
        if !self.min_velocity_km_s.is_finite() || self.min_velocity_km_s < 0.0 {
            return Err(NeoError::InvalidConfig(format!(
                "min_velocity_km_s must be a finite, non-negative number, got {}",
                self.min_velocity_km_s
            )));
        }
        if !self.min_miss_distance_km.is_finite() || self.min_miss_distance_km < 0.0 {
            return Err(NeoError::InvalidConfig(format!(
                "min_miss_distance_km must be a finite, non-negative number, got {}",
                self.min_miss_distance_km
            )));
        }
        Ok(())
    }
}

// =============================================================================
// PRICING
// =============================================================================

/// Pricing parameters for the risk & pricing stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Base premium in EUR; must be positive.
    pub base_premium: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_premium: DEFAULT_BASE_PREMIUM_EUR,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), NeoError> {
        if !self.base_premium.is_finite() || self.base_premium <= 0.0 {
            return Err(NeoError::InvalidConfig(format!(
                "base_premium must be a positive number, got {}",
                self.base_premium
            )));
        }
        Ok(())
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Full configuration for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub refine: RefineConfig,
    pub pricing: PricingConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), NeoError> {
        self.refine.validate()?;
        self.pricing.validate()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.refine.velocity_divisor, 3.6);
        assert_eq!(config.refine.min_velocity_km_s, 0.1);
        assert_eq!(config.refine.min_miss_distance_km, 1000.0);
        assert_eq!(config.pricing.base_premium, 10_000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_divisor() {
        let config = RefineConfig {
            velocity_divisor: 0.0,
            ..RefineConfig::default()
        };
        assert!(matches!(config.validate(), Err(NeoError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_non_finite_threshold() {
        let config = RefineConfig {
            min_miss_distance_km: f64::NAN,
            ..RefineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_thresholds() {
        let config = RefineConfig {
            min_miss_distance_km: -10.0,
            ..RefineConfig::default()
        };
        assert!(matches!(config.validate(), Err(NeoError::InvalidConfig(_))));

        let config = RefineConfig {
            min_velocity_km_s: -0.5,
            ..RefineConfig::default()
        };
        assert!(matches!(config.validate(), Err(NeoError::InvalidConfig(_))));

        let zero = RefineConfig {
            min_velocity_km_s: 0.0,
            min_miss_distance_km: 0.0,
            ..RefineConfig::default()
        };
        assert!(zero.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_base_premium() {
        assert!(PricingConfig { base_premium: 0.0 }.validate().is_err());
        assert!(PricingConfig { base_premium: -5.0 }.validate().is_err());
        assert!(
            PricingConfig {
                base_premium: f64::INFINITY
            }
            .validate()
            .is_err()
        );
    }
}
