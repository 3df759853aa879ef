//! Relief and warning thresholds with the hard safety ceiling.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Safety configuration parameters.
///
/// The ceiling bounds every threshold the system will ever accept, at load
/// time here and again when relief-config commands arrive at runtime.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[validate(schema(function = validate_safety))]
pub struct SafetyConfig {
    /// Pressure at which the relief valve fires (bar).
    #[serde(default = "default_relief")]
    #[validate(range(min = 0.1))]
    pub relief_threshold: f64,

    /// Pressure above which medium-severity alerts are raised (bar).
    #[serde(default = "default_warning")]
    #[validate(range(min = 0.1))]
    pub warning_threshold: f64,

    /// Hard upper bound for any configured relief threshold (bar). Glass
    /// vessels rupture well past this point.
    #[serde(default = "default_ceiling")]
    #[validate(range(min = 0.5, max = 20.0))]
    pub ceiling: f64,

    /// Lower bound applied to speed-change commands.
    #[serde(default = "default_min_speed")]
    #[validate(range(min = 0.001))]
    pub min_speed: f64,
}

fn validate_safety(config: &SafetyConfig) -> Result<(), ValidationError> {
    if config.relief_threshold > config.ceiling {
        return Err(ValidationError::new("relief_threshold_above_ceiling"));
    }
    Ok(())
}

fn default_relief() -> f64 {
    1.5
}
fn default_warning() -> f64 {
    4.5
}
fn default_ceiling() -> f64 {
    5.0
}
fn default_min_speed() -> f64 {
    1.0
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            relief_threshold: default_relief(),
            warning_threshold: default_warning(),
            ceiling: default_ceiling(),
            min_speed: default_min_speed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SafetyConfig::default().validate().unwrap();
    }

    #[test]
    fn relief_must_stay_under_ceiling() {
        let config = SafetyConfig {
            relief_threshold: 6.0,
            ..SafetyConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
