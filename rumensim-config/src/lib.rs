//! # Rumensim Configuration System
//!
//! Hierarchical configuration for the fermentation simulator.
//!
//! ## Features
//! - **Unified Configuration**: single source of truth across all crates
//! - **Validation**: range and cross-field validation of safety-critical
//!   parameters at load time
//! - **Environment Awareness**: YAML file plus `RUMENSIM_*` overrides

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod broker;
mod error;
mod safety;
mod simulation;
mod validation;

pub use broker::BrokerConfig;
pub use error::ConfigError;
pub use safety::SafetyConfig;
pub use simulation::{KineticProfile, SimulationConfig};

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct RumensimConfig {
    /// Flask count, sampling cadence, kinetic profiles, time-warp defaults.
    #[validate(nested)]
    pub simulation: SimulationConfig,

    /// Pub/sub namespace and broker endpoint (interface-level only; the
    /// embedding process owns connection establishment).
    #[validate(nested)]
    pub broker: BrokerConfig,

    /// Relief/warning thresholds and the safety ceiling.
    #[validate(nested)]
    pub safety: SafetyConfig,
}

impl RumensimConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/rumensim.yaml` - base settings. If missing, defaults apply.
    /// 3. `RUMENSIM_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(RumensimConfig::default()));

        if Path::new("config/rumensim.yaml").exists() {
            figment = figment.merge(Yaml::file("config/rumensim.yaml"));
        }

        figment
            .merge(Env::prefixed("RUMENSIM_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Re-validate after programmatic mutation (CLI overrides).
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        self.validate().map_err(ConfigError::from)
    }

    /// Load configuration from a specific path for testing/validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(
                path.to_string_lossy().to_string(),
            )));
        }

        Figment::from(Serialized::defaults(RumensimConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("RUMENSIM_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_validation() {
        let config = RumensimConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn rejects_out_of_range_flask_count() {
        let mut config = RumensimConfig::default();
        config.simulation.num_flasks = 0;
        assert!(config.validate().is_err());
        config.simulation.num_flasks = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_interval() {
        let mut config = RumensimConfig::default();
        config.simulation.sampling_interval_min = 121;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_speed() {
        let mut config = RumensimConfig::default();
        config.simulation.speed_multiplier = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_relief_above_ceiling() {
        let mut config = RumensimConfig::default();
        config.safety.relief_threshold = 5.5;
        assert!(config.validate().is_err());
    }
}
