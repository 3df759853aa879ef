//! Simulation configuration parameters.
//!
//! Flask count, sampling cadence, time-warp defaults, and the kinetic
//! profiles that seed each assay's flasks.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Kinetic profile of one feedstock: the Gompertz shape parameters.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct KineticProfile {
    /// Asymptotic pressure (bar).
    pub a: f64,
    /// Maximum production rate (bar/h).
    pub mu: f64,
    /// Lag time (h).
    pub lambda: f64,
}

/// Simulation configuration parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct SimulationConfig {
    /// Number of flasks in the assay.
    #[serde(default = "default_num_flasks")]
    #[validate(range(min = 1, max = 30))]
    pub num_flasks: u32,

    /// Virtual sampling interval between ticks (minutes).
    #[serde(default = "default_interval")]
    #[validate(range(min = 1, max = 120))]
    pub sampling_interval_min: u32,

    /// Total virtual duration of the run (hours).
    #[serde(default = "default_duration")]
    #[validate(range(min = 0.1, max = 500.0))]
    pub duration_hours: f64,

    /// Initial simulated-to-wall time ratio.
    #[serde(default = "default_speed")]
    #[validate(custom(function = validation::validate_positive))]
    pub speed_multiplier: f64,

    /// Gaussian measurement noise as a fraction of the reading. Zero makes
    /// the run fully deterministic.
    #[serde(default = "default_noise")]
    #[validate(range(min = 0.0, max = 0.2))]
    pub noise_fraction: f64,

    /// Smallest real sleep between ticks (ms), bounding the publish rate at
    /// extreme speed multipliers.
    #[serde(default = "default_tick_floor")]
    #[validate(range(min = 50, max = 10_000))]
    pub tick_floor_ms: u64,

    /// Initial fill pressure of every flask (bar).
    #[serde(default = "default_baseline")]
    #[validate(range(min = 0.1, max = 5.0))]
    pub baseline_bar: f64,

    /// Incubation temperature (°C).
    #[serde(default = "default_temperature")]
    #[validate(range(min = 20.0, max = 60.0))]
    pub temperature_c: f64,

    /// Assay identifier; generated from the date when absent.
    #[serde(default)]
    pub assay_id: Option<String>,

    /// Feedstock profiles assigned to flasks round-robin.
    #[serde(default = "default_profiles")]
    #[validate(custom(function = validation::validate_profiles))]
    pub profiles: Vec<KineticProfile>,

    /// Jitter kinetic parameters per replicate flask.
    #[serde(default = "default_true")]
    pub replicate_variation: bool,

    /// Seed for replicate jitter and measurement noise.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl SimulationConfig {
    /// Resolved assay id: configured value or `SAQ` plus the UTC month/day,
    /// matching the instrument's run-naming convention.
    pub fn assay_id(&self) -> String {
        self.assay_id
            .clone()
            .unwrap_or_else(|| format!("SAQ{}", Utc::now().format("%m%d")))
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_flasks: default_num_flasks(),
            sampling_interval_min: default_interval(),
            duration_hours: default_duration(),
            speed_multiplier: default_speed(),
            noise_fraction: default_noise(),
            tick_floor_ms: default_tick_floor(),
            baseline_bar: default_baseline(),
            temperature_c: default_temperature(),
            assay_id: None,
            profiles: default_profiles(),
            replicate_variation: default_true(),
            seed: default_seed(),
        }
    }
}

fn default_num_flasks() -> u32 {
    4
}
fn default_interval() -> u32 {
    15
}
fn default_duration() -> f64 {
    48.0
}
fn default_speed() -> f64 {
    1.0
}
fn default_noise() -> f64 {
    0.01
}
fn default_tick_floor() -> u64 {
    100
}
fn default_baseline() -> f64 {
    1.0
}
fn default_temperature() -> f64 {
    39.0
}
fn default_true() -> bool {
    true
}
fn default_seed() -> u64 {
    42
}

/// The four reference feedstocks used to seed flasks round-robin.
fn default_profiles() -> Vec<KineticProfile> {
    vec![
        // High-quality hay
        KineticProfile {
            a: 1.8,
            mu: 0.12,
            lambda: 2.5,
        },
        // Corn silage
        KineticProfile {
            a: 1.5,
            mu: 0.08,
            lambda: 3.0,
        },
        // Concentrate ration
        KineticProfile {
            a: 2.0,
            mu: 0.15,
            lambda: 1.8,
        },
        // Low-quality straw
        KineticProfile {
            a: 1.2,
            mu: 0.06,
            lambda: 4.0,
        },
    ]
}
