//! Flask configuration and runtime state.
//!
//! `VesselConfig` is immutable after assay initialization. `VesselState` is
//! owned by the flask's simulation loop; the control dispatcher mutates the
//! exposed fields (thresholds, solenoid, emergency latch) under the same
//! per-vessel lock, so one flask's reconfiguration never stalls another's
//! tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::model::KineticParams;
use crate::relief::ReliefValve;

pub type FlaskId = u32;

/// Immutable per-flask configuration, fixed at assay initialization.
#[derive(Debug, Clone)]
pub struct VesselConfig {
    /// Flask identifier, 1-based.
    pub flask_id: FlaskId,
    pub assay_id: String,
    pub params: KineticParams,
    /// Initial fill pressure (bar).
    pub baseline_bar: f64,
    /// Nominal incubation temperature (°C).
    pub nominal_temp_c: f64,
}

/// Mutable per-flask state, updated once per tick.
#[derive(Debug)]
pub struct VesselState {
    pub valve: ReliefValve,
    /// Pressure of the most recently emitted record (bar).
    pub last_pressure: f64,
    /// Simulated timestamp of the most recently emitted record.
    pub last_sim_time: Option<DateTime<Utc>>,
    /// Simulated instant the flask started producing.
    pub start_time: DateTime<Utc>,
    /// Current baseline fill pressure (bar); reset by start-with-delay.
    pub baseline_bar: f64,
    pub temperature_c: f64,
    /// While open (equalization, purge, emergency) the flask reports its
    /// baseline pressure and the relief valve is bypassed.
    pub solenoid_open: bool,
    /// Latched until an out-of-band reset; forces the solenoid open.
    emergency: bool,
    /// Latched by a deferred stop: the vessel vents permanently.
    purged: bool,
    /// Derived by the initial-config command via PV = nRT.
    pub headspace_liters: Option<f64>,
    pub moles: Option<f64>,
}

impl VesselState {
    pub fn new(config: &VesselConfig, valve: ReliefValve, start_time: DateTime<Utc>) -> Self {
        Self {
            valve,
            last_pressure: config.baseline_bar,
            last_sim_time: None,
            start_time,
            baseline_bar: config.baseline_bar,
            temperature_c: config.nominal_temp_c,
            solenoid_open: false,
            emergency: false,
            purged: false,
            headspace_liters: None,
            moles: None,
        }
    }

    pub fn set_emergency(&mut self) {
        self.emergency = true;
        self.solenoid_open = true;
    }

    pub fn emergency(&self) -> bool {
        self.emergency
    }

    /// Open the solenoid permanently; later close attempts are ignored.
    pub fn set_purged(&mut self) {
        self.purged = true;
        self.solenoid_open = true;
    }

    pub fn purged(&self) -> bool {
        self.purged
    }

    /// Emergency and permanent purge keep the solenoid open regardless of
    /// later close attempts.
    pub fn close_solenoid(&mut self) {
        if !self.emergency && !self.purged {
            self.solenoid_open = false;
        }
    }
}

pub type SharedVesselState = Arc<Mutex<VesselState>>;

/// Per-replicate jitter applied when building an assay's flasks, so parallel
/// flasks of one feedstock do not trace identical curves. Standard deviations
/// follow the observed spread between ANKOM replicates.
pub fn replicate_params(base: KineticParams, rng: &mut SmallRng) -> KineticParams {
    KineticParams {
        a: base.a * gaussian_factor(rng, 0.05),
        mu: base.mu * gaussian_factor(rng, 0.08),
        lambda: base.lambda * gaussian_factor(rng, 0.10),
    }
}

fn gaussian_factor(rng: &mut SmallRng, std_dev: f64) -> f64 {
    match Normal::new(1.0, std_dev) {
        // Factors are kept positive so jitter can never invalidate a profile.
        Ok(dist) => dist.sample(rng).max(0.5),
        Err(_) => 1.0,
    }
}

/// Zero-mean Gaussian perturbation scaled by the reading, per the ANKOM
/// noise model (sigma = fraction of the larger of reading and baseline).
pub fn measurement_noise<R: Rng>(rng: &mut R, reading: f64, baseline: f64, fraction: f64) -> f64 {
    if fraction <= 0.0 {
        return 0.0;
    }
    match Normal::new(0.0, fraction * reading.max(baseline)) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 0.0,
    }
}
