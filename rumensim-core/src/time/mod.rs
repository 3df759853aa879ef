//! # Warp clock
//!
//! Maps wall-clock elapsed time to simulated time under a runtime-adjustable
//! speed multiplier. One clock is shared read-only by every flask loop; the
//! control dispatcher is the only writer.
//!
//! Invariant: `sim_time = paused ? frozen : sim_reference +
//! (now - wall_reference) * speed`. Every mutation re-anchors the references
//! at the current simulated instant, so speed changes and pause/resume never
//! produce a jump.

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::error::SimulationError;

#[derive(Debug, Clone, Copy)]
struct ClockState {
    wall_reference: Instant,
    sim_reference: DateTime<Utc>,
    speed: f64,
    paused: bool,
    frozen: DateTime<Utc>,
}

impl ClockState {
    fn project(&self, now: Instant) -> DateTime<Utc> {
        if self.paused {
            return self.frozen;
        }
        let elapsed_ns = now.duration_since(self.wall_reference).as_nanos() as f64;
        self.sim_reference + Duration::nanoseconds((elapsed_ns * self.speed) as i64)
    }
}

/// Process-wide simulated clock with runtime speed control.
///
/// Reads take a shared lock and never block each other; the three mutating
/// operations take the exclusive lock so a reference instant and multiplier
/// are always observed as one consistent snapshot.
#[derive(Debug)]
pub struct WarpClock {
    state: RwLock<ClockState>,
}

impl WarpClock {
    /// Clock starting at the current wall time.
    pub fn new(speed: f64) -> Result<Self, SimulationError> {
        Self::starting_at(Utc::now(), speed)
    }

    /// Clock whose simulated origin is `start`.
    pub fn starting_at(start: DateTime<Utc>, speed: f64) -> Result<Self, SimulationError> {
        check_speed(speed)?;
        Ok(Self {
            state: RwLock::new(ClockState {
                wall_reference: Instant::now(),
                sim_reference: start,
                speed,
                paused: false,
                frozen: start,
            }),
        })
    }

    /// Current simulated instant. Constant-time, never blocks other readers.
    pub fn now(&self) -> DateTime<Utc> {
        self.state.read().project(Instant::now())
    }

    pub fn speed(&self) -> f64 {
        self.state.read().speed
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    /// Change the speed multiplier without a discontinuity in simulated time.
    /// Non-positive multipliers are rejected and leave the clock unchanged.
    pub fn set_speed(&self, multiplier: f64) -> Result<(), SimulationError> {
        check_speed(multiplier)?;
        let mut state = self.state.write();
        let now = Instant::now();
        state.sim_reference = state.project(now);
        state.wall_reference = now;
        state.speed = multiplier;
        Ok(())
    }

    /// Freeze simulated time at the current instant. Idempotent.
    pub fn pause(&self) {
        let mut state = self.state.write();
        if !state.paused {
            state.frozen = state.project(Instant::now());
            state.paused = true;
        }
    }

    /// Resume from the frozen instant. Idempotent.
    pub fn resume(&self) {
        let mut state = self.state.write();
        if state.paused {
            state.paused = false;
            state.sim_reference = state.frozen;
            state.wall_reference = Instant::now();
        }
    }
}

fn check_speed(multiplier: f64) -> Result<(), SimulationError> {
    if multiplier <= 0.0 || !multiplier.is_finite() {
        return Err(SimulationError::Validation(format!(
            "speed multiplier must be positive, got {multiplier}"
        )));
    }
    Ok(())
}
