//! # rumensim-core
//!
//! Domain kernel for the rumen fermentation simulator: the Gompertz gas
//! production kinetics, thermal normalization, the pressure relief valve,
//! the time-warp clock, and the per-flask configuration/state blocks.
//!
//! Everything here is transport-agnostic. The engine crate owns scheduling
//! and publishing; this crate owns the math and the state transitions.
//!
//! ### Key Submodules:
//! - `model`: Gompertz kinetics and deterministic series sampling
//! - `thermal`: ideal-gas normalization and headspace mole accounting
//! - `relief`: per-flask relief valve state machine
//! - `time`: `WarpClock` mapping wall time to simulated time
//! - `vessel`: flask configuration and lock-wrapped runtime state
//! - `record`: telemetry and alert wire records

pub mod error;
pub mod model;
pub mod record;
pub mod relief;
pub mod thermal;
pub mod time;
pub mod vessel;

pub use error::SimulationError;

pub mod prelude {
    pub use crate::error::SimulationError;
    pub use crate::model::{GompertzModel, KineticParams};
    pub use crate::record::{AlertRecord, AlertSeverity, TelemetryEvent, TelemetryRecord};
    pub use crate::relief::{ReliefOutcome, ReliefValve};
    pub use crate::time::WarpClock;
    pub use crate::vessel::{FlaskId, SharedVesselState, VesselConfig, VesselState};
}
