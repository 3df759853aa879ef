//! # rumensim-engine
//!
//! Scheduling and control layer: one supervised task per flask plus one
//! control dispatcher, all sharing the warp clock and the per-flask state
//! blocks. The supervisor is an explicit handle owned by the embedding
//! process; stopping it cancels every task deterministically.

pub mod command;
pub mod deferred;
pub mod dispatcher;
pub mod error;
pub mod supervisor;
pub mod vessel;

pub use command::{CommandError, ControlCommand};
pub use deferred::DeferredPurges;
pub use dispatcher::Dispatcher;
pub use error::EngineError;
pub use supervisor::Supervisor;
pub use vessel::{VesselHandle, VesselRuntime};
