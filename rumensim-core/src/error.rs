use thiserror::Error;

/// Unified error type for the simulation kernel.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Processing error: {0}")]
    Processing(String),
}
