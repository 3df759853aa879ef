use thiserror::Error;
use tokio::task::JoinError;

use rumensim_config::ConfigError;
use rumensim_core::SimulationError;
use rumensim_transport::TransportError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
}
