//! Typed control commands.
//!
//! Inbound `(topic, payload)` messages become one of these variants before
//! any state is touched, so vessel and clock mutation happens in exactly one
//! place (the dispatcher) instead of inside transport callbacks. A message
//! that fails to parse is an error value, never a panic.

use serde::Deserialize;
use thiserror::Error;

use rumensim_core::vessel::FlaskId;
use rumensim_transport::topic;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Not a control topic: {0}")]
    NotControl(String),

    #[error("Unknown command kind: {0}")]
    UnknownKind(String),

    #[error("Malformed {kind} payload: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One inbound control command, see the dispatcher for the effects.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SpeedChange {
        speed: f64,
    },
    Pause,
    Resume,
    StartWithDelay {
        assay_id: String,
        delay_seconds: u64,
    },
    StopWithLimit {
        assay_id: String,
        flask_id: FlaskId,
        duration_hours: f64,
    },
    EmergencyShutdown {
        assay_id: String,
    },
    ReliefConfig {
        assay_id: String,
        relief_pressure: f64,
        warning_threshold: f64,
    },
    InitialConfig {
        flask_id: FlaskId,
        accumulated_pressure: f64,
        total_volume_ml: f64,
        solution_volume_ml: f64,
        temperature_c: f64,
    },
}

#[derive(Deserialize)]
struct SpeedPayload {
    speed: f64,
}

#[derive(Deserialize)]
struct StartWithDelayPayload {
    assay_id: String,
    #[serde(default = "default_delay")]
    delay_seconds: u64,
}

#[derive(Deserialize)]
struct StopWithLimitPayload {
    assay_id: String,
    flask_id: FlaskId,
    duration_hours: f64,
}

#[derive(Deserialize)]
struct EmergencyPayload {
    assay_id: String,
}

#[derive(Deserialize)]
struct ReliefConfigPayload {
    assay_id: String,
    #[serde(default = "default_relief")]
    relief_pressure: f64,
    #[serde(default = "default_warning")]
    warning_threshold: f64,
}

#[derive(Deserialize)]
struct InitialConfigPayload {
    flask_id: FlaskId,
    #[serde(default)]
    accumulated_pressure: f64,
    #[serde(default = "default_total_volume")]
    total_volume: f64,
    #[serde(default = "default_solution_volume")]
    solution_volume: f64,
    #[serde(default = "default_temperature")]
    temperature: f64,
}

fn default_delay() -> u64 {
    10
}
fn default_relief() -> f64 {
    1.5
}
fn default_warning() -> f64 {
    4.5
}
fn default_total_volume() -> f64 {
    350.0
}
fn default_solution_volume() -> f64 {
    200.0
}
fn default_temperature() -> f64 {
    39.0
}

impl ControlCommand {
    /// Parse a raw inbound message against the configured namespace.
    pub fn parse(namespace: &str, msg_topic: &str, payload: &[u8]) -> Result<Self, CommandError> {
        let kind = topic::control_command(namespace, msg_topic)
            .ok_or_else(|| CommandError::NotControl(msg_topic.to_string()))?;

        let malformed = |source| CommandError::Malformed {
            kind: kind.to_string(),
            source,
        };

        match kind {
            "speed" => {
                let p: SpeedPayload = serde_json::from_slice(payload).map_err(malformed)?;
                Ok(Self::SpeedChange { speed: p.speed })
            }
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "start-with-delay" => {
                let p: StartWithDelayPayload =
                    serde_json::from_slice(payload).map_err(malformed)?;
                Ok(Self::StartWithDelay {
                    assay_id: p.assay_id,
                    delay_seconds: p.delay_seconds,
                })
            }
            "stop-with-limit" => {
                let p: StopWithLimitPayload = serde_json::from_slice(payload).map_err(malformed)?;
                Ok(Self::StopWithLimit {
                    assay_id: p.assay_id,
                    flask_id: p.flask_id,
                    duration_hours: p.duration_hours,
                })
            }
            "emergency-shutdown" => {
                let p: EmergencyPayload = serde_json::from_slice(payload).map_err(malformed)?;
                Ok(Self::EmergencyShutdown {
                    assay_id: p.assay_id,
                })
            }
            "relief-config" => {
                let p: ReliefConfigPayload = serde_json::from_slice(payload).map_err(malformed)?;
                Ok(Self::ReliefConfig {
                    assay_id: p.assay_id,
                    relief_pressure: p.relief_pressure,
                    warning_threshold: p.warning_threshold,
                })
            }
            "initial-config" => {
                let p: InitialConfigPayload = serde_json::from_slice(payload).map_err(malformed)?;
                Ok(Self::InitialConfig {
                    flask_id: p.flask_id,
                    accumulated_pressure: p.accumulated_pressure,
                    total_volume_ml: p.total_volume,
                    solution_volume_ml: p.solution_volume,
                    temperature_c: p.temperature,
                })
            }
            other => Err(CommandError::UnknownKind(other.to_string())),
        }
    }
}
