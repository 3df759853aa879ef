//! Telemetry and alert wire records.
//!
//! One `TelemetryRecord` is produced per flask per tick and handed straight
//! to the sink; the core retains nothing beyond the last pressure/timestamp
//! pair needed for the next accumulation rate. Field names and decimal
//! precision match the dashboard contract: pressures to 3 places,
//! temperature to 1, accumulation rate to 4.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::vessel::FlaskId;

pub const SCHEMA_VERSION: u32 = 1;

/// Event tag carried by a record when the relief valve fired on its tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryEvent {
    Relief,
}

/// Severity attached to alert records: `High` when the relief valve fired,
/// `Medium` for a warning-threshold crossing that did not reach relief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    High,
    Medium,
}

/// Per-tick telemetry payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub schema_version: u32,
    pub msg_id: String,
    pub assay_id: String,
    pub flask_id: FlaskId,
    #[serde(serialize_with = "iso8601_utc")]
    pub ts: DateTime<Utc>,
    #[serde(rename = "P_bar_abs")]
    pub p_bar_abs: f64,
    #[serde(rename = "T_C")]
    pub t_c: f64,
    #[serde(rename = "P_bar_std")]
    pub p_bar_std: f64,
    pub accum_bar_per_h: f64,
    pub relief_count: u64,
    pub time_elapsed_h: f64,
    pub speed_multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub event: Option<TelemetryEvent>,
}

/// Inputs for one record, before rounding and id assignment.
#[derive(Debug, Clone)]
pub struct Reading {
    pub assay_id: String,
    pub flask_id: FlaskId,
    pub ts: DateTime<Utc>,
    pub p_bar_abs: f64,
    pub t_c: f64,
    pub p_bar_std: f64,
    pub accum_bar_per_h: f64,
    pub relief_count: u64,
    pub time_elapsed_h: f64,
    pub speed_multiplier: f64,
    pub event: Option<TelemetryEvent>,
}

impl TelemetryRecord {
    /// Build a record with a fresh message id and the contract's rounding.
    pub fn from_reading(reading: Reading) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            msg_id: Uuid::new_v4().to_string(),
            assay_id: reading.assay_id,
            flask_id: reading.flask_id,
            ts: reading.ts,
            p_bar_abs: round_to(reading.p_bar_abs, 3),
            t_c: round_to(reading.t_c, 1),
            p_bar_std: round_to(reading.p_bar_std, 3),
            accum_bar_per_h: round_to(reading.accum_bar_per_h, 4),
            relief_count: reading.relief_count,
            time_elapsed_h: round_to(reading.time_elapsed_h, 2),
            speed_multiplier: reading.speed_multiplier,
            event: reading.event,
        }
    }
}

/// Higher-severity copy of a record, published on the alert topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(flatten)]
    pub record: TelemetryRecord,
    pub severity: AlertSeverity,
}

pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn iso8601_utc<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
