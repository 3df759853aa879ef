//! Topic naming conventions.
//!
//! Telemetry: `{namespace}/{assay_id}/{flask_id}/telemetry`
//! Alerts:    `{namespace}/{assay_id}/{flask_id}/alert`
//! Control:   `{namespace}/control/{command}`

/// Segment under which control commands arrive.
pub const CONTROL_SEGMENT: &str = "control";

pub fn telemetry(namespace: &str, assay_id: &str, flask_id: u32) -> String {
    format!("{namespace}/{assay_id}/{flask_id}/telemetry")
}

pub fn alert(namespace: &str, assay_id: &str, flask_id: u32) -> String {
    format!("{namespace}/{assay_id}/{flask_id}/alert")
}

pub fn control(namespace: &str, command: &str) -> String {
    format!("{namespace}/{CONTROL_SEGMENT}/{command}")
}

/// The trailing command segment of a control topic, if it is one.
pub fn control_command<'a>(namespace: &str, topic: &'a str) -> Option<&'a str> {
    let rest = topic.strip_prefix(namespace)?.strip_prefix('/')?;
    rest.strip_prefix(CONTROL_SEGMENT)?.strip_prefix('/')
}
