//! Outbound publish seam.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::error::TransportError;

/// Anything able to deliver a `(topic, payload)` publish. Failures are
/// reported to the caller, which logs and drops; the core never retries.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;
}

/// Sink that prints each publish as a log line. Stands in for a broker when
/// running the simulator standalone.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl TelemetrySink for LogSink {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        info!(topic, payload = %String::from_utf8_lossy(&payload), "publish");
        Ok(())
    }
}
