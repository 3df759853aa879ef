use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is gone; publishing can never succeed again.
    #[error("Transport closed")]
    Closed,

    /// A single publish failed; later publishes may succeed.
    #[error("Publish failed: {0}")]
    Publish(String),
}
