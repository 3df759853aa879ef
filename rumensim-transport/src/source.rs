//! Inbound control-message seam.

use async_trait::async_trait;
use bytes::Bytes;

/// One raw inbound message. Interpretation happens in the engine; a message
/// the engine cannot parse is logged and dropped there.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Delivers control messages to the dispatcher. `None` means the source is
/// closed and no further messages will arrive.
#[async_trait]
pub trait CommandSource: Send {
    async fn next_message(&mut self) -> Option<InboundMessage>;
}
