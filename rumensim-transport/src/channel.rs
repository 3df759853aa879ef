//! In-memory transport over tokio channels.
//!
//! Backs integration tests and in-process embedding: the receiver half plays
//! the broker. A dropped receiver surfaces as `TransportError::Closed`,
//! which is the fatal-at-startup case the embedding process handles.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::sink::TelemetrySink;
use crate::source::{CommandSource, InboundMessage};

/// A message that reached the sink half.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Sink half of an in-memory telemetry channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<PublishedMessage>,
}

#[async_trait]
impl TelemetrySink for ChannelSink {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        self.tx
            .send(PublishedMessage {
                topic: topic.to_string(),
                payload,
            })
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// Build a telemetry channel: the sink goes to the engine, the receiver to
/// whatever plays consumer.
pub fn telemetry_channel(capacity: usize) -> (ChannelSink, mpsc::Receiver<PublishedMessage>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelSink { tx }, rx)
}

/// Source half of an in-memory command channel.
#[derive(Debug)]
pub struct ChannelCommandSource {
    rx: mpsc::Receiver<InboundMessage>,
}

#[async_trait]
impl CommandSource for ChannelCommandSource {
    async fn next_message(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }
}

/// Build a command channel: the sender goes to the transport integration,
/// the source to the engine's dispatcher.
pub fn command_channel(capacity: usize) -> (mpsc::Sender<InboundMessage>, ChannelCommandSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, ChannelCommandSource { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_receiver() {
        let (sink, mut rx) = telemetry_channel(8);
        sink.publish("rumen/a/1/telemetry", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "rumen/a/1/telemetry");
        assert_eq!(msg.payload, Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn dropped_receiver_is_closed() {
        let (sink, rx) = telemetry_channel(1);
        drop(rx);
        let err = sink
            .publish("rumen/a/1/telemetry", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn command_source_drains_in_order() {
        let (tx, mut source) = command_channel(4);
        for topic in ["rumen/control/pause", "rumen/control/resume"] {
            tx.send(InboundMessage {
                topic: topic.into(),
                payload: Bytes::from_static(b"{}"),
            })
            .await
            .unwrap();
        }
        assert_eq!(
            source.next_message().await.unwrap().topic,
            "rumen/control/pause"
        );
        assert_eq!(
            source.next_message().await.unwrap().topic,
            "rumen/control/resume"
        );
        drop(tx);
        assert!(source.next_message().await.is_none());
    }
}
