//! # rumensim-transport
//!
//! The engine's view of the message transport, reduced to two seams: a sink
//! that accepts `(topic, payload)` publishes and a source that delivers
//! inbound control messages. Broker connectivity, QoS, and reconnect policy
//! live behind these traits in the embedding process; the in-memory channel
//! implementation here backs tests and embedded use.

pub mod channel;
pub mod error;
pub mod sink;
pub mod source;
pub mod topic;

pub use channel::{command_channel, telemetry_channel, ChannelSink, PublishedMessage};
pub use error::TransportError;
pub use sink::{LogSink, TelemetrySink};
pub use source::{CommandSource, InboundMessage};
