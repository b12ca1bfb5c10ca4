//! Durable transport hop
//!
//! Normalized events go through a partitioned, at-least-once pub/sub log
//! before they reach the broker. The relay depends only on the
//! [`TransportProducer`] / [`TransportConsumer`] contracts; [`memory`] provides
//! an in-process implementation.

pub mod consumer;
pub mod memory;
pub mod publisher;

use std::future::Future;

use bytes::Bytes;

use crate::error::TransportError;

pub use consumer::{ConsumerConfig, EventConsumer};
pub use memory::{MemoryConsumer, MemoryProducer, MemoryTransport};
pub use publisher::EventPublisher;

/// Default topic carrying normalized log events
pub const DEFAULT_TOPIC: &str = "logs";

/// Topic settings shared by the publisher and consumer
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Topic the ingest pipeline publishes to
    pub publish_topic: String,
    /// Topic the relay consumes from
    pub consume_topic: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            publish_topic: DEFAULT_TOPIC.to_string(),
            consume_topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

impl TransportConfig {
    /// Publish and consume the same topic
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        self.publish_topic = topic.clone();
        self.consume_topic = topic;
        self
    }

    /// Consume a different topic than the one published to
    pub fn consume_topic(mut self, topic: impl Into<String>) -> Self {
        self.consume_topic = topic.into();
        self
    }
}

/// Acknowledgement of a published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

/// A message read from a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: Bytes,
    pub value: Bytes,
}

/// Producing side of the durable transport
pub trait TransportProducer: Send + Sync + 'static {
    /// Append `value` to `topic`; messages with equal keys share a partition
    fn send(
        &self,
        topic: &str,
        key: Bytes,
        value: Bytes,
    ) -> impl Future<Output = Result<DeliveryReport, TransportError>> + Send;
}

/// Consuming side of the durable transport, bound to one topic
pub trait TransportConsumer: Send + 'static {
    /// Wait indefinitely for the next message
    fn recv(&mut self) -> impl Future<Output = Result<Delivery, TransportError>> + Send;
}
