//! Event publisher
//!
//! Serializes a [`LogEvent`] and appends it to the publish topic, keyed by the
//! event timestamp for partition affinity.

use bytes::Bytes;

use crate::error::PublishError;
use crate::source::LogEvent;

use super::{DeliveryReport, TransportProducer};

/// Publishes normalized events to the durable transport
pub struct EventPublisher<P> {
    producer: P,
    topic: String,
}

impl<P: TransportProducer> EventPublisher<P> {
    pub fn new(producer: P, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish one event and wait for the transport's acknowledgement
    ///
    /// The event is consumed whether or not delivery succeeds.
    pub async fn publish(&self, event: LogEvent) -> Result<DeliveryReport, PublishError> {
        let value = event
            .to_json()
            .map_err(|e| PublishError::Encode(e.to_string()))?;
        let key = Bytes::copy_from_slice(event.partition_key());

        let report = self
            .producer
            .send(&self.topic, key, Bytes::from(value))
            .await?;

        tracing::debug!(
            topic = %report.topic,
            partition = report.partition,
            offset = report.offset,
            key = event.timestamp(),
            "Event published"
        );

        Ok(report)
    }
}
