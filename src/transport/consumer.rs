//! Transport consumer feeding the broker
//!
//! Reads the consume topic for the life of the relay. Messages that do not
//! decode as a [`LogEvent`](crate::source::LogEvent) are skipped; transport
//! errors are logged and reading resumes after a short delay.

use std::time::Duration;

use crate::broker::{BrokerError, BrokerHandle};
use crate::source::normalize;
use crate::stats::ConsumerStats;

use super::{Delivery, TransportConsumer};

/// Default delay after a transport read error
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Consumer configuration
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Wait after a failed read before trying again
    pub retry_delay: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl ConsumerConfig {
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Forwards delivered events to the fan-out broker
pub struct EventConsumer<C> {
    consumer: C,
    config: ConsumerConfig,
    stats: ConsumerStats,
}

impl<C: TransportConsumer> EventConsumer<C> {
    pub fn new(consumer: C, config: ConsumerConfig) -> Self {
        Self {
            consumer,
            config,
            stats: ConsumerStats::default(),
        }
    }

    /// Read and forward until the broker stops
    ///
    /// Transport errors never end the loop.
    pub async fn run(mut self, broker: BrokerHandle) -> ConsumerStats {
        tracing::info!("Transport consumer started");

        loop {
            if let Err(e) = self.step(&broker).await {
                tracing::info!(
                    error = %e,
                    forwarded = self.stats.forwarded,
                    "Transport consumer stopping"
                );
                return self.stats;
            }
        }
    }

    /// Handle one read: forward, skip, or back off after an error
    pub async fn step(&mut self, broker: &BrokerHandle) -> Result<(), BrokerError> {
        match self.consumer.recv().await {
            Ok(delivery) => self.forward(broker, delivery).await,
            Err(e) => {
                self.stats.errors += 1;
                tracing::warn!(
                    error = %e,
                    retry_ms = self.config.retry_delay.as_millis() as u64,
                    "Transport read failed"
                );
                tokio::time::sleep(self.config.retry_delay).await;
                Ok(())
            }
        }
    }

    async fn forward(
        &mut self,
        broker: &BrokerHandle,
        delivery: Delivery,
    ) -> Result<(), BrokerError> {
        if let Err(e) = normalize(&delivery.value) {
            self.stats.skipped += 1;
            tracing::debug!(
                topic = %delivery.topic,
                partition = delivery.partition,
                offset = delivery.offset,
                error = %e,
                "Skipping undecodable message"
            );
            return Ok(());
        }

        broker.publish(delivery.value).await?;
        self.stats.forwarded += 1;
        Ok(())
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }
}
