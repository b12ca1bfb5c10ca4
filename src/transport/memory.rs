//! In-process durable transport
//!
//! Topics are split into a fixed number of partitions. A message's partition
//! is chosen by hashing its key, so equal keys keep their relative order.
//! Each partition keeps at most `retention` messages; older ones are dropped
//! and their offsets are never reused. Every consumer reads a topic from the
//! oldest retained message with its own offsets, and skips ahead when its
//! next offset has already been dropped.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, Notify};

use crate::error::TransportError;

use super::{Delivery, DeliveryReport, TransportConsumer, TransportProducer};

/// Default partitions per topic
pub const DEFAULT_PARTITIONS: u32 = 3;

/// Default messages retained per partition
pub const DEFAULT_RETENTION: usize = 10_000;

#[derive(Debug, Clone)]
struct Message {
    key: Bytes,
    value: Bytes,
}

/// Bounded partition log; `base` is the offset of the oldest retained message
#[derive(Debug, Default)]
struct Partition {
    base: u64,
    messages: VecDeque<Message>,
}

impl Partition {
    /// Append and return the new message's offset
    fn append(&mut self, message: Message, retention: usize) -> u64 {
        if self.messages.len() >= retention {
            self.messages.pop_front();
            self.base += 1;
        }
        self.messages.push_back(message);
        self.base + self.messages.len() as u64 - 1
    }

    /// Message at `offset`, or the oldest retained one if `offset` was dropped
    fn read_from(&self, offset: u64) -> Option<(u64, &Message)> {
        let offset = offset.max(self.base);
        let index = (offset - self.base) as usize;
        self.messages.get(index).map(|message| (offset, message))
    }
}

#[derive(Debug)]
struct Topic {
    partitions: Vec<Partition>,
}

impl Topic {
    fn new(partitions: u32) -> Self {
        Self {
            partitions: (0..partitions).map(|_| Partition::default()).collect(),
        }
    }
}

#[derive(Debug)]
struct Shared {
    partitions: u32,
    retention: usize,
    topics: Mutex<HashMap<String, Topic>>,
    appended: Notify,
}

/// Partitioned in-memory topic log
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Transport with `partitions` partitions per topic (at least 1)
    pub fn new(partitions: u32) -> Self {
        Self::with_retention(partitions, DEFAULT_RETENTION)
    }

    /// Transport keeping at most `retention` messages per partition (at least 1)
    pub fn with_retention(partitions: u32, retention: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                partitions: partitions.max(1),
                retention: retention.max(1),
                topics: Mutex::new(HashMap::new()),
                appended: Notify::new(),
            }),
        }
    }

    /// Producing handle
    pub fn producer(&self) -> MemoryProducer {
        MemoryProducer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Consumer reading `topic` from the first message
    pub fn consumer(&self, topic: impl Into<String>) -> MemoryConsumer {
        MemoryConsumer {
            shared: Arc::clone(&self.shared),
            topic: topic.into(),
            offsets: vec![0; self.shared.partitions as usize],
            next_partition: 0,
        }
    }

    /// Number of messages currently retained in `topic`
    pub async fn len(&self, topic: &str) -> usize {
        let topics = self.shared.topics.lock().await;
        topics
            .get(topic)
            .map(|t| t.partitions.iter().map(|p| p.messages.len()).sum())
            .unwrap_or(0)
    }

    fn partition_for(key: &[u8], partitions: u32) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % partitions as u64) as u32
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITIONS)
    }
}

/// Producer half of [`MemoryTransport`]
#[derive(Debug, Clone)]
pub struct MemoryProducer {
    shared: Arc<Shared>,
}

impl TransportProducer for MemoryProducer {
    async fn send(
        &self,
        topic: &str,
        key: Bytes,
        value: Bytes,
    ) -> Result<DeliveryReport, TransportError> {
        let partitions = self.shared.partitions;
        let partition = MemoryTransport::partition_for(&key, partitions);

        let offset = {
            let mut topics = self.shared.topics.lock().await;
            topics
                .entry(topic.to_string())
                .or_insert_with(|| Topic::new(partitions))
                .partitions[partition as usize]
                .append(Message { key, value }, self.shared.retention)
        };

        self.shared.appended.notify_waiters();

        Ok(DeliveryReport {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }
}

/// Consumer half of [`MemoryTransport`]
///
/// Partitions are read round-robin; order within a partition is preserved.
#[derive(Debug)]
pub struct MemoryConsumer {
    shared: Arc<Shared>,
    topic: String,
    offsets: Vec<u64>,
    next_partition: usize,
}

impl MemoryConsumer {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    async fn try_next(&mut self) -> Option<Delivery> {
        let topics = self.shared.topics.lock().await;
        let topic = topics.get(&self.topic)?;

        let count = self.offsets.len();
        for step in 0..count {
            let partition = (self.next_partition + step) % count;
            let wanted = self.offsets[partition];

            if let Some((offset, message)) = topic.partitions[partition].read_from(wanted) {
                if offset > wanted {
                    tracing::debug!(
                        topic = %self.topic,
                        partition,
                        skipped = offset - wanted,
                        "Consumer fell behind retention"
                    );
                }
                self.offsets[partition] = offset + 1;
                self.next_partition = (partition + 1) % count;

                return Some(Delivery {
                    topic: self.topic.clone(),
                    partition: partition as u32,
                    offset,
                    key: message.key.clone(),
                    value: message.value.clone(),
                });
            }
        }

        None
    }
}

impl TransportConsumer for MemoryConsumer {
    async fn recv(&mut self) -> Result<Delivery, TransportError> {
        let shared = Arc::clone(&self.shared);
        loop {
            // Registered before the check so an append in between is not missed
            let appended = shared.appended.notified();

            if let Some(delivery) = self.try_next().await {
                return Ok(delivery);
            }

            appended.await;
        }
    }
}
