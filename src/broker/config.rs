//! Broker configuration

/// Default capacity of the control loop inbox
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Default per-subscriber buffer (notifications)
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Configuration for the fan-out broker
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Commands queued for the control loop before senders wait
    pub inbox_capacity: usize,

    /// Notifications a subscriber may have pending before it is evicted
    pub subscriber_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

impl BrokerConfig {
    /// Set the inbox capacity (at least 1)
    pub fn inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity.max(1);
        self
    }

    /// Set the per-subscriber buffer (at least 1)
    pub fn subscriber_buffer(mut self, capacity: usize) -> Self {
        self.subscriber_buffer = capacity.max(1);
        self
    }
}
