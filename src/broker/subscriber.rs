//! Subscriber halves
//!
//! A [`Subscriber`] is the sending half owned by the broker's registry. A
//! [`Subscription`] is the receiving half handed to the connection. Dropping a
//! `Subscription` deregisters it, so every exit path of a connection cleans up.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::control::BrokerHandle;
use super::notification::Notification;

/// Counter for generating unique subscriber IDs
static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Registry key for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a non-blocking delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DeliveryOutcome {
    Delivered,
    /// Buffer full
    Overrun,
    /// Receiver gone
    Closed,
}

/// Registry-side half of a subscriber
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<Notification>,
}

impl Subscriber {
    pub(super) fn new(sender: mpsc::Sender<Notification>) -> Self {
        Self {
            id: SubscriberId::next(),
            sender,
        }
    }

    #[inline]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Hand a notification to the subscriber without waiting
    #[inline]
    pub(super) fn try_deliver(&self, notification: Notification) -> DeliveryOutcome {
        match self.sender.try_send(notification) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => DeliveryOutcome::Overrun,
            Err(mpsc::error::TrySendError::Closed(_)) => DeliveryOutcome::Closed,
        }
    }
}

/// Connection-side half of a subscriber
///
/// `recv` returns `None` once the broker has evicted the subscriber (or shut
/// down) and every pending notification has been read.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Notification>,
    broker: Option<BrokerHandle>,
}

impl Subscription {
    pub(super) fn new(
        id: SubscriberId,
        receiver: mpsc::Receiver<Notification>,
        broker: BrokerHandle,
    ) -> Self {
        Self {
            id,
            receiver,
            broker: Some(broker),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next notification
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Take a pending notification without waiting
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }

    /// Deregister and wait until the command is queued
    pub async fn close(mut self) {
        if let Some(broker) = self.broker.take() {
            if let Err(e) = broker.deregister(self.id).await {
                tracing::debug!(subscriber_id = %self.id, error = %e, "Deregister after broker stop");
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("open", &self.broker.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broker) = self.broker.take() {
            broker.deregister_detached(self.id);
        }
    }
}
