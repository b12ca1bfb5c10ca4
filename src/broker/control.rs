//! Broker control loop
//!
//! The loop is the only owner of the registry. Handles send it commands over a
//! single FIFO inbox, so register, deregister and broadcast are linearized
//! without any lock around the registry.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::stats::BrokerStats;

use super::config::BrokerConfig;
use super::error::BrokerError;
use super::notification::Notification;
use super::subscriber::{DeliveryOutcome, Subscriber, SubscriberId, Subscription};

/// Messages accepted by the control loop
#[derive(Debug)]
enum Command {
    Register {
        subscriber: Subscriber,
        ack: oneshot::Sender<()>,
    },
    Deregister {
        id: SubscriberId,
    },
    Publish {
        payload: Bytes,
    },
    Stats {
        reply: oneshot::Sender<BrokerStats>,
    },
}

/// Cloneable handle for talking to the broker
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    tx: mpsc::Sender<Command>,
    subscriber_buffer: usize,
}

impl BrokerHandle {
    /// Register a new subscriber
    ///
    /// Returns once the control loop has added it, so every publish issued
    /// after this call returns reaches the subscription. If the call is
    /// cancelled before the loop acknowledges, the loop never adds the
    /// subscriber; the guard created up front queues a deregister for any
    /// later cancellation point.
    pub async fn register(&self) -> Result<Subscription, BrokerError> {
        let (sender, receiver) = mpsc::channel(self.subscriber_buffer);
        let subscriber = Subscriber::new(sender);
        let subscription = Subscription::new(subscriber.id(), receiver, self.clone());

        let (ack, acked) = oneshot::channel();
        self.send(Command::Register { subscriber, ack }).await?;
        acked.await.map_err(|_| BrokerError::Closed)?;

        Ok(subscription)
    }

    /// Remove a subscriber; unknown IDs are ignored
    pub async fn deregister(&self, id: SubscriberId) -> Result<(), BrokerError> {
        self.send(Command::Deregister { id }).await
    }

    /// Broadcast a payload to every registered subscriber
    pub async fn publish(&self, payload: impl Into<Bytes>) -> Result<(), BrokerError> {
        self.send(Command::Publish {
            payload: payload.into(),
        })
        .await
    }

    /// Snapshot of the broker counters
    pub async fn stats(&self) -> Result<BrokerStats, BrokerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| BrokerError::Closed)
    }

    /// True once the control loop has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Deregister from a synchronous context (`Drop`)
    pub(super) fn deregister_detached(&self, id: SubscriberId) {
        match self.tx.try_send(Command::Deregister { id }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                // Inbox is busy; queue the command from a task instead of blocking
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        let tx = self.tx.clone();
                        runtime.spawn(async move {
                            let _ = tx.send(command).await;
                        });
                    }
                    Err(_) => {
                        tracing::warn!(subscriber_id = %id, "Deregister dropped: no runtime");
                    }
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    async fn send(&self, command: Command) -> Result<(), BrokerError> {
        self.tx.send(command).await.map_err(|_| BrokerError::Closed)
    }
}

/// Single-owner fan-out broker
pub struct FanoutBroker {
    inbox: mpsc::Receiver<Command>,
    registry: HashMap<SubscriberId, Subscriber>,
    stats: BrokerStats,
}

impl FanoutBroker {
    /// Create a broker and its handle; call [`run`](Self::run) to start it
    pub fn new(config: BrokerConfig) -> (Self, BrokerHandle) {
        let (tx, inbox) = mpsc::channel(config.inbox_capacity.max(1));

        let broker = Self {
            inbox,
            registry: HashMap::new(),
            stats: BrokerStats::default(),
        };
        let handle = BrokerHandle {
            tx,
            subscriber_buffer: config.subscriber_buffer.max(1),
        };

        (broker, handle)
    }

    /// Create a broker and run it on a background task
    pub fn spawn(config: BrokerConfig) -> (BrokerHandle, JoinHandle<()>) {
        let (broker, handle) = Self::new(config);
        let task = tokio::spawn(broker.run());
        (handle, task)
    }

    /// Process commands until every handle has been dropped
    pub async fn run(mut self) {
        tracing::debug!("Broker control loop started");

        while let Some(command) = self.inbox.recv().await {
            self.handle(command);
        }

        tracing::info!(
            subscribers = self.registry.len(),
            published = self.stats.published,
            "Broker control loop stopped"
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Register { subscriber, ack } => self.register(subscriber, ack),
            Command::Deregister { id } => self.deregister(id),
            Command::Publish { payload } => {
                self.stats.published += 1;
                tracing::debug!(
                    bytes = payload.len(),
                    subscribers = self.registry.len(),
                    "Broadcast"
                );
                self.broadcast(Notification::Data(payload));
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn register(&mut self, subscriber: Subscriber, ack: oneshot::Sender<()>) {
        let id = subscriber.id();

        if ack.send(()).is_err() {
            tracing::debug!(subscriber_id = %id, "Registrant gone before ack, skipping");
            return;
        }

        self.registry.insert(id, subscriber);
        self.stats.joined += 1;

        tracing::info!(
            subscriber_id = %id,
            subscribers = self.registry.len(),
            "Subscriber registered"
        );

        self.broadcast(Notification::Joined {
            subscribers: self.registry.len(),
        });
    }

    fn deregister(&mut self, id: SubscriberId) {
        if self.registry.remove(&id).is_none() {
            tracing::debug!(subscriber_id = %id, "Deregister of unknown subscriber ignored");
            return;
        }
        self.stats.left += 1;

        tracing::info!(
            subscriber_id = %id,
            subscribers = self.registry.len(),
            "Subscriber deregistered"
        );

        self.broadcast(Notification::Left {
            subscribers: self.registry.len(),
        });
    }

    /// Deliver to every subscriber without waiting on any of them
    ///
    /// Subscribers whose buffer is full or whose receiver is gone are evicted.
    fn broadcast(&mut self, notification: Notification) {
        let mut evicted = Vec::new();

        for (id, subscriber) in &self.registry {
            match subscriber.try_deliver(notification.clone()) {
                DeliveryOutcome::Delivered => self.stats.delivered += 1,
                DeliveryOutcome::Overrun => {
                    tracing::warn!(subscriber_id = %id, "Subscriber overrun, evicting");
                    evicted.push(*id);
                }
                DeliveryOutcome::Closed => {
                    tracing::debug!(subscriber_id = %id, "Subscriber receiver gone, evicting");
                    evicted.push(*id);
                }
            }
        }

        for id in evicted {
            self.registry.remove(&id);
            self.stats.evicted += 1;
        }
    }

    fn snapshot(&self) -> BrokerStats {
        BrokerStats {
            subscribers: self.registry.len(),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_test::{assert_pending, task};

    use super::*;

    fn spawn_default() -> BrokerHandle {
        let (handle, _task) = FanoutBroker::spawn(BrokerConfig::default());
        handle
    }

    /// Payloads currently queued for a subscription, control signals skipped
    fn drain_data(subscription: &mut Subscription) -> Vec<Bytes> {
        let mut data = Vec::new();
        while let Some(notification) = subscription.try_recv() {
            if let Notification::Data(payload) = notification {
                data.push(payload);
            }
        }
        data
    }

    /// Round trip through the inbox so every earlier command has been handled
    async fn settle(handle: &BrokerHandle) -> BrokerStats {
        handle.stats().await.unwrap()
    }

    #[tokio::test]
    async fn test_three_subscribers_receive_once() {
        let handle = spawn_default();
        let mut subs = vec![
            handle.register().await.unwrap(),
            handle.register().await.unwrap(),
            handle.register().await.unwrap(),
        ];

        handle.publish("A").await.unwrap();
        let stats = settle(&handle).await;
        assert_eq!(stats.subscribers, 3);
        assert_eq!(stats.published, 1);

        for sub in subs.iter_mut() {
            assert_eq!(drain_data(sub), vec![Bytes::from_static(b"A")]);
        }
    }

    #[tokio::test]
    async fn test_join_notifications() {
        let handle = spawn_default();
        let mut first = handle.register().await.unwrap();
        let mut second = handle.register().await.unwrap();
        settle(&handle).await;

        assert_eq!(first.try_recv(), Some(Notification::Joined { subscribers: 1 }));
        assert_eq!(first.try_recv(), Some(Notification::Joined { subscribers: 2 }));
        assert_eq!(first.try_recv(), None);

        // The new subscriber sees its own join
        assert_eq!(second.try_recv(), Some(Notification::Joined { subscribers: 2 }));
        assert_eq!(second.try_recv(), None);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_backfill() {
        let handle = spawn_default();
        let mut early = handle.register().await.unwrap();

        handle.publish("P1").await.unwrap();
        let mut late = handle.register().await.unwrap();
        handle.publish("P2").await.unwrap();
        settle(&handle).await;

        assert_eq!(
            drain_data(&mut early),
            vec![Bytes::from_static(b"P1"), Bytes::from_static(b"P2")]
        );
        assert_eq!(drain_data(&mut late), vec![Bytes::from_static(b"P2")]);
    }

    #[tokio::test]
    async fn test_registered_subscriber_sees_every_broadcast_in_order() {
        let handle = spawn_default();
        let mut sub = handle.register().await.unwrap();
        assert_eq!(sub.recv().await, Some(Notification::Joined { subscribers: 1 }));

        let publisher = handle.clone();
        tokio::spawn(async move {
            for i in 0..200u32 {
                publisher.publish(i.to_string()).await.unwrap();
            }
        });

        for i in 0..200u32 {
            let notification = sub.recv().await.unwrap();
            assert_eq!(notification, Notification::data(i.to_string()));
        }
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let handle = spawn_default();
        let a = handle.register().await.unwrap();
        let mut b = handle.register().await.unwrap();
        let a_id = a.id();
        settle(&handle).await;
        while b.try_recv().is_some() {}

        a.close().await;
        handle.deregister(a_id).await.unwrap();
        let stats = settle(&handle).await;

        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.left, 1);
        assert_eq!(b.try_recv(), Some(Notification::Left { subscribers: 1 }));
        assert_eq!(b.try_recv(), None);
    }

    #[tokio::test]
    async fn test_deregister_unknown_is_noop() {
        let handle = spawn_default();
        let mut sub = handle.register().await.unwrap();
        settle(&handle).await;
        while sub.try_recv().is_some() {}

        let (tx, _rx) = mpsc::channel(1);
        let stranger = Subscriber::new(tx).id();
        handle.deregister(stranger).await.unwrap();

        let stats = settle(&handle).await;
        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.left, 0);
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_deregister_during_broadcast() {
        let handle = spawn_default();
        let a = handle.register().await.unwrap();
        let mut b = handle.register().await.unwrap();
        let mut c = handle.register().await.unwrap();

        let publisher = handle.clone();
        let publish = tokio::spawn(async move { publisher.publish("X").await });
        let closer = tokio::spawn(a.close());

        publish.await.unwrap().unwrap();
        closer.await.unwrap();
        let stats = settle(&handle).await;

        assert_eq!(stats.subscribers, 2);
        assert_eq!(drain_data(&mut b), vec![Bytes::from_static(b"X")]);
        assert_eq!(drain_data(&mut c), vec![Bytes::from_static(b"X")]);
    }

    #[tokio::test]
    async fn test_slow_subscriber_evicted() {
        let (handle, _task) = FanoutBroker::spawn(BrokerConfig::default().subscriber_buffer(2));
        let mut slow = handle.register().await.unwrap();
        let mut fast = handle.register().await.unwrap();

        // slow now holds Joined{1} and Joined{2}: its buffer is full
        handle.publish("1").await.unwrap();
        let stats = settle(&handle).await;

        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.subscribers, 1);
        assert_eq!(drain_data(&mut fast), vec![Bytes::from_static(b"1")]);

        // Evicted subscriber drains what it had, then sees the end of the stream
        assert!(slow.recv().await.unwrap().is_control());
        assert!(slow.recv().await.unwrap().is_control());
        assert_eq!(slow.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_receiver_evicted_on_next_broadcast() {
        let handle = spawn_default();

        // A subscriber whose receiving half vanished without deregistering
        let (tx, rx) = mpsc::channel(4);
        let (ack, acked) = oneshot::channel();
        handle
            .send(Command::Register {
                subscriber: Subscriber::new(tx),
                ack,
            })
            .await
            .unwrap();
        acked.await.unwrap();
        drop(rx);

        handle.publish("ping").await.unwrap();
        let stats = settle(&handle).await;

        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.evicted, 1);
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let handle = spawn_default();
        let sub = handle.register().await.unwrap();
        drop(sub);

        let stats = settle(&handle).await;
        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.left, 1);
        assert_eq!(stats.evicted, 0);
    }

    #[tokio::test]
    async fn test_drop_deregisters_when_inbox_full() {
        let (mut broker, handle) = FanoutBroker::new(BrokerConfig::default().inbox_capacity(1));

        let (tx, rx) = mpsc::channel(4);
        let subscriber = Subscriber::new(tx);
        let id = subscriber.id();
        broker.registry.insert(id, subscriber);

        // Occupy the only inbox slot while the loop is not running
        let (reply, _pending_stats) = oneshot::channel();
        handle.tx.try_send(Command::Stats { reply }).unwrap();

        drop(Subscription::new(id, rx, handle.clone()));
        tokio::spawn(broker.run());

        let mut stats = settle(&handle).await;
        for _ in 0..10 {
            if stats.left == 1 {
                break;
            }
            tokio::task::yield_now().await;
            stats = settle(&handle).await;
        }

        assert_eq!(stats.left, 1);
        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.evicted, 0);
    }

    #[tokio::test]
    async fn test_cancelled_register_leaves_no_subscriber() {
        let (broker, handle) = FanoutBroker::new(BrokerConfig::default());

        // The register command is queued, then the caller gives up on the ack
        let mut cancelled = task::spawn(handle.register());
        assert_pending!(cancelled.poll());
        drop(cancelled);

        tokio::spawn(broker.run());
        let mut watcher = handle.register().await.unwrap();
        let stats = settle(&handle).await;

        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.joined, 1);
        assert_eq!(stats.left, 0);
        assert_eq!(watcher.try_recv(), Some(Notification::Joined { subscribers: 1 }));
        assert_eq!(watcher.try_recv(), None);
    }

    #[tokio::test]
    async fn test_broker_stops_when_handles_dropped() {
        let (handle, task) = FanoutBroker::spawn(BrokerConfig::default());
        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_after_stop_fail() {
        let (broker, handle) = FanoutBroker::new(BrokerConfig::default());
        drop(broker);

        assert!(handle.is_closed());
        assert_eq!(handle.publish("late").await, Err(BrokerError::Closed));
        assert!(matches!(handle.register().await, Err(BrokerError::Closed)));
        assert_eq!(handle.stats().await, Err(BrokerError::Closed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_and_publish() {
        let handle = spawn_default();
        let done = Arc::new(tokio::sync::Barrier::new(9));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            let done = Arc::clone(&done);
            tasks.push(tokio::spawn(async move {
                let sub = handle.register().await.unwrap();
                handle.publish("hello").await.unwrap();
                done.wait().await;
                sub.close().await;
            }));
        }
        done.wait().await;
        for task in tasks {
            task.await.unwrap();
        }

        let stats = settle(&handle).await;
        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.joined, 8);
        assert_eq!(stats.published, 8);
    }
}
