//! Fan-out broker
//!
//! One control loop owns the subscriber registry. Everything else talks to it
//! through a [`BrokerHandle`], whose operations are messages on a single FIFO
//! inbox.
//!
//! # Architecture
//!
//! ```text
//!   EventConsumer     /msg handler      /event handlers
//!        │                 │                  │
//!        │ publish()       │ publish()        │ register() / Drop
//!        └────────────┬────┴──────────────────┘
//!                     ▼
//!            mpsc inbox (FIFO Command)
//!                     │
//!                     ▼
//!             ┌───────────────────┐
//!             │ FanoutBroker loop │
//!             │ registry: HashMap │
//!             │   <SubscriberId,  │
//!             │    Subscriber>    │
//!             └─────────┬─────────┘
//!                       │ try_send (never waits)
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!    [Subscription] [Subscription] [Subscription]
//!      SSE stream     SSE stream     SSE stream
//! ```
//!
//! # Delivery policy
//!
//! Each subscriber has a bounded buffer. A broadcast that finds a buffer full
//! evicts that subscriber: its sender is dropped, its stream ends after the
//! pending notifications, and its connection closes. Nobody else waits on it.
//! Payloads are `bytes::Bytes`, so a broadcast to N subscribers shares one
//! allocation.

pub mod config;
pub mod control;
pub mod error;
pub mod notification;
pub mod subscriber;

pub use config::BrokerConfig;
pub use control::{BrokerHandle, FanoutBroker};
pub use error::BrokerError;
pub use notification::Notification;
pub use subscriber::{Subscriber, SubscriberId, Subscription};
