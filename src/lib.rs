//! # relay-rs
//!
//! Real-time log relay. Tails a paginated log source, pushes normalized
//! access-log events through a durable partitioned transport, and fans them
//! out to browsers over Server-Sent Events.
//!
//! ```text
//!  ┌───────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ LogSource │──►│ LogTailer +  │──►│ transport │──►│ EventConsumer│──►│ FanoutBroker │──► SSE clients
//!  │ (paged)   │   │ normalizer   │   │ (topic)   │   │              │   │              │
//!  └───────────┘   └──────────────┘   └───────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use relay_rs::transport::MemoryTransport;
//! use relay_rs::{Relay, RelayConfig};
//! # use relay_rs::source::{Cursor, LogSource, Page, StreamHandle};
//! # use relay_rs::error::SourceError;
//! # struct MySource;
//! # impl LogSource for MySource {
//! #     async fn locate_stream(&self, g: &str, p: &str) -> Result<StreamHandle, SourceError> {
//! #         Ok(StreamHandle::new(g, p))
//! #     }
//! #     async fn fetch_page(&self, _: &StreamHandle, c: &Cursor, _: usize) -> Result<Page, SourceError> {
//! #         Ok(Page::new(Vec::new(), c.clone()))
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> relay_rs::Result<()> {
//!     let transport = MemoryTransport::default();
//!     let relay = Relay::new(RelayConfig::default());
//!
//!     relay
//!         .run(MySource, transport.producer(), |topic: &str| transport.consumer(topic))
//!         .await
//! }
//! ```

pub mod broker;
pub mod error;
pub mod pipeline;
pub mod relay;
pub mod server;
pub mod source;
pub mod stats;
pub mod transport;

pub use broker::{BrokerConfig, BrokerHandle, FanoutBroker, Notification, Subscription};
pub use error::{Error, Result};
pub use pipeline::IngestPipeline;
pub use relay::{Relay, RelayConfig};
pub use server::{RelayServer, ServerConfig};
pub use source::{normalize, LogEvent, LogSource, LogTailer};
