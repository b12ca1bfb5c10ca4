//! Relay assembly
//!
//! Wires the four stages into one running process:
//!
//! ```text
//!  LogSource ─► IngestPipeline ─► TransportProducer
//!                                        │ (durable topic)
//!                                 TransportConsumer ─► EventConsumer ─► FanoutBroker ─► /event
//!                                                                            ▲
//!                                                                          /msg
//! ```
//!
//! The ingest pipeline and the HTTP server run until one of them fails or the
//! shutdown future resolves. The consumer and the broker are stopped when the
//! relay returns.

use std::future::{self, Future};

use tokio::net::TcpListener;

use crate::broker::{BrokerConfig, FanoutBroker};
use crate::error::Result;
use crate::pipeline::IngestPipeline;
use crate::server::{RelayServer, ServerConfig};
use crate::source::{Cursor, LogSource, LogTailer, TailerConfig};
use crate::transport::{
    ConsumerConfig, EventConsumer, EventPublisher, TransportConfig, TransportConsumer,
    TransportProducer,
};

/// Default log group
pub const DEFAULT_LOG_GROUP: &str = "/web/prod";

/// Default stream name prefix
pub const DEFAULT_STREAM_PREFIX: &str = "main_main";

/// Everything needed to start a relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Log group to tail
    pub log_group: String,
    /// First stream in the group whose name starts with this is tailed
    pub stream_prefix: String,
    /// Resume position; `None` starts from the beginning of the stream
    pub start_cursor: Option<Cursor>,
    pub tailer: TailerConfig,
    pub transport: TransportConfig,
    pub consumer: ConsumerConfig,
    pub broker: BrokerConfig,
    pub server: ServerConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_group: DEFAULT_LOG_GROUP.to_string(),
            stream_prefix: DEFAULT_STREAM_PREFIX.to_string(),
            start_cursor: None,
            tailer: TailerConfig::default(),
            transport: TransportConfig::default(),
            consumer: ConsumerConfig::default(),
            broker: BrokerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Set the log group and stream prefix to tail
    pub fn stream(mut self, group: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.log_group = group.into();
        self.stream_prefix = prefix.into();
        self
    }

    /// Resume tailing from a saved cursor
    pub fn start_cursor(mut self, cursor: Cursor) -> Self {
        self.start_cursor = Some(cursor);
        self
    }

    pub fn tailer(mut self, config: TailerConfig) -> Self {
        self.tailer = config;
        self
    }

    pub fn transport(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    pub fn consumer(mut self, config: ConsumerConfig) -> Self {
        self.consumer = config;
        self
    }

    pub fn broker(mut self, config: BrokerConfig) -> Self {
        self.broker = config;
        self
    }

    pub fn server(mut self, config: ServerConfig) -> Self {
        self.server = config;
        self
    }
}

/// A configured relay, ready to run against concrete source and transport
pub struct Relay {
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Bind the configured address and run until a stage fails
    ///
    /// `consumer_for` is called once with the configured consume topic.
    pub async fn run<S, P, K, C>(self, source: S, producer: P, consumer_for: K) -> Result<()>
    where
        S: LogSource,
        P: TransportProducer,
        K: FnOnce(&str) -> C,
        C: TransportConsumer,
    {
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        self.run_until(listener, source, producer, consumer_for, future::pending())
            .await
    }

    /// Run on `listener` until a stage fails or `shutdown` completes
    ///
    /// Returns the first fatal error from the ingest pipeline or the server,
    /// or `Ok(())` on shutdown. Locating the source stream happens first; if
    /// that fails nothing else is started. The broker is fed by the consumer
    /// `consumer_for` returns for `TransportConfig::consume_topic`.
    pub async fn run_until<S, P, K, C, F>(
        self,
        listener: TcpListener,
        source: S,
        producer: P,
        consumer_for: K,
        shutdown: F,
    ) -> Result<()>
    where
        S: LogSource,
        P: TransportProducer,
        K: FnOnce(&str) -> C,
        C: TransportConsumer,
        F: Future<Output = ()>,
    {
        let RelayConfig {
            log_group,
            stream_prefix,
            start_cursor,
            tailer,
            transport,
            consumer: consumer_config,
            broker,
            server,
        } = self.config;

        let mut tailer = LogTailer::connect(source, &log_group, &stream_prefix, tailer).await?;
        if let Some(cursor) = start_cursor {
            tailer = tailer.resume_from(cursor);
        }
        let pipeline = IngestPipeline::new(
            tailer,
            EventPublisher::new(producer, transport.publish_topic.clone()),
        );

        let (broker, broker_task) = FanoutBroker::spawn(broker);
        let consumer = consumer_for(&transport.consume_topic);
        let consumer_task =
            tokio::spawn(EventConsumer::new(consumer, consumer_config).run(broker.clone()));
        let server = RelayServer::new(server, broker);

        tracing::info!(
            group = %log_group,
            prefix = %stream_prefix,
            publish_topic = %transport.publish_topic,
            consume_topic = %transport.consume_topic,
            "Relay started"
        );

        let result = tokio::select! {
            result = pipeline.run() => result,
            result = server.serve(listener) => result,
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
        };

        consumer_task.abort();
        broker_task.abort();

        if let Err(e) = &result {
            tracing::error!(error = %e, "Relay stopped");
        }
        result
    }
}
