//! Ingest pipeline
//!
//! Drives tailer → normalizer → publisher. Records that fail to decode are
//! dropped; a source or publish failure ends the run, since carrying on would
//! lose events before they reach the durable transport.

use crate::error::Result;
use crate::source::{normalize, LogSource, LogTailer};
use crate::stats::IngestStats;
use crate::transport::{EventPublisher, TransportProducer};

/// Tails a log source into the durable transport
pub struct IngestPipeline<S, P> {
    tailer: LogTailer<S>,
    publisher: EventPublisher<P>,
    stats: IngestStats,
}

impl<S: LogSource, P: TransportProducer> IngestPipeline<S, P> {
    pub fn new(tailer: LogTailer<S>, publisher: EventPublisher<P>) -> Self {
        Self {
            tailer,
            publisher,
            stats: IngestStats::default(),
        }
    }

    /// Run until the source or the transport fails
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            stream = %self.tailer.stream(),
            topic = self.publisher.topic(),
            "Ingest pipeline started"
        );

        loop {
            if let Err(e) = self.step().await {
                tracing::error!(
                    error = %e,
                    cursor = %self.tailer.cursor(),
                    published = self.stats.published,
                    dropped = self.stats.dropped,
                    "Ingest pipeline halted"
                );
                return Err(e);
            }
        }
    }

    /// Process one page; returns the number of events published
    pub async fn step(&mut self) -> Result<usize> {
        let records = self.tailer.poll().await?;
        let mut published = 0;

        for record in records {
            let event = match normalize(&record.payload) {
                Ok(event) => event,
                Err(e) => {
                    self.stats.dropped += 1;
                    tracing::trace!(offset = %record.source_offset, error = %e, "Dropping record");
                    continue;
                }
            };

            let key = event.timestamp().to_string();
            self.publisher.publish(event).await?;
            self.stats.last_key = Some(key);
            self.stats.published += 1;
            published += 1;
        }

        Ok(published)
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn tailer(&self) -> &LogTailer<S> {
        &self.tailer
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::error::{Error, PublishError, SourceError, TransportError};
    use crate::source::test_support::{access_line, page, ScriptedSource};
    use crate::source::{Page, StreamHandle, TailerConfig};
    use crate::transport::{DeliveryReport, MemoryTransport, TransportConsumer};

    struct RejectingProducer;

    impl TransportProducer for RejectingProducer {
        async fn send(
            &self,
            _topic: &str,
            _key: Bytes,
            _value: Bytes,
        ) -> std::result::Result<DeliveryReport, TransportError> {
            Err(TransportError::Delivery("message too large".into()))
        }
    }

    fn tailer(
        pages: Vec<std::result::Result<Page, SourceError>>,
    ) -> LogTailer<Arc<ScriptedSource>> {
        LogTailer::new(
            Arc::new(ScriptedSource::new(pages)),
            StreamHandle::new("/web/prod", "main_main_0001"),
            TailerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_malformed_records_dropped() {
        let a = access_line("2024-03-01T10:00:00Z", 404);
        let b = access_line("2024-03-01T10:00:01Z", 404);
        let transport = MemoryTransport::default();
        let mut pipeline = IngestPipeline::new(
            tailer(vec![page(&[a.as_str(), "panic: nil map", "{\"time\":", b.as_str()], Some("t1"))]),
            EventPublisher::new(transport.producer(), "logs"),
        );

        assert_eq!(pipeline.step().await.unwrap(), 2);
        assert_eq!(pipeline.stats().published, 2);
        assert_eq!(pipeline.stats().dropped, 2);
        assert_eq!(pipeline.stats().last_key.as_deref(), Some("2024-03-01T10:00:01Z"));
        assert_eq!(transport.len("logs").await, 2);
    }

    #[tokio::test]
    async fn test_events_reach_transport_in_source_order() {
        let lines: Vec<String> = (0..5)
            .map(|i| access_line("2024-03-01T10:00:00Z", 400 + i))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let transport = MemoryTransport::default();
        let mut pipeline = IngestPipeline::new(
            tailer(vec![page(&refs, Some("t1"))]),
            EventPublisher::new(transport.producer(), "logs"),
        );
        pipeline.step().await.unwrap();

        // One key, so one partition, so source order
        let mut consumer = transport.consumer("logs");
        for i in 0..5 {
            let delivery = consumer.recv().await.unwrap();
            assert_eq!(normalize(&delivery.value).unwrap().status_code(), 400 + i);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_halts_run() {
        let a = access_line("2024-03-01T10:00:00Z", 404);
        let transport = MemoryTransport::default();
        let pipeline = IngestPipeline::new(
            tailer(vec![
                page(&[a.as_str()], Some("t1")),
                Err(SourceError::Unavailable("throttled".into())),
            ]),
            EventPublisher::new(transport.producer(), "logs"),
        );

        let result = pipeline.run().await;
        assert!(matches!(result, Err(Error::Source(SourceError::Unavailable(_)))));
        assert_eq!(transport.len("logs").await, 1);
    }

    #[tokio::test]
    async fn test_publish_failure_halts_run() {
        let a = access_line("2024-03-01T10:00:00Z", 404);
        let pipeline = IngestPipeline::new(
            tailer(vec![page(&[a.as_str()], Some("t1"))]),
            EventPublisher::new(RejectingProducer, "logs"),
        );

        let result = pipeline.run().await;
        assert!(matches!(
            result,
            Err(Error::Publish(PublishError::Transport(TransportError::Delivery(_))))
        ));
    }
}
