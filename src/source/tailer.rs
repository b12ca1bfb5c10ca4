//! Cursor-tracking log tailer
//!
//! Polls a [`LogSource`] forever. Each call to [`LogTailer::poll`] fetches one
//! page; if the previous fetch made no forward progress the tailer first
//! sleeps for the idle delay so an idle source is not hot-polled.

use std::time::Duration;

use crate::error::SourceError;
use crate::stats::TailerStats;

use super::cursor::{Cursor, CursorState};
use super::{LogSource, RawRecord, StreamHandle};

/// Default delay before re-fetching when the source has caught up
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_secs(5);

/// Default maximum records per page
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Tailer configuration
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// Wait applied when a fetch returned the same cursor it was given
    pub idle_delay: Duration,
    /// Maximum records requested per fetch
    pub page_limit: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            idle_delay: DEFAULT_IDLE_DELAY,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl TailerConfig {
    /// Set the idle delay
    pub fn idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Set the page limit (at least 1)
    pub fn page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit.max(1);
        self
    }
}

/// Tails one stream of a log source
pub struct LogTailer<S> {
    source: S,
    stream: StreamHandle,
    state: CursorState,
    config: TailerConfig,
    stats: TailerStats,
}

impl<S: LogSource> LogTailer<S> {
    /// Tail a stream that has already been located
    pub fn new(source: S, stream: StreamHandle, config: TailerConfig) -> Self {
        Self {
            source,
            stream,
            state: CursorState::new(),
            config,
            stats: TailerStats::default(),
        }
    }

    /// Locate the newest stream in `group` matching `prefix` and tail it
    pub async fn connect(
        source: S,
        group: &str,
        prefix: &str,
        config: TailerConfig,
    ) -> Result<Self, SourceError> {
        let stream = source.locate_stream(group, prefix).await?;
        tracing::info!(stream = %stream, "Tailing log stream");
        Ok(Self::new(source, stream, config))
    }

    /// Resume from a previously observed cursor
    pub fn resume_from(mut self, cursor: Cursor) -> Self {
        self.state = CursorState::starting_at(cursor);
        self
    }

    /// Fetch the next page of records
    ///
    /// Records come back in source order. A fetch error leaves the cursor
    /// untouched so nothing is skipped if the caller chooses to carry on.
    pub async fn poll(&mut self) -> Result<Vec<RawRecord>, SourceError> {
        if self.state.should_wait() {
            self.stats.idle_waits += 1;
            tracing::debug!(
                stream = %self.stream,
                cursor = %self.state.current(),
                delay_ms = self.config.idle_delay.as_millis() as u64,
                "No new records, waiting"
            );
            tokio::time::sleep(self.config.idle_delay).await;
        }

        let cursor = self.state.current().clone();
        let page = self
            .source
            .fetch_page(&self.stream, &cursor, self.config.page_limit)
            .await?;

        self.stats.fetches += 1;
        self.stats.records += page.records.len() as u64;

        let state = std::mem::take(&mut self.state);
        self.state = state.advance(page.next);

        Ok(page
            .records
            .into_iter()
            .map(|payload| RawRecord {
                payload,
                source_offset: cursor.clone(),
            })
            .collect())
    }

    /// Cursor the next fetch will use
    pub fn cursor(&self) -> &Cursor {
        self.state.current()
    }

    /// Stream being tailed
    pub fn stream(&self) -> &StreamHandle {
        &self.stream
    }

    pub fn stats(&self) -> &TailerStats {
        &self.stats
    }
}
