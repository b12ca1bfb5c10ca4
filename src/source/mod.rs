//! Log source tailing
//!
//! The source side of the relay reads an append-only, paginated log and turns
//! each raw line into a typed [`LogEvent`].
//!
//! ```text
//!   LogSource.fetch_page(cursor)
//!         │
//!         ▼
//!   LogTailer ── CursorState { last, current } ── idle wait on no progress
//!         │
//!         ▼  RawRecord (payload + cursor at fetch)
//!   normalize() ──✗ DecodeError → dropped
//!         │
//!         ▼
//!     LogEvent
//! ```
//!
//! The concrete log API is an external collaborator; the relay only needs the
//! [`LogSource`] contract.

pub mod cursor;
pub mod normalizer;
pub mod tailer;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::SourceError;

pub use cursor::{Cursor, CursorState};
pub use normalizer::{normalize, LogEvent};
pub use tailer::{LogTailer, TailerConfig};

/// A located stream inside a log group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    /// Log group (e.g., "/web/prod")
    pub group: String,
    /// Stream name inside the group
    pub name: String,
}

impl StreamHandle {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// One page of records as returned by the source
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Record payloads in source order
    pub records: Vec<Bytes>,
    /// Forward token for the next fetch
    pub next: Cursor,
}

impl Page {
    pub fn new(records: Vec<Bytes>, next: Cursor) -> Self {
        Self { records, next }
    }
}

/// A record fetched from the source, before normalization
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub payload: Bytes,
    /// Cursor that was used for the fetch that produced this record
    pub source_offset: Cursor,
}

/// Contract the tailer needs from a paginated log API
///
/// Implementations are expected to apply their own retry policy; any error
/// returned here is treated as the source being unavailable.
pub trait LogSource: Send + Sync + 'static {
    /// Find the most recent stream in `group` whose name starts with `prefix`
    fn locate_stream(
        &self,
        group: &str,
        prefix: &str,
    ) -> impl Future<Output = Result<StreamHandle, SourceError>> + Send;

    /// Fetch up to `limit` records following `cursor`
    fn fetch_page(
        &self,
        stream: &StreamHandle,
        cursor: &Cursor,
        limit: usize,
    ) -> impl Future<Output = Result<Page, SourceError>> + Send;
}

impl<S: LogSource> LogSource for Arc<S> {
    fn locate_stream(
        &self,
        group: &str,
        prefix: &str,
    ) -> impl Future<Output = Result<StreamHandle, SourceError>> + Send {
        (**self).locate_stream(group, prefix)
    }

    fn fetch_page(
        &self,
        stream: &StreamHandle,
        cursor: &Cursor,
        limit: usize,
    ) -> impl Future<Output = Result<Page, SourceError>> + Send {
        (**self).fetch_page(stream, cursor, limit)
    }
}
