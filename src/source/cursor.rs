//! Pagination cursor and no-progress detection
//!
//! The log source hands back a forward token with every page. When the token
//! comes back unchanged the source has caught up to live; that is never EOF,
//! only a signal to back off before the next fetch.

use std::fmt;

/// Opaque pagination token (absent before the first fetch)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cursor(Option<String>);

impl Cursor {
    /// Cursor with no token (start of stream)
    pub fn empty() -> Self {
        Self(None)
    }

    /// Cursor holding a source token
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// The token to pass to the next fetch, if any
    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(token) => write!(f, "{}", token),
            None => write!(f, "<start>"),
        }
    }
}

impl From<Option<String>> for Cursor {
    fn from(token: Option<String>) -> Self {
        Self(token)
    }
}

/// Two-cursor tailing state
///
/// `last` is the cursor that was current before the most recent fetch, or
/// `None` if nothing has been fetched yet. The state carries no I/O; the
/// tailer asks it whether to wait, fetches, then calls [`advance`].
///
/// [`advance`]: CursorState::advance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorState {
    last: Option<Cursor>,
    current: Cursor,
}

impl CursorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume tailing from a known cursor
    pub fn starting_at(cursor: Cursor) -> Self {
        Self {
            last: None,
            current: cursor,
        }
    }

    /// Cursor to use for the next fetch
    pub fn current(&self) -> &Cursor {
        &self.current
    }

    /// Cursor that was current before the latest fetch
    pub fn last(&self) -> Option<&Cursor> {
        self.last.as_ref()
    }

    /// True when the latest fetch made no forward progress
    pub fn should_wait(&self) -> bool {
        self.last.as_ref() == Some(&self.current)
    }

    /// Record the token returned by a fetch
    pub fn advance(self, next: Cursor) -> Self {
        Self {
            last: Some(self.current),
            current: next,
        }
    }
}
