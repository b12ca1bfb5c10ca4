//! Error types
//!
//! Each stage of the relay has its own error type so callers can tell a
//! pipeline-fatal condition (`SourceError`, `PublishError`) from one that is
//! only logged (`DecodeError`, `TransportError` on the consumer side).

use std::fmt;
use std::io;

use crate::broker::BrokerError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level relay error
#[derive(Debug)]
pub enum Error {
    /// I/O error (listener bind, socket)
    Io(io::Error),
    /// Log source failed; the ingest run halts
    Source(SourceError),
    /// Publishing to the durable transport failed; the ingest run halts
    Publish(PublishError),
    /// Transport-level failure
    Transport(TransportError),
    /// The broker control loop is gone
    Broker(BrokerError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Source(e) => write!(f, "source error: {}", e),
            Error::Publish(e) => write!(f, "publish error: {}", e),
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Broker(e) => write!(f, "broker error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Source(e) => Some(e),
            Error::Publish(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Broker(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<SourceError> for Error {
    fn from(e: SourceError) -> Self {
        Error::Source(e)
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Error::Publish(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        Error::Broker(e)
    }
}

/// Log source failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Transport or auth failure talking to the source
    Unavailable(String),
    /// No stream in the group matched the requested prefix
    StreamNotFound { group: String, prefix: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(reason) => write!(f, "source unavailable: {}", reason),
            SourceError::StreamNotFound { group, prefix } => {
                write!(f, "no stream in {} with prefix {:?}", group, prefix)
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// A raw record that does not have the expected shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decode error: {}", self.reason)
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::new(e.to_string())
    }
}

/// Durable transport failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Transport broker cannot be reached
    Unreachable(String),
    /// Transport rejected or lost the message
    Delivery(String),
    /// Transport client has been shut down
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Unreachable(reason) => write!(f, "transport unreachable: {}", reason),
            TransportError::Delivery(reason) => write!(f, "delivery failed: {}", reason),
            TransportError::Closed => write!(f, "transport closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Failure to hand an event to the durable transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Event could not be serialized
    Encode(String),
    /// Transport did not acknowledge the message
    Transport(TransportError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Encode(reason) => write!(f, "failed to encode event: {}", reason),
            PublishError::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<TransportError> for PublishError {
    fn from(e: TransportError) -> Self {
        PublishError::Transport(e)
    }
}
