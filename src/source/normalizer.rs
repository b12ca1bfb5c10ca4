//! Raw record decoding
//!
//! Source streams mix request logs with other lines (startup banners, stack
//! traces, other JSON shapes). Only records carrying the request fields decode
//! into a [`LogEvent`]; everything else is a [`DecodeError`] that callers drop.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// A normalized HTTP request log entry
///
/// Field names on the wire follow the source's JSON layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "time")]
    timestamp: String,
    #[serde(rename = "remoteIP")]
    origin_ip: String,
    host: String,
    #[serde(rename = "requestPath")]
    path: String,
    #[serde(default)]
    query: String,
    method: String,
    #[serde(rename = "status")]
    status_code: u16,
    #[serde(rename = "userAgent", default)]
    user_agent: String,
    #[serde(default)]
    referer: String,
    #[serde(default)]
    application: String,
    #[serde(rename = "logtype", default)]
    log_type: String,
}

impl LogEvent {
    /// Decode an event from its JSON encoding
    pub fn from_slice(raw: &[u8]) -> Result<Self, DecodeError> {
        let event: LogEvent = serde_json::from_slice(raw)?;
        if event.timestamp.is_empty() {
            return Err(DecodeError::new("empty time field"));
        }
        Ok(event)
    }

    /// Encode as JSON for the durable transport
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Partition key: co-temporal events share a key
    pub fn partition_key(&self) -> &[u8] {
        self.timestamp.as_bytes()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn origin_ip(&self) -> &str {
        &self.origin_ip
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn referer(&self) -> &str {
        &self.referer
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn log_type(&self) -> &str {
        &self.log_type
    }
}

/// Decode one raw record
pub fn normalize(raw: &[u8]) -> Result<LogEvent, DecodeError> {
    LogEvent::from_slice(raw)
}
