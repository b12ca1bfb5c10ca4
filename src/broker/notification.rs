//! Notifications delivered to subscribers
//!
//! Control signals (join/leave) and data share one ordered stream per
//! subscriber, but are distinct variants so a consumer never has to sniff
//! payload bytes to tell them apart.

use bytes::Bytes;

/// One item in a subscriber's inbound stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A subscriber registered; carries the registry size afterwards
    Joined { subscribers: usize },
    /// A subscriber deregistered; carries the registry size afterwards
    Left { subscribers: usize },
    /// A relayed payload
    Data(Bytes),
}

impl Notification {
    /// Data notification from anything convertible to `Bytes`
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Notification::Data(payload.into())
    }

    /// True for join/leave signals
    pub fn is_control(&self) -> bool {
        !matches!(self, Notification::Data(_))
    }

    /// Payload of a data notification
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Notification::Data(payload) => Some(payload),
            _ => None,
        }
    }
}
