//! Broker error types

/// Error type for broker operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The control loop has stopped and no longer accepts commands
    Closed,
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerError::Closed => write!(f, "Broker control loop is not running"),
        }
    }
}

impl std::error::Error for BrokerError {}
