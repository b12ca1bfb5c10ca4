//! Statistics for the relay stages

pub mod metrics;

pub use metrics::{BrokerStats, ConsumerStats, IngestStats, TailerStats};
