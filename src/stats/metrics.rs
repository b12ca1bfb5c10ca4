//! Counters for each relay stage

use serde::Serialize;

/// Log tailer counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailerStats {
    /// Pages fetched
    pub fetches: u64,
    /// Records returned across all pages
    pub records: u64,
    /// Idle waits taken because the cursor did not move
    pub idle_waits: u64,
}

/// Ingest pipeline counters (tailer → normalizer → publisher)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Records that decoded and were handed to the transport
    pub published: u64,
    /// Records dropped because they did not decode
    pub dropped: u64,
    /// Timestamp key of the last published event
    pub last_key: Option<String>,
}

/// Transport consumer counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages forwarded to the broker
    pub forwarded: u64,
    /// Messages skipped because they did not decode
    pub skipped: u64,
    /// Transport read errors
    pub errors: u64,
}

/// Fan-out broker counters, reported by the control loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Currently registered subscribers
    pub subscribers: usize,
    /// Publish commands processed
    pub published: u64,
    /// Notifications handed to subscriber buffers
    pub delivered: u64,
    /// Subscribers evicted for overrun or a closed receiver
    pub evicted: u64,
    /// Registrations processed
    pub joined: u64,
    /// Deregistrations that removed a subscriber
    pub left: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_stats_default() {
        let stats = IngestStats::default();
        assert_eq!(stats.published, 0);
        assert_eq!(stats.dropped, 0);
        assert!(stats.last_key.is_none());
    }

    #[test]
    fn test_broker_stats_serialize() {
        let stats = BrokerStats {
            subscribers: 3,
            published: 10,
            delivered: 30,
            evicted: 1,
            joined: 4,
            left: 0,
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["subscribers"], 3);
        assert_eq!(json["delivered"], 30);
        assert_eq!(json["evicted"], 1);
    }
}
