//! In-memory event log for the collector

use tokio::sync::RwLock;

use crate::event::SilencePing;

/// Received pings plus a frozen snapshot that only changes on request
#[derive(Debug, Default)]
pub struct EventLog {
    live: RwLock<Vec<SilencePing>>,
    frozen: RwLock<Vec<SilencePing>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a ping to the live log
    pub async fn record(&self, ping: SilencePing) {
        self.live.write().await.push(ping);
    }

    /// Live log, newest first
    pub async fn newest_first(&self) -> Vec<SilencePing> {
        self.live.read().await.iter().rev().cloned().collect()
    }

    /// Replace the frozen snapshot with a copy of the live log
    ///
    /// Returns the number of pings in the new snapshot.
    pub async fn freeze(&self) -> usize {
        let snapshot = self.live.read().await.clone();
        let count = snapshot.len();
        *self.frozen.write().await = snapshot;
        count
    }

    /// Frozen snapshot, newest first
    pub async fn frozen_newest_first(&self) -> Vec<SilencePing> {
        self.frozen.read().await.iter().rev().cloned().collect()
    }

    /// Number of pings in the live log
    pub async fn len(&self) -> usize {
        self.live.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.live.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PingStatus;

    fn start_ping(at: &str) -> SilencePing {
        SilencePing {
            status: PingStatus::SilenceStart,
            start_time: at.to_string(),
            end_time: None,
            duration: None,
        }
    }

    #[tokio::test]
    async fn test_newest_first() {
        let log = EventLog::new();
        log.record(start_ping("2024-01-01 10:00:00")).await;
        log.record(start_ping("2024-01-01 10:05:00")).await;

        let pings = log.newest_first().await;
        assert_eq!(pings[0].start_time, "2024-01-01 10:05:00");
        assert_eq!(pings[1].start_time, "2024-01-01 10:00:00");
    }

    #[tokio::test]
    async fn test_frozen_snapshot_ignores_later_pings() {
        let log = EventLog::new();
        assert!(log.is_empty().await);
        log.record(start_ping("2024-01-01 10:00:00")).await;

        assert_eq!(log.freeze().await, 1);
        log.record(start_ping("2024-01-01 10:05:00")).await;

        assert_eq!(log.len().await, 2);
        assert_eq!(log.frozen_newest_first().await.len(), 1);

        // Refreezing picks up everything received so far
        assert_eq!(log.freeze().await, 2);
    }
}
