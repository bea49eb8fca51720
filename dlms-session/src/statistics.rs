//! Exchange statistics collection

use serde::Serialize;
use std::fmt;

/// Counters kept by the exchange engine for one connection
///
/// Logged when the connection is closed and returned with every profile
/// readout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExchangeStatistics {
    /// Total number of frames sent, resends included
    pub frames_sent: u64,
    /// Total number of fragments received
    pub frames_received: u64,
    /// Number of receives that hit the deadline
    pub timeouts: u64,
    /// Number of frames sent again after a timeout or malformed reply
    pub resends: u64,
    /// Number of replies the codec could not parse
    pub malformed_replies: u64,
    /// Number of diverted push notifications
    pub notifications: u64,
    /// Number of back-offs after a busy answer
    pub busy_retries: u64,
}

impl ExchangeStatistics {
    /// Create new statistics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn increment_frames_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub fn increment_frames_received(&mut self) {
        self.frames_received += 1;
    }

    pub fn increment_timeouts(&mut self) {
        self.timeouts += 1;
    }

    pub fn increment_resends(&mut self) {
        self.resends += 1;
    }

    pub fn increment_malformed_replies(&mut self) {
        self.malformed_replies += 1;
    }

    pub fn increment_notifications(&mut self) {
        self.notifications += 1;
    }

    pub fn increment_busy_retries(&mut self) {
        self.busy_retries += 1;
    }

    /// Get error rate as a percentage
    ///
    /// Share of receive attempts that timed out or were malformed. Returns
    /// 0.0 if nothing has been received.
    pub fn error_rate(&self) -> f64 {
        let failures = self.timeouts + self.malformed_replies;
        let attempts = self.frames_received + self.timeouts;
        if attempts == 0 {
            0.0
        } else {
            (failures as f64 / attempts as f64) * 100.0
        }
    }
}

impl fmt::Display for ExchangeStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent {}, received {}, timeouts {}, resends {}, malformed {}, notifications {}, busy {}",
            self.frames_sent,
            self.frames_received,
            self.timeouts,
            self.resends,
            self.malformed_replies,
            self.notifications,
            self.busy_retries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rate() {
        let mut stats = ExchangeStatistics::new();
        assert_eq!(stats.error_rate(), 0.0);
        stats.increment_frames_received();
        stats.increment_frames_received();
        stats.increment_frames_received();
        stats.increment_timeouts();
        assert_eq!(stats.error_rate(), 25.0);
        stats.clear();
        assert_eq!(stats, ExchangeStatistics::default());
    }
}
