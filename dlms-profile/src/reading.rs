//! Converted profile readings

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the timestamp of a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimestampSource {
    /// The Clock column of the row
    Clock,
    /// The primary timestamp column
    Primary,
    /// The secondary timestamp column
    Secondary,
    /// Next quarter-hour slot after the previous reading
    Inferred,
}

/// One timestamped row of numeric values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Meter-local time
    pub timestamp: NaiveDateTime,
    /// Values of the requested fields, in request order
    pub values: Vec<f64>,
    pub source: TimestampSource,
    /// The row carried a non-zero device status
    pub device_flagged: bool,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        for value in &self.values {
            write!(f, " {}", value)?;
        }
        if self.device_flagged {
            write!(f, " (flagged)")?;
        }
        Ok(())
    }
}

/// A row left out of the conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// Zero-based row index in the buffer
    pub row: usize,
    pub reason: String,
}

/// Result of converting a buffer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub readings: Vec<Reading>,
    pub skipped: Vec<SkippedRow>,
}

impl Conversion {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_reading_serializes_iso_timestamp() {
        let reading = Reading {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(10, 15, 0)
                .unwrap(),
            values: vec![123.4, 56.7],
            source: TimestampSource::Inferred,
            device_flagged: false,
        };

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["timestamp"], "2024-01-01T10:15:00");
        assert_eq!(json["source"], "INFERRED");
        assert_eq!(reading.to_string(), "2024-01-01 10:15:00 123.4 56.7");
    }
}
