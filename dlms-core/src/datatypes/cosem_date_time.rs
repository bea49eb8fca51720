//! COSEM date-time
//!
//! Twelve octets: date (5), time (4), deviation (2, big endian) and the
//! clock status byte. Profile rows often leave out parts that the reader
//! fills in from earlier rows.

use crate::datatypes::cosem_date::{fixed_length, CosemDate, CosemDateFormat};
use crate::datatypes::cosem_time::CosemTime;
use crate::error::{DlmsError, DlmsResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deviation value meaning "not specified" (0x8000 on the wire)
pub const DEVIATION_NOT_SPECIFIED: i16 = i16::MIN;

/// Bits of the clock status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStatus {
    InvalidValue = 0x01,
    DoubtfulValue = 0x02,
    DifferentClockBase = 0x04,
    InvalidClockStatus = 0x08,
    DaylightSavingActive = 0x80,
}

impl ClockStatus {
    const ALL: [ClockStatus; 5] = [
        ClockStatus::InvalidValue,
        ClockStatus::DoubtfulValue,
        ClockStatus::DifferentClockBase,
        ClockStatus::InvalidClockStatus,
        ClockStatus::DaylightSavingActive,
    ];

    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Flags set in a status byte
    pub fn flags(byte: u8) -> impl Iterator<Item = ClockStatus> {
        Self::ALL.into_iter().filter(move |status| byte & status.bit() != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosemDateTime {
    date: CosemDate,
    time: CosemTime,
    deviation: i16,
    clock_status: u8,
}

impl CosemDateTime {
    pub const LENGTH: usize = 12;

    /// Date-time without deviation or clock status
    pub fn new(
        year: u16,
        month: u8,
        day_of_month: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> DlmsResult<Self> {
        Self::from_date_time(
            CosemDate::new(year, month, day_of_month)?,
            CosemTime::new(hour, minute, second)?,
            DEVIATION_NOT_SPECIFIED,
            &[],
        )
    }

    /// `deviation` is minutes from local time to GMT in `[-720, 720]`, or
    /// [`DEVIATION_NOT_SPECIFIED`]
    pub fn from_date_time(
        date: CosemDate,
        time: CosemTime,
        deviation: i16,
        clock_status: &[ClockStatus],
    ) -> DlmsResult<Self> {
        if !(-720..=720).contains(&deviation) && deviation != DEVIATION_NOT_SPECIFIED {
            return Err(DlmsError::InvalidData(format!(
                "Deviation out of range [-720, 720], got {}",
                deviation
            )));
        }
        Ok(Self {
            date,
            time,
            deviation,
            clock_status: clock_status.iter().fold(0, |byte, status| byte | status.bit()),
        })
    }

    /// Fully specified local date-time without deviation
    pub fn from_naive(value: NaiveDateTime) -> DlmsResult<Self> {
        Self::from_date_time(
            CosemDate::from_naive(value.date())?,
            CosemTime::from_naive(value.time())?,
            DEVIATION_NOT_SPECIFIED,
            &[],
        )
    }

    pub fn decode(octet_string: &[u8]) -> DlmsResult<Self> {
        let bytes = fixed_length::<12>("Date-time", octet_string)?;
        Ok(Self {
            date: CosemDate::decode(&bytes[..5])?,
            time: CosemTime::decode(&bytes[5..9])?,
            deviation: i16::from_be_bytes([bytes[9], bytes[10]]),
            clock_status: bytes[11],
        })
    }

    pub fn date(&self) -> &CosemDate {
        &self.date
    }

    pub fn time(&self) -> &CosemTime {
        &self.time
    }

    pub fn deviation(&self) -> i16 {
        self.deviation
    }

    pub fn clock_status(&self) -> Vec<ClockStatus> {
        ClockStatus::flags(self.clock_status).collect()
    }

    /// Local date-time when every component up to the minute is specified
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        Some(NaiveDateTime::new(self.date.to_naive()?, self.time.to_naive()?))
    }
}

impl CosemDateFormat for CosemDateTime {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = self.date.encode();
        bytes.extend(self.time.encode());
        bytes.extend(self.deviation.to_be_bytes());
        bytes.push(self.clock_status);
        bytes
    }
}

impl fmt::Display for CosemDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_decode() {
        let bytes = [
            0x07, 0xE8, 0x01, 0x0F, 0xFF, // 2024-01-15
            0x0E, 0x1E, 0x2D, 0xFF, // 14:30:45
            0x80, 0x00, // deviation not specified
            0x80, // daylight saving active
        ];
        let dt = CosemDateTime::decode(&bytes).unwrap();
        assert_eq!(dt.deviation(), DEVIATION_NOT_SPECIFIED);
        assert_eq!(dt.clock_status(), vec![ClockStatus::DaylightSavingActive]);
        assert_eq!(
            dt.to_naive(),
            NaiveDate::from_ymd_opt(2024, 1, 15).and_then(|d| d.and_hms_opt(14, 30, 45))
        );
        assert_eq!(dt.encode(), bytes.to_vec());
        assert!(CosemDateTime::decode(&bytes[..11]).is_err());
    }

    #[test]
    fn test_from_naive() {
        let naive = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(23, 45, 0).unwrap();
        let dt = CosemDateTime::from_naive(naive).unwrap();
        assert_eq!(dt.to_naive(), Some(naive));
        assert_eq!(dt.to_string(), "2024-03-09 23:45:00");
    }

    #[test]
    fn test_partially_specified_has_no_naive_value() {
        let dt = CosemDateTime::new(0xffff, 0xff, 0xff, 10, 15, 0).unwrap();
        assert_eq!(dt.to_naive(), None);
        assert!(dt.time().is_specified());
        assert!(!dt.date().is_specified());
    }

    #[test]
    fn test_deviation_and_status() {
        let date = CosemDate::new(2024, 1, 1).unwrap();
        let time = CosemTime::new(0, 0, 0).unwrap();
        let flagged = CosemDateTime::from_date_time(
            date.clone(),
            time.clone(),
            120,
            &[ClockStatus::InvalidValue, ClockStatus::DoubtfulValue],
        )
        .unwrap();
        assert_eq!(flagged.encode()[11], 0x03);
        assert!(CosemDateTime::from_date_time(date, time, 721, &[]).is_err());
    }
}
