//! COSEM date
//!
//! Dates arrive as five octets: big-endian year, month, day of month and
//! day of week. Any component may hold a "not specified" marker, and month
//! and day have extra markers for recurring dates.

use crate::error::{DlmsError, DlmsResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Octet-string form shared by COSEM date, time and date-time
pub trait CosemDateFormat {
    fn encode(&self) -> Vec<u8>;
}

/// Marker of a skipped one-byte component
pub(crate) const NOT_SPECIFIED: u8 = 0xff;
const YEAR_NOT_SPECIFIED: u16 = 0xffff;

/// Month markers: daylight saving end / begin
const MONTH_MARKERS: [u8; 3] = [0xfd, 0xfe, NOT_SPECIFIED];
/// Day markers: second last / last day of the month
const DAY_MARKERS: [u8; 3] = [0xfd, 0xfe, NOT_SPECIFIED];

/// Accept `value` when it lies in `range` or is one of `markers`
pub(crate) fn component(
    name: &str,
    value: u8,
    range: RangeInclusive<u8>,
    markers: &[u8],
) -> DlmsResult<u8> {
    if range.contains(&value) || markers.contains(&value) {
        Ok(value)
    } else {
        Err(DlmsError::InvalidData(format!(
            "{} out of range [{}, {}], got {}",
            name,
            range.start(),
            range.end(),
            value
        )))
    }
}

pub(crate) fn fixed_length<const N: usize>(kind: &str, octet_string: &[u8]) -> DlmsResult<[u8; N]> {
    octet_string.try_into().map_err(|_| {
        DlmsError::InvalidData(format!(
            "{} needs {} octets, got {}",
            kind,
            N,
            octet_string.len()
        ))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosemDate {
    year: u16,
    month: u8,
    day_of_month: u8,
    day_of_week: u8,
}

impl CosemDate {
    pub const LENGTH: usize = 5;

    /// Date without day of week
    ///
    /// `year` may be 0xffff, `month` and `day_of_month` may be 0xff or one
    /// of the recurring-date markers.
    pub fn new(year: u16, month: u8, day_of_month: u8) -> DlmsResult<Self> {
        Self::new_with_day_of_week(year, month, day_of_month, NOT_SPECIFIED)
    }

    /// `day_of_week` runs from 1 (Monday) to 7, or 0xff
    pub fn new_with_day_of_week(
        year: u16,
        month: u8,
        day_of_month: u8,
        day_of_week: u8,
    ) -> DlmsResult<Self> {
        Ok(Self {
            year,
            month: component("Month", month, 1..=12, &MONTH_MARKERS)?,
            day_of_month: component("Day of month", day_of_month, 1..=31, &DAY_MARKERS)?,
            day_of_week: component("Day of week", day_of_week, 1..=7, &[NOT_SPECIFIED])?,
        })
    }

    pub fn unspecified() -> Self {
        Self {
            year: YEAR_NOT_SPECIFIED,
            month: NOT_SPECIFIED,
            day_of_month: NOT_SPECIFIED,
            day_of_week: NOT_SPECIFIED,
        }
    }

    pub fn from_naive(date: NaiveDate) -> DlmsResult<Self> {
        let year = u16::try_from(date.year()).map_err(|_| {
            DlmsError::InvalidData(format!("Year {} cannot be encoded", date.year()))
        })?;
        Self::new_with_day_of_week(
            year,
            date.month() as u8,
            date.day() as u8,
            date.weekday().number_from_monday() as u8,
        )
    }

    /// Decode without range checks; meters send markers freely
    pub fn decode(octet_string: &[u8]) -> DlmsResult<Self> {
        let [y0, y1, month, day_of_month, day_of_week] = fixed_length::<5>("Date", octet_string)?;
        Ok(Self {
            year: u16::from_be_bytes([y0, y1]),
            month,
            day_of_month,
            day_of_week,
        })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day_of_month(&self) -> u8 {
        self.day_of_month
    }

    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }

    /// Whether year, month and day all carry calendar values
    ///
    /// Daylight-saving and last-day markers count as skipped: they describe
    /// a recurring date, not a point in time.
    pub fn is_specified(&self) -> bool {
        self.year != YEAR_NOT_SPECIFIED
            && (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day_of_month)
    }

    /// The calendar date, when fully specified and valid
    pub fn to_naive(&self) -> Option<NaiveDate> {
        if !self.is_specified() {
            return None;
        }
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day_of_month),
        )
    }
}

impl CosemDateFormat for CosemDate {
    fn encode(&self) -> Vec<u8> {
        let [y0, y1] = self.year.to_be_bytes();
        vec![y0, y1, self.month, self.day_of_month, self.day_of_week]
    }
}

impl fmt::Display for CosemDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day_of_month)
    }
}
