//! COSEM time: hour, minute, second and hundredths, each may be 0xff

use crate::datatypes::cosem_date::{component, fixed_length, CosemDateFormat, NOT_SPECIFIED};
use crate::error::{DlmsError, DlmsResult};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosemTime {
    hour: u8,
    minute: u8,
    second: u8,
    hundredths: u8,
}

impl CosemTime {
    pub const LENGTH: usize = 4;

    pub fn new(hour: u8, minute: u8, second: u8) -> DlmsResult<Self> {
        Self::new_with_hundredths(hour, minute, second, NOT_SPECIFIED)
    }

    pub fn new_with_hundredths(
        hour: u8,
        minute: u8,
        second: u8,
        hundredths: u8,
    ) -> DlmsResult<Self> {
        let skipped = [NOT_SPECIFIED];
        Ok(Self {
            hour: component("Hour", hour, 0..=23, &skipped)?,
            minute: component("Minute", minute, 0..=59, &skipped)?,
            second: component("Second", second, 0..=59, &skipped)?,
            hundredths: component("Hundredths", hundredths, 0..=99, &skipped)?,
        })
    }

    pub fn unspecified() -> Self {
        Self {
            hour: NOT_SPECIFIED,
            minute: NOT_SPECIFIED,
            second: NOT_SPECIFIED,
            hundredths: NOT_SPECIFIED,
        }
    }

    /// Time of day truncated to whole seconds
    pub fn from_naive(time: NaiveTime) -> DlmsResult<Self> {
        Self::new(time.hour() as u8, time.minute() as u8, time.second() as u8)
    }

    pub fn decode(octet_string: &[u8]) -> DlmsResult<Self> {
        let [hour, minute, second, hundredths] = fixed_length::<4>("Time", octet_string)?;
        Ok(Self {
            hour,
            minute,
            second,
            hundredths,
        })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    /// Hour and minute both carry values
    pub fn is_specified(&self) -> bool {
        self.hour <= 23 && self.minute <= 59
    }

    /// Time of day; an unspecified second counts as zero
    pub fn to_naive(&self) -> Option<NaiveTime> {
        if !self.is_specified() {
            return None;
        }
        let second = if self.second <= 59 { self.second } else { 0 };
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), u32::from(second))
    }
}

impl CosemDateFormat for CosemTime {
    fn encode(&self) -> Vec<u8> {
        vec![self.hour, self.minute, self.second, self.hundredths]
    }
}

impl fmt::Display for CosemTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl TryFrom<&[u8]> for CosemTime {
    type Error = DlmsError;

    fn try_from(octet_string: &[u8]) -> DlmsResult<Self> {
        Self::decode(octet_string)
    }
}
