//! Timestamp reconstruction for profile rows

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use dlms_core::{CosemDateTime, DlmsError, DlmsResult};

/// Round a minute-of-hour up to the next quarter
///
/// `0` stays `0`, `(0,15]` gives 15, `(15,30]` gives 30, `(30,45]` gives 45
/// and anything later gives 60, meaning minute 0 of the next hour.
pub fn round15(minute: u32) -> u32 {
    match minute {
        0 => 0,
        1..=15 => 15,
        16..=30 => 30,
        31..=45 => 45,
        _ => 60,
    }
}

/// The quarter-hour slot following a previous reading
///
/// The previous time is truncated to the minute, its minute rounded up
/// with [`round15`], then 15 minutes are added.
pub fn next_slot(previous: NaiveDateTime) -> NaiveDateTime {
    let hour_start = previous
        - Duration::minutes(i64::from(previous.minute()))
        - Duration::seconds(i64::from(previous.second()))
        - Duration::nanoseconds(i64::from(previous.nanosecond()));
    hour_start + Duration::minutes(i64::from(round15(previous.minute()) + 15))
}

/// Turn a device timestamp of row `row` into a local time
///
/// An unspecified date is taken from `previous`. An unspecified hour or
/// minute gives midnight; an unspecified second gives 0. Fails with
/// [`DlmsError::MissingTimestampSeed`] when the date is needed but there is
/// no previous timestamp.
pub fn resolve(
    row: usize,
    value: &CosemDateTime,
    previous: Option<NaiveDateTime>,
) -> DlmsResult<NaiveDateTime> {
    let date = if value.date().is_specified() {
        value.date().to_naive().ok_or_else(|| DlmsError::Conversion {
            row,
            reason: format!("invalid date {}", value.date()),
        })?
    } else {
        previous
            .ok_or(DlmsError::MissingTimestampSeed { row })?
            .date()
    };

    let time = if value.time().is_specified() {
        value.time().to_naive().ok_or_else(|| DlmsError::Conversion {
            row,
            reason: format!("invalid time {}", value.time()),
        })?
    } else {
        NaiveTime::MIN
    };

    Ok(date.and_time(time))
}
