use super::{check_width, field_columns, field_values, skip, timestamp_of};
use crate::capture::CaptureLayout;
use crate::reading::{Conversion, Reading, TimestampSource};
use crate::row::RawRow;
use crate::timestamp::{next_slot, resolve};
use chrono::NaiveDateTime;
use dlms_core::{Cell, CosemDateTime, DlmsError, DlmsResult, ObisCode};

/// Timestamps from two candidate columns, inferred when both are absent
///
/// Each timestamp column holds a structure `{date_time, status}`. A row
/// is flagged when either present column carries a non-zero status; its
/// timestamp is then taken from the primary column, or the secondary one
/// when the primary is null. An unflagged row without a primary
/// timestamp is placed in the quarter-hour slot after the previous
/// reading.
///
/// A row that needs the previous timestamp while there is none fails the
/// whole conversion with [`DlmsError::MissingTimestampSeed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConverter {
    primary: usize,
    secondary: usize,
}

impl Default for InferenceConverter {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl InferenceConverter {
    pub fn new(primary: usize, secondary: usize) -> Self {
        Self { primary, secondary }
    }

    pub fn convert(
        &self,
        rows: &[RawRow],
        layout: &CaptureLayout,
        fields: &[ObisCode],
        seed: Option<NaiveDateTime>,
    ) -> DlmsResult<Conversion> {
        let columns = field_columns(layout, fields);
        let mut conversion = Conversion::default();
        let mut previous = seed;

        for (index, row) in rows.iter().enumerate() {
            match self.convert_row(index, row, layout, &columns, previous) {
                Ok(reading) => {
                    previous = Some(reading.timestamp);
                    conversion.readings.push(reading);
                }
                Err(e @ DlmsError::MissingTimestampSeed { .. }) => {
                    log::error!("Profile row {} cannot be timestamped: {}", index, e);
                    return Err(e);
                }
                Err(e) => skip(&mut conversion, e, index),
            }
        }
        Ok(conversion)
    }

    fn convert_row(
        &self,
        index: usize,
        row: &RawRow,
        layout: &CaptureLayout,
        columns: &[usize],
        previous: Option<NaiveDateTime>,
    ) -> DlmsResult<Reading> {
        check_width(index, row, layout)?;
        let primary = row.get(self.primary);
        let secondary = row.get(self.secondary);
        let flagged = primary.is_some_and(is_flagged) || secondary.is_some_and(is_flagged);

        let (timestamp, source) = match (primary, secondary) {
            (Some(cell), _) => (
                resolve(index, &embedded_timestamp(index, cell)?, previous)?,
                TimestampSource::Primary,
            ),
            (None, Some(cell)) if flagged => (
                resolve(index, &embedded_timestamp(index, cell)?, previous)?,
                TimestampSource::Secondary,
            ),
            _ => {
                let previous = previous.ok_or(DlmsError::MissingTimestampSeed { row: index })?;
                (next_slot(previous), TimestampSource::Inferred)
            }
        };
        if flagged {
            log::debug!("Profile row {} flagged by device status", index);
        }

        Ok(Reading {
            timestamp,
            values: field_values(index, row, columns)?,
            source,
            device_flagged: flagged,
        })
    }
}

/// Non-zero status in the second element of a timestamp structure
///
/// Cells that are not structures, or have no status, are not flagged.
fn is_flagged(cell: &Cell) -> bool {
    match cell.as_structure().and_then(|items| items.get(1)) {
        Some(Some(status)) => !status.is_zero_status(),
        _ => false,
    }
}

/// Date-time carried by a timestamp column
fn embedded_timestamp(index: usize, cell: &Cell) -> DlmsResult<CosemDateTime> {
    let found = match cell.as_structure() {
        Some(items) => items.first().and_then(Option::as_ref).and_then(timestamp_of),
        None => timestamp_of(cell),
    };
    found.ok_or_else(|| DlmsError::Conversion {
        row: index,
        reason: format!("no date-time in timestamp cell {}", cell),
    })
}
