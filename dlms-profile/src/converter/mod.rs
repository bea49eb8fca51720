//! Row-to-reading converters
//!
//! Both converters walk the rows in order, carrying the timestamp of the
//! last emitted reading into the next row. A row that cannot be converted
//! is logged and reported in [`Conversion::skipped`]; the rest of the
//! buffer is still converted.

mod inference;
mod positional;

pub use inference::InferenceConverter;
pub use positional::PositionalConverter;

use crate::capture::CaptureLayout;
use crate::family::DeviceFamily;
use crate::reading::{Conversion, SkippedRow};
use crate::row::RawRow;
use chrono::NaiveDateTime;
use dlms_core::{Cell, CosemDateTime, DlmsError, DlmsResult, ObisCode};

/// Conversion policy of a device family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Converter {
    Positional(PositionalConverter),
    TimestampInference(InferenceConverter),
}

impl Converter {
    /// Converter for `family`; `clock` names the Clock object of the profile
    pub fn for_family(family: DeviceFamily, clock: ObisCode) -> Self {
        if family.infers_timestamps() {
            Converter::TimestampInference(InferenceConverter::default())
        } else {
            Converter::Positional(PositionalConverter::new(clock))
        }
    }

    /// Convert `rows` into readings of `fields`
    ///
    /// `seed` stands in for the previous timestamp of the first row.
    pub fn convert(
        &self,
        rows: &[RawRow],
        layout: &CaptureLayout,
        fields: &[ObisCode],
        seed: Option<NaiveDateTime>,
    ) -> DlmsResult<Conversion> {
        let conversion = match self {
            Converter::Positional(c) => c.convert(rows, layout, fields, seed),
            Converter::TimestampInference(c) => c.convert(rows, layout, fields, seed)?,
        };
        log::info!(
            "Converted {} rows into {} readings, {} skipped",
            rows.len(),
            conversion.readings.len(),
            conversion.skipped_count()
        );
        Ok(conversion)
    }
}

/// Column index of every requested field
///
/// A field missing from the layout reads column 0.
pub(crate) fn field_columns(layout: &CaptureLayout, fields: &[ObisCode]) -> Vec<usize> {
    fields
        .iter()
        .map(|field| {
            layout.column_of(field).unwrap_or_else(|| {
                log::warn!("Field {} not in capture objects, reading column 0", field);
                0
            })
        })
        .collect()
}

pub(crate) fn check_width(row_index: usize, row: &RawRow, layout: &CaptureLayout) -> DlmsResult<()> {
    if row.len() != layout.len() {
        return Err(DlmsError::Conversion {
            row: row_index,
            reason: format!("{} cells for {} capture objects", row.len(), layout.len()),
        });
    }
    Ok(())
}

/// Numeric values of the field columns of a row
pub(crate) fn field_values(row_index: usize, row: &RawRow, columns: &[usize]) -> DlmsResult<Vec<f64>> {
    columns
        .iter()
        .map(|column| field_value(row_index, row.get(*column)))
        .collect()
}

fn field_value(row_index: usize, cell: Option<&Cell>) -> DlmsResult<f64> {
    let text = match cell {
        None => {
            return Err(DlmsError::Conversion {
                row: row_index,
                reason: "field value is null".to_string(),
            })
        }
        Some(Cell::Numeric(value)) => return Ok(*value),
        // Some meters put the decimal digits of the value in an octet string
        Some(Cell::ByteString(bytes)) => hex::encode_upper(bytes),
        Some(Cell::Text(text)) => text.clone(),
        Some(Cell::Structure(items)) => match items.first() {
            Some(Some(first)) => match timestamp_of(first) {
                Some(dt) => dt.to_string(),
                None => first.to_string(),
            },
            _ => String::new(),
        },
        Some(Cell::Timestamp(dt)) => dt.to_string(),
    };
    text.trim().parse::<f64>().map_err(|_| DlmsError::Conversion {
        row: row_index,
        reason: format!("'{}' is not a number", text),
    })
}

/// Date-time held directly by a cell
pub(crate) fn timestamp_of(cell: &Cell) -> Option<CosemDateTime> {
    match cell {
        Cell::Timestamp(dt) => Some(dt.clone()),
        Cell::ByteString(bytes) if bytes.len() == CosemDateTime::LENGTH => {
            CosemDateTime::decode(bytes).ok()
        }
        _ => None,
    }
}

pub(crate) fn skip(conversion: &mut Conversion, err: DlmsError, row: usize) {
    log::warn!("Skipping profile row {}: {}", row, err);
    let reason = match err {
        DlmsError::Conversion { reason, .. } => reason,
        other => other.to_string(),
    };
    conversion.skipped.push(SkippedRow { row, reason });
}
