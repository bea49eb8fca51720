use super::{check_width, field_columns, field_values, skip, timestamp_of};
use crate::capture::CaptureLayout;
use crate::reading::{Conversion, Reading, TimestampSource};
use crate::row::RawRow;
use crate::timestamp::resolve;
use chrono::NaiveDateTime;
use dlms_core::{DlmsError, DlmsResult, ObisCode};

/// Reads the timestamp of each row from its Clock column
///
/// The column is looked up by the Clock logical name, then by the first
/// Clock time column, then defaults to column 0. Rows whose timestamp
/// cannot be completed are skipped, including the first row when it
/// needs a previous timestamp and none was seeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalConverter {
    clock: ObisCode,
}

impl PositionalConverter {
    pub fn new(clock: ObisCode) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> ObisCode {
        self.clock
    }

    fn clock_column(&self, layout: &CaptureLayout) -> usize {
        layout
            .column_of(&self.clock)
            .or_else(|| layout.clock_column())
            .unwrap_or_else(|| {
                log::warn!("Clock {} not in capture objects, reading column 0", self.clock);
                0
            })
    }

    pub fn convert(
        &self,
        rows: &[RawRow],
        layout: &CaptureLayout,
        fields: &[ObisCode],
        seed: Option<NaiveDateTime>,
    ) -> Conversion {
        let clock_column = self.clock_column(layout);
        let columns = field_columns(layout, fields);
        let mut conversion = Conversion::default();
        let mut previous = seed;

        for (index, row) in rows.iter().enumerate() {
            match self.convert_row(index, row, layout, clock_column, &columns, previous) {
                Ok(reading) => {
                    previous = Some(reading.timestamp);
                    conversion.readings.push(reading);
                }
                Err(e) => skip(&mut conversion, e, index),
            }
        }
        conversion
    }

    fn convert_row(
        &self,
        index: usize,
        row: &RawRow,
        layout: &CaptureLayout,
        clock_column: usize,
        columns: &[usize],
        previous: Option<NaiveDateTime>,
    ) -> DlmsResult<Reading> {
        check_width(index, row, layout)?;
        let clock = row
            .get(clock_column)
            .and_then(timestamp_of)
            .ok_or_else(|| DlmsError::Conversion {
                row: index,
                reason: format!("no date-time in clock column {}", clock_column + 1),
            })?;

        Ok(Reading {
            timestamp: resolve(index, &clock, previous)?,
            values: field_values(index, row, columns)?,
            source: TimestampSource::Clock,
            device_flagged: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::tests::{at, layout, ENERGY_EXPORT, ENERGY_IMPORT};
    use dlms_core::{Cell, CosemDateFormat, CosemDateTime};

    fn clock_cell(h: u8, m: u8) -> Option<Cell> {
        Some(Cell::Timestamp(CosemDateTime::new(2024, 1, 1, h, m, 0).unwrap()))
    }

    fn row(clock: Option<Cell>, import: f64, export: f64) -> RawRow {
        RawRow::new(vec![
            clock,
            Some(Cell::Numeric(0.0)),
            Some(Cell::Numeric(import)),
            Some(Cell::Numeric(export)),
        ])
    }

    #[test]
    fn test_timestamps_come_from_clock_column() {
        let rows = vec![row(clock_cell(10, 0), 1.0, 2.0), row(clock_cell(10, 15), 3.0, 4.0)];
        let converter = PositionalConverter::new(ObisCode::CLOCK);

        let conversion = converter.convert(&rows, &layout(), &[ENERGY_IMPORT, ENERGY_EXPORT], None);
        assert_eq!(conversion.skipped_count(), 0);
        assert_eq!(conversion.readings[0].timestamp, at(10, 0));
        assert_eq!(conversion.readings[1].timestamp, at(10, 15));
        assert_eq!(conversion.readings[1].values, vec![3.0, 4.0]);
        assert_eq!(conversion.readings[1].source, TimestampSource::Clock);
    }

    #[test]
    fn test_undecoded_clock_octet_string_is_accepted() {
        let encoded = CosemDateTime::new(2024, 1, 1, 9, 45, 0).unwrap().encode();
        let rows = vec![row(Some(Cell::ByteString(encoded)), 1.0, 2.0)];

        let conversion = PositionalConverter::new(ObisCode::CLOCK).convert(&rows, &layout(), &[ENERGY_IMPORT], None);
        assert_eq!(conversion.readings[0].timestamp, at(9, 45));
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let date_missing = CosemDateTime::decode(&[
            0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 10, 30, 0, 0, 0x80, 0x00, 0,
        ])
        .unwrap();
        let rows = vec![
            // Needs a previous date, none seeded yet
            row(Some(Cell::Timestamp(date_missing.clone())), 1.0, 1.0),
            row(None, 2.0, 2.0),
            row(clock_cell(10, 0), 3.0, 3.0),
            RawRow::new(vec![clock_cell(10, 15)]),
            row(Some(Cell::Timestamp(date_missing)), 5.0, 5.0),
        ];

        let conversion = PositionalConverter::new(ObisCode::CLOCK).convert(&rows, &layout(), &[ENERGY_IMPORT], None);
        let skipped: Vec<usize> = conversion.skipped.iter().map(|s| s.row).collect();
        assert_eq!(skipped, vec![0, 1, 3]);
        assert_eq!(conversion.readings.len(), 2);
        assert_eq!(conversion.readings[1].timestamp, at(10, 30));
        assert_eq!(conversion.readings[1].values, vec![5.0]);
    }

    #[test]
    fn test_clock_found_without_matching_name() {
        let converter = PositionalConverter::new(ObisCode::new(0, 0, 1, 0, 0, 254));
        assert_eq!(converter.clock_column(&layout()), 0);
        assert_eq!(converter.clock(), ObisCode::new(0, 0, 1, 0, 0, 254));
    }
}
