//! Profile buffer rows

use crate::capture::CaptureLayout;
use dlms_core::{CaptureObject, Cell, CosemDateTime, DataObject, DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of a profile buffer, cells in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: Vec<Option<Cell>>,
}

impl RawRow {
    pub fn new(cells: Vec<Option<Cell>>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Option<Cell>] {
        &self.cells
    }

    /// Cell of column `index`; `None` for null or missing cells
    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Vec<Option<Cell>>> for RawRow {
    fn from(cells: Vec<Option<Cell>>) -> Self {
        Self::new(cells)
    }
}

impl fmt::Display for RawRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            let text = match cell {
                Some(cell) => format!("{}: {}", i + 1, cell),
                None => format!("{}: null", i + 1),
            };
            if i < 2 {
                write!(f, "{:<25}", text)?;
            } else {
                write!(f, "{:<15}", text)?;
            }
        }
        Ok(())
    }
}

/// Split a decoded buffer value into rows
///
/// The buffer is an array of structures, one per entry. A null buffer is
/// an empty profile. Rows are not checked against the layout width here;
/// the converters report mismatches per row.
pub fn rows_from_buffer(buffer: &DataObject, layout: &CaptureLayout) -> DlmsResult<Vec<RawRow>> {
    if buffer.is_null() {
        return Ok(Vec::new());
    }
    buffer
        .as_array()?
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let values = entry.as_structure().map_err(|e| {
                DlmsError::InvalidData(format!("buffer entry {}: {}", i + 1, e))
            })?;
            let cells = values
                .iter()
                .enumerate()
                .map(|(column, value)| cell_for_column(value, layout.get(column)))
                .collect();
            Ok(RawRow::new(cells))
        })
        .collect()
}

fn cell_for_column(value: &DataObject, column: Option<&CaptureObject>) -> Option<Cell> {
    // Clock time is captured as a plain octet string
    if let (Some(column), DataObject::OctetString(bytes)) = (column, value) {
        if column.is_clock_time() && bytes.len() == CosemDateTime::LENGTH {
            if let Ok(dt) = CosemDateTime::decode(bytes) {
                return Some(Cell::Timestamp(dt));
            }
        }
    }
    Cell::from_data_object(value)
}
