//! Column layout of a profile buffer

use dlms_core::{CaptureObject, DataObject, DlmsError, DlmsResult, ObisCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered capture objects of a Profile Generic object
///
/// Column `i` of every buffer row holds the attribute described by
/// `columns()[i]`. Read-only once resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureLayout {
    columns: Vec<CaptureObject>,
}

impl CaptureLayout {
    pub fn new(columns: Vec<CaptureObject>) -> Self {
        Self { columns }
    }

    /// Parse the value of the capture_objects attribute
    ///
    /// The value is an array of structures
    /// `{class_id, logical_name, attribute_index, data_index}`. A missing
    /// data_index counts as 0.
    pub fn from_data_object(value: &DataObject) -> DlmsResult<Self> {
        let items = value
            .as_array()
            .map_err(|e| DlmsError::LayoutResolution(e.to_string()))?;
        let columns = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                parse_capture_object(item)
                    .map_err(|e| DlmsError::LayoutResolution(format!("column {}: {}", i + 1, e)))
            })
            .collect::<DlmsResult<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[CaptureObject] {
        &self.columns
    }

    pub fn get(&self, index: usize) -> Option<&CaptureObject> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Index of the first column whose logical name is `obis`
    pub fn column_of(&self, obis: &ObisCode) -> Option<usize> {
        self.columns.iter().position(|c| c.logical_name == *obis)
    }

    /// Index of the first Clock time column
    pub fn clock_column(&self) -> Option<usize> {
        self.columns.iter().position(CaptureObject::is_clock_time)
    }

    /// One-line column header for logs
    pub fn header(&self) -> String {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<25}", format!("{}: {}", i + 1, c.logical_name)))
            .collect()
    }
}

fn parse_capture_object(item: &DataObject) -> DlmsResult<CaptureObject> {
    let fields = item.as_structure()?;
    if fields.len() < 3 {
        return Err(DlmsError::InvalidData(format!(
            "capture object needs at least 3 elements, got {}",
            fields.len()
        )));
    }

    let class_id = u16::try_from(fields[0].as_u64()?)
        .map_err(|_| DlmsError::InvalidData("class_id out of range".to_string()))?;
    let logical_name = ObisCode::from_bytes(fields[1].as_octet_string()?)?;
    let attribute_index = match &fields[2] {
        DataObject::Integer8(i) => *i,
        other => i8::try_from(other.as_u64()?)
            .map_err(|_| DlmsError::InvalidData("attribute_index out of range".to_string()))?,
    };
    let data_index = match fields.get(3) {
        Some(value) => u16::try_from(value.as_u64()?)
            .map_err(|_| DlmsError::InvalidData("data_index out of range".to_string()))?,
        None => 0,
    };

    Ok(CaptureObject {
        class_id,
        logical_name,
        attribute_index,
        data_index,
    })
}

impl fmt::Display for CaptureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", column)?;
        }
        write!(f, "]")
    }
}
