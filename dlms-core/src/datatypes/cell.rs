//! Row cells of a profile buffer

use crate::datatypes::cosem_date::CosemDate;
use crate::datatypes::cosem_date_time::{CosemDateTime, DEVIATION_NOT_SPECIFIED};
use crate::datatypes::cosem_time::CosemTime;
use crate::datatypes::data_object::DataObject;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest success code a device writes as text
const ZERO_STATUS_TEXT: &str = "000000";

/// One cell of a profile row
///
/// Rows are `Vec<Option<Cell>>`; `None` stands for a null value in the
/// device reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Numeric(f64),
    ByteString(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Visible or UTF-8 string
    Text(String),
    Structure(Vec<Option<Cell>>),
    Timestamp(CosemDateTime),
}

impl Cell {
    /// Map a decoded value to a cell
    ///
    /// Dates and times become timestamps with the missing half marked as
    /// not specified. Returns `None` for null data.
    pub fn from_data_object(value: &DataObject) -> Option<Cell> {
        if value.is_null() {
            return None;
        }
        if let Some(number) = value.as_f64() {
            return Some(Cell::Numeric(number));
        }
        let cell = match value {
            DataObject::VisibleString(s) | DataObject::Utf8String(s) => {
                Cell::Text(String::from_utf8_lossy(s).into_owned())
            }
            DataObject::OctetString(bytes) | DataObject::BitString { bytes, .. } => {
                Cell::ByteString(bytes.clone())
            }
            DataObject::Array(items) | DataObject::Structure(items) => {
                Cell::Structure(items.iter().map(Cell::from_data_object).collect())
            }
            DataObject::DateTime(dt) => Cell::Timestamp(dt.clone()),
            DataObject::Date(date) => Cell::Timestamp(CosemDateTime::from_date_time(
                date.clone(),
                CosemTime::unspecified(),
                DEVIATION_NOT_SPECIFIED,
                &[],
            ).ok()?),
            DataObject::Time(time) => Cell::Timestamp(CosemDateTime::from_date_time(
                CosemDate::unspecified(),
                time.clone(),
                DEVIATION_NOT_SPECIFIED,
                &[],
            ).ok()?),
            _ => return None,
        };
        Some(cell)
    }

    /// Whether the cell holds the all-zero success code
    ///
    /// Numbers must equal zero and byte strings must be all zero bytes.
    /// Text passes when it is a suffix of `"000000"`, so `"0"` and
    /// `"000000"` do and `"0000000"` does not. Structures and timestamps
    /// never count as a success code.
    pub fn is_zero_status(&self) -> bool {
        match self {
            Cell::Numeric(value) => *value == 0.0,
            Cell::ByteString(bytes) => bytes.iter().all(|b| *b == 0),
            Cell::Text(text) => ZERO_STATUS_TEXT.ends_with(text.as_str()),
            Cell::Structure(_) | Cell::Timestamp(_) => false,
        }
    }

    pub fn as_timestamp(&self) -> Option<&CosemDateTime> {
        match self {
            Cell::Timestamp(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&[Option<Cell>]> {
        match self {
            Cell::Structure(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Numeric(value) => write!(f, "{}", value),
            Cell::ByteString(bytes) => write!(f, "{}", hex::encode_upper(bytes)),
            Cell::Text(text) => write!(f, "{}", text),
            Cell::Timestamp(dt) => write!(f, "{}", dt),
            Cell::Structure(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Some(cell) => write!(f, "{}", cell)?,
                        None => write!(f, "null")?,
                    }
                }
                write!(f, "}}")
            }
        }
    }
}
