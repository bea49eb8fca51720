//! Decoded DLMS values

use crate::datatypes::cosem_date::CosemDate;
use crate::datatypes::cosem_date_time::CosemDateTime;
use crate::datatypes::cosem_time::CosemTime;
use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed value decoded by a frame codec from a device reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataObject {
    Null,
    Boolean(bool),
    Integer8(i8),
    Integer16(i16),
    Integer32(i32),
    Integer64(i64),
    Unsigned8(u8),
    Unsigned16(u16),
    Unsigned32(u32),
    Unsigned64(u64),
    Float32(f32),
    Float64(f64),
    Enumerate(u8),
    Bcd(u8),
    OctetString(#[serde(with = "serde_bytes")] Vec<u8>),
    VisibleString(#[serde(with = "serde_bytes")] Vec<u8>),
    Utf8String(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Bit string, most significant bit of the first byte first
    BitString {
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
        num_bits: usize,
    },
    Array(Vec<DataObject>),
    /// Ordered list of values, e.g. one profile row
    Structure(Vec<DataObject>),
    Date(CosemDate),
    Time(CosemTime),
    DateTime(CosemDateTime),
}

impl DataObject {
    /// DLMS name of the value's data type
    pub fn type_name(&self) -> &'static str {
        match self {
            DataObject::Null => "NULL_DATA",
            DataObject::Boolean(_) => "BOOLEAN",
            DataObject::Integer8(_) => "INTEGER",
            DataObject::Integer16(_) => "LONG",
            DataObject::Integer32(_) => "DOUBLE_LONG",
            DataObject::Integer64(_) => "LONG64",
            DataObject::Unsigned8(_) => "UNSIGNED",
            DataObject::Unsigned16(_) => "LONG_UNSIGNED",
            DataObject::Unsigned32(_) => "DOUBLE_LONG_UNSIGNED",
            DataObject::Unsigned64(_) => "LONG64_UNSIGNED",
            DataObject::Float32(_) => "FLOAT32",
            DataObject::Float64(_) => "FLOAT64",
            DataObject::Enumerate(_) => "ENUM",
            DataObject::Bcd(_) => "BCD",
            DataObject::OctetString(_) => "OCTET_STRING",
            DataObject::VisibleString(_) => "VISIBLE_STRING",
            DataObject::Utf8String(_) => "UTF8_STRING",
            DataObject::BitString { .. } => "BIT_STRING",
            DataObject::Array(_) => "ARRAY",
            DataObject::Structure(_) => "STRUCTURE",
            DataObject::Date(_) => "DATE",
            DataObject::Time(_) => "TIME",
            DataObject::DateTime(_) => "DATE_TIME",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataObject::Null)
    }

    /// Numeric value of numbers and booleans
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            DataObject::Boolean(b) => f64::from(u8::from(*b)),
            DataObject::Integer8(i) => f64::from(*i),
            DataObject::Integer16(i) => f64::from(*i),
            DataObject::Integer32(i) => f64::from(*i),
            DataObject::Integer64(i) => *i as f64,
            DataObject::Unsigned8(u) | DataObject::Enumerate(u) | DataObject::Bcd(u) => {
                f64::from(*u)
            }
            DataObject::Unsigned16(u) => f64::from(*u),
            DataObject::Unsigned32(u) => f64::from(*u),
            DataObject::Unsigned64(u) => *u as f64,
            DataObject::Float32(f) => f64::from(*f),
            DataObject::Float64(f) => *f,
            _ => return None,
        };
        Some(value)
    }

    /// Integer value of any integral type that fits into `u64`
    pub fn as_u64(&self) -> DlmsResult<u64> {
        let value = match self {
            DataObject::Integer8(i) => u64::try_from(*i).ok(),
            DataObject::Integer16(i) => u64::try_from(*i).ok(),
            DataObject::Integer32(i) => u64::try_from(*i).ok(),
            DataObject::Integer64(i) => u64::try_from(*i).ok(),
            DataObject::Unsigned8(u) | DataObject::Enumerate(u) => Some(u64::from(*u)),
            DataObject::Unsigned16(u) => Some(u64::from(*u)),
            DataObject::Unsigned32(u) => Some(u64::from(*u)),
            DataObject::Unsigned64(u) => Some(*u),
            _ => None,
        };
        value.ok_or_else(|| {
            DlmsError::InvalidData(format!("Expected unsigned integer, got {}", self))
        })
    }

    /// Raw bytes of octet, visible, UTF-8 and bit strings
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DataObject::OctetString(s)
            | DataObject::VisibleString(s)
            | DataObject::Utf8String(s)
            | DataObject::BitString { bytes: s, .. } => Some(s),
            _ => None,
        }
    }

    pub fn as_octet_string(&self) -> DlmsResult<&[u8]> {
        match self {
            DataObject::OctetString(s) => Ok(s),
            other => Err(other.unexpected("OCTET_STRING")),
        }
    }

    pub fn as_array(&self) -> DlmsResult<&[DataObject]> {
        match self {
            DataObject::Array(items) => Ok(items),
            other => Err(other.unexpected("ARRAY")),
        }
    }

    pub fn as_structure(&self) -> DlmsResult<&[DataObject]> {
        match self {
            DataObject::Structure(items) => Ok(items),
            other => Err(other.unexpected("STRUCTURE")),
        }
    }

    fn unexpected(&self, expected: &str) -> DlmsError {
        DlmsError::InvalidData(format!("Expected {}, got {}", expected, self.type_name()))
    }
}

impl fmt::Display for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())?;
        match self {
            DataObject::Null => Ok(()),
            DataObject::Boolean(b) => write!(f, ": {}", b),
            DataObject::Integer8(i) => write!(f, ": {}", i),
            DataObject::Integer16(i) => write!(f, ": {}", i),
            DataObject::Integer32(i) => write!(f, ": {}", i),
            DataObject::Integer64(i) => write!(f, ": {}", i),
            DataObject::Unsigned8(u) | DataObject::Enumerate(u) | DataObject::Bcd(u) => {
                write!(f, ": {}", u)
            }
            DataObject::Unsigned16(u) => write!(f, ": {}", u),
            DataObject::Unsigned32(u) => write!(f, ": {}", u),
            DataObject::Unsigned64(u) => write!(f, ": {}", u),
            DataObject::Float32(v) => write!(f, ": {}", v),
            DataObject::Float64(v) => write!(f, ": {}", v),
            DataObject::OctetString(bytes) => write!(f, ": {}", hex::encode_upper(bytes)),
            DataObject::VisibleString(s) | DataObject::Utf8String(s) => {
                write!(f, ": {}", String::from_utf8_lossy(s))
            }
            DataObject::BitString { bytes, num_bits } => {
                write!(f, "({}): {}", num_bits, hex::encode_upper(bytes))
            }
            DataObject::Array(items) | DataObject::Structure(items) => {
                write!(f, ": {} element(s)", items.len())?;
                for (i, item) in items.iter().enumerate() {
                    write!(f, "\n  [{}]: {}", i, item)?;
                }
                Ok(())
            }
            DataObject::Date(d) => write!(f, ": {}", d),
            DataObject::Time(t) => write!(f, ": {}", t),
            DataObject::DateTime(dt) => write!(f, ": {}", dt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values() {
        assert_eq!(DataObject::Integer16(-5).as_f64(), Some(-5.0));
        assert_eq!(DataObject::Unsigned32(1234).as_f64(), Some(1234.0));
        assert_eq!(DataObject::Float32(1.5).as_f64(), Some(1.5));
        assert_eq!(DataObject::Boolean(true).as_f64(), Some(1.0));
        assert_eq!(DataObject::Null.as_f64(), None);
    }

    #[test]
    fn test_as_u64() {
        assert_eq!(DataObject::Unsigned16(96).as_u64().unwrap(), 96);
        assert!(DataObject::Integer8(-1).as_u64().is_err());
        assert!(DataObject::OctetString(vec![1]).as_u64().is_err());
    }

    #[test]
    fn test_byte_strings() {
        let bits = DataObject::BitString { bytes: vec![0xA0], num_bits: 3 };
        assert_eq!(bits.as_bytes(), Some(&[0xA0][..]));
        assert_eq!(bits.to_string(), "BIT_STRING(3): A0");
        assert_eq!(DataObject::OctetString(vec![0x01, 0xFF]).to_string(), "OCTET_STRING: 01FF");

        let err = DataObject::VisibleString(b"abc".to_vec()).as_octet_string().unwrap_err();
        assert!(err.to_string().contains("VISIBLE_STRING"));
    }

    #[test]
    fn test_structure() {
        let obj = DataObject::Structure(vec![DataObject::Unsigned8(1), DataObject::Null]);
        assert_eq!(obj.as_structure().unwrap().len(), 2);
        assert!(obj.as_array().is_err());
        assert_eq!(obj.to_string(), "STRUCTURE: 2 element(s)\n  [0]: UNSIGNED: 1\n  [1]: NULL_DATA");
    }
}
