use crate::error::{DlmsError, DlmsResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// `A.B.C.D.E.F`, or `A-B:C.D.E` with an optional `*F` / `&F`
static OBIS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})",
        r"|(\d{1,3})-(\d{1,3}):(\d{1,3})\.(\d{1,3})\.(\d{1,3})(?:[*&](\d{1,3}))?)$",
    ))
    .expect("static OBIS pattern is valid")
});

/// OBIS code, the 6-byte logical name of a COSEM object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    /// Logical name of the standard Clock object
    pub const CLOCK: ObisCode = ObisCode::new(0, 0, 1, 0, 0, 255);

    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }

    /// Logical name as carried in a capture object definition
    pub fn from_bytes(bytes: &[u8]) -> DlmsResult<Self> {
        let bytes: [u8; 6] = bytes.try_into().map_err(|_| {
            DlmsError::InvalidData(format!("Logical name must be 6 bytes, got {}", bytes.len()))
        })?;
        Ok(Self { bytes })
    }

    /// Parse `1.0.1.8.0.255` or `1-0:1.8.0*255`
    ///
    /// A missing F group of the second form reads as 255.
    pub fn from_string(s: &str) -> DlmsResult<Self> {
        let s = s.trim();
        let invalid = || DlmsError::InvalidData(format!("Invalid OBIS code format: {}", s));
        let captures = OBIS_PATTERN.captures(s).ok_or_else(invalid)?;

        // Groups 1-6 hold the dotted form, 7-12 the A-B:C.D.E*F form
        let first = if captures.get(1).is_some() { 1 } else { 7 };
        let mut bytes = [255u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            if let Some(group) = captures.get(first + i) {
                *byte = group.as_str().parse().map_err(|_| invalid())?;
            }
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }
}

impl FromStr for ObisCode {
    type Err = DlmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, last] = self.bytes;
        write!(f, "{}.{}.{}.{}.{}.{}", a, b, c, d, e, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_format() {
        let code = ObisCode::from_string(" 1.1.1.8.0.255 ").unwrap();
        assert_eq!(code, ObisCode::new(1, 1, 1, 8, 0, 255));
        assert_eq!(code.as_bytes(), &[1, 1, 1, 8, 0, 255]);
    }

    #[test]
    fn test_extended_format() {
        assert_eq!(
            ObisCode::from_string("1-0:1.8.0*255").unwrap(),
            ObisCode::new(1, 0, 1, 8, 0, 255)
        );
        assert_eq!(
            "1-0:99.1.0".parse::<ObisCode>().unwrap(),
            ObisCode::new(1, 0, 99, 1, 0, 255)
        );
        assert_eq!("0-0:1.0.0&0".parse::<ObisCode>().unwrap(), ObisCode::new(0, 0, 1, 0, 0, 0));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(ObisCode::from_string("1.0.1.8.0").is_err());
        assert!(ObisCode::from_string("1.0.1.8.0.256").is_err());
        assert!(ObisCode::from_string("1-0:1.8.0*256").is_err());
        assert!(ObisCode::from_string("clock").is_err());
        assert!(ObisCode::from_bytes(&[0, 0, 1]).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ObisCode::new(1, 1, 1, 8, 0, 255).to_string(), "1.1.1.8.0.255");
        assert_eq!(ObisCode::CLOCK.to_string(), "0.0.1.0.0.255");
    }
}
