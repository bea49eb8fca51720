//! Device families and their conversion policy

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Meter family, selecting how profile rows are timestamped
///
/// Parsed from the producer name of the meter. Producers without a
/// dedicated policy fall back to [`DeviceFamily::Generic`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceFamily {
    /// Timestamp read from the Clock column
    #[default]
    Generic,
    /// Timestamp in one of two structured columns, inferred when absent
    Itron,
}

impl DeviceFamily {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceFamily::Generic => "GENERIC",
            DeviceFamily::Itron => "ITRON",
        }
    }

    /// Whether rows of this family may lack a usable timestamp
    pub fn infers_timestamps(&self) -> bool {
        matches!(self, DeviceFamily::Itron)
    }
}

impl FromStr for DeviceFamily {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "ITRON" => DeviceFamily::Itron,
            _ => DeviceFamily::Generic,
        })
    }
}

impl From<String> for DeviceFamily {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(family) => family,
            Err(never) => match never {},
        }
    }
}

impl From<DeviceFamily> for String {
    fn from(value: DeviceFamily) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_producer() {
        assert_eq!("ITRON".parse::<DeviceFamily>(), Ok(DeviceFamily::Itron));
        assert_eq!(" itron ".parse::<DeviceFamily>(), Ok(DeviceFamily::Itron));
        assert_eq!("LANDIS".parse::<DeviceFamily>(), Ok(DeviceFamily::Generic));
        assert_eq!("".parse::<DeviceFamily>(), Ok(DeviceFamily::Generic));
    }

    #[test]
    fn test_serde() {
        let family: DeviceFamily = serde_json::from_str("\"Itron\"").unwrap();
        assert_eq!(family, DeviceFamily::Itron);
        assert_eq!(serde_json::to_string(&family).unwrap(), "\"ITRON\"");
        assert!(family.infers_timestamps());
    }
}
