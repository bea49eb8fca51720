//! Profile Generic interface class (Class ID: 7)
//!
//! Only the attributes needed to read a load profile are listed here.
//!
//! # Attributes
//!
//! - Attribute 1: logical_name (OBIS code) - The logical name of the object
//! - Attribute 2: buffer - The profile buffer (array of data records)
//! - Attribute 3: capture_objects - Column definitions of the buffer
//! - Attribute 4: capture_period - Period in seconds between captures (0 = on demand)
//! - Attribute 5: sort_method - Sort method for the buffer
//! - Attribute 6: sort_object - Object used for sorting
//! - Attribute 7: entries_in_use - Number of entries currently in use
//! - Attribute 8: profile_entries - Capacity of the buffer

use dlms_core::{DataObject, DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute indices of the Profile Generic class
pub mod attribute {
    pub const LOGICAL_NAME: i8 = 1;
    pub const BUFFER: i8 = 2;
    pub const CAPTURE_OBJECTS: i8 = 3;
    pub const CAPTURE_PERIOD: i8 = 4;
    pub const SORT_METHOD: i8 = 5;
    pub const SORT_OBJECT: i8 = 6;
    pub const ENTRIES_IN_USE: i8 = 7;
    pub const PROFILE_ENTRIES: i8 = 8;
}

/// Fill level of a profile buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntries {
    pub entries_in_use: u32,
    pub profile_entries: u32,
}

impl ProfileEntries {
    /// Build from the decoded values of attributes 7 and 8
    pub fn from_values(entries_in_use: &DataObject, profile_entries: &DataObject) -> DlmsResult<Self> {
        Ok(Self {
            entries_in_use: to_u32(entries_in_use, "entries_in_use")?,
            profile_entries: to_u32(profile_entries, "profile_entries")?,
        })
    }

    pub fn is_full(&self) -> bool {
        self.profile_entries > 0 && self.entries_in_use >= self.profile_entries
    }
}

fn to_u32(value: &DataObject, name: &str) -> DlmsResult<u32> {
    let raw = value.as_u64()?;
    u32::try_from(raw).map_err(|_| DlmsError::InvalidData(format!("{} out of range: {}", name, raw)))
}

impl fmt::Display for ProfileEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entries_in_use, self.profile_entries)
    }
}
