//! References to COSEM objects on a meter

use crate::obis_code::ObisCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Interface class ids used by profile reading
pub mod class_id {
    pub const DATA: u16 = 1;
    pub const REGISTER: u16 = 3;
    pub const EXTENDED_REGISTER: u16 = 4;
    pub const PROFILE_GENERIC: u16 = 7;
    pub const CLOCK: u16 = 8;
}

/// Address of a COSEM object on the meter
///
/// Logical-name referencing uses `logical_name`; short-name referencing
/// uses `short_name` when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CosemObjectRef {
    pub class_id: u16,
    pub logical_name: ObisCode,
    #[serde(default)]
    pub short_name: Option<u16>,
}

impl CosemObjectRef {
    pub fn new(class_id: u16, logical_name: ObisCode) -> Self {
        Self {
            class_id,
            logical_name,
            short_name: None,
        }
    }

    pub fn with_short_name(mut self, short_name: u16) -> Self {
        self.short_name = Some(short_name);
        self
    }

    /// Profile Generic object with the given logical name
    pub fn profile(logical_name: ObisCode) -> Self {
        Self::new(class_id::PROFILE_GENERIC, logical_name)
    }

    /// Clock object with the given logical name
    pub fn clock(logical_name: ObisCode) -> Self {
        Self::new(class_id::CLOCK, logical_name)
    }
}

impl fmt::Display for CosemObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.short_name {
            Some(sn) => write!(f, "{}/{} (sn {:#06X})", self.class_id, self.logical_name, sn),
            None => write!(f, "{}/{}", self.class_id, self.logical_name),
        }
    }
}

/// One entry of a Profile Generic capture-objects list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureObject {
    pub class_id: u16,
    pub logical_name: ObisCode,
    pub attribute_index: i8,
    pub data_index: u16,
}

impl CaptureObject {
    pub fn new(class_id: u16, logical_name: ObisCode, attribute_index: i8) -> Self {
        Self {
            class_id,
            logical_name,
            attribute_index,
            data_index: 0,
        }
    }

    /// Whether this column holds the time attribute of a Clock object
    pub fn is_clock_time(&self) -> bool {
        self.class_id == class_id::CLOCK && self.attribute_index == 2
    }

    pub fn object(&self) -> CosemObjectRef {
        CosemObjectRef::new(self.class_id, self.logical_name)
    }
}

impl fmt::Display for CaptureObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.logical_name, self.attribute_index)
    }
}
