//! Reader configuration
//!
//! [`MeterParams`] is the flat parameter set of one profile read, as it
//! arrives from a caller or a JSON file. [`MeterParams::validate`] turns it
//! into a typed [`ProfileRequest`] and a [`ReaderConfig`].

use chrono::NaiveDateTime;
use dlms_core::{CosemObjectRef, DlmsError, DlmsResult, ObisCode};
use dlms_profile::DeviceFamily;
use dlms_session::{Authentication, CodecSettings, ExchangeSettings, InterfaceType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default DLMS port of the IP profile
pub const DEFAULT_PORT: u16 = 4059;

/// Parameters of one profile read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterParams {
    /// Producer name, selects the conversion policy
    pub meter_producer: DeviceFamily,
    pub host_name: String,
    pub port: u16,
    pub client_address: u16,
    pub logical_address: u16,
    pub physical_address: u16,
    #[serde(alias = "authentication_str")]
    pub authentication: Authentication,
    pub use_logical_name_referencing: bool,
    pub interface_type: InterfaceType,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub clock_obis: String,
    pub clock_short_name: Option<u16>,
    #[serde(alias = "profile_to_read_ln")]
    pub profile_obis: String,
    #[serde(alias = "profile_to_read_sn")]
    pub profile_short_name: Option<u16>,
    #[serde(alias = "fields_of_profile_ln")]
    pub fields: Vec<String>,
    pub exchange: ExchangeSettings,
    /// Overall limit for reading the layout and the rows
    pub deadline_ms: Option<u64>,
}

impl Default for MeterParams {
    fn default() -> Self {
        Self {
            meter_producer: DeviceFamily::Generic,
            host_name: String::new(),
            port: DEFAULT_PORT,
            client_address: 0x10,
            logical_address: 1,
            physical_address: 0,
            authentication: Authentication::None,
            use_logical_name_referencing: true,
            interface_type: InterfaceType::Hdlc,
            from: NaiveDateTime::default(),
            to: NaiveDateTime::default(),
            clock_obis: ObisCode::CLOCK.to_string(),
            clock_short_name: None,
            profile_obis: String::new(),
            profile_short_name: None,
            fields: Vec::new(),
            exchange: ExchangeSettings::default(),
            deadline_ms: None,
        }
    }
}

impl MeterParams {
    /// Load parameters from a JSON document
    pub fn from_json(json: &str) -> DlmsResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DlmsError::InvalidData(format!("Invalid meter parameters: {}", e)))
    }

    /// `host:port` of the meter
    pub fn address(&self) -> String {
        format!("{}:{}", self.host_name, self.port)
    }

    /// Combined server address of the logical and physical device
    ///
    /// One-byte parts are packed as `logical << 7 | physical`, larger ones
    /// as `logical << 14 | physical`.
    pub fn server_address(&self) -> u32 {
        let logical = u32::from(self.logical_address);
        let physical = u32::from(self.physical_address);
        if logical < 0x80 && physical < 0x80 {
            logical << 7 | physical
        } else {
            logical << 14 | physical
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Addressing, authentication and referencing for the frame codec
    pub fn codec_settings(&self) -> CodecSettings {
        CodecSettings {
            client_address: self.client_address,
            server_address: self.server_address(),
            authentication: self.authentication,
            interface_type: self.interface_type,
            use_logical_name_referencing: self.use_logical_name_referencing,
        }
    }

    /// Settings of the reader for these parameters
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            meter: self.address(),
            exchange: self.exchange.clone(),
            deadline: self.deadline(),
        }
    }

    /// Check the parameters and resolve every OBIS code
    pub fn validate(&self) -> DlmsResult<ProfileRequest> {
        if self.host_name.trim().is_empty() {
            return Err(DlmsError::InvalidData("host_name must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(DlmsError::InvalidData("port must not be 0".to_string()));
        }
        if self.from >= self.to {
            return Err(DlmsError::InvalidData(format!(
                "from ({}) must be before to ({})",
                self.from, self.to
            )));
        }

        let mut profile = CosemObjectRef::profile(parse_obis("profile_obis", &self.profile_obis)?);
        let mut clock = CosemObjectRef::clock(parse_obis("clock_obis", &self.clock_obis)?);
        if !self.use_logical_name_referencing {
            profile = profile.with_short_name(require_short_name("profile_short_name", self.profile_short_name)?);
            clock = clock.with_short_name(require_short_name("clock_short_name", self.clock_short_name)?);
        }
        let fields = self
            .fields
            .iter()
            .map(|field| parse_obis("fields", field))
            .collect::<DlmsResult<Vec<_>>>()?;

        Ok(ProfileRequest {
            profile,
            clock,
            fields,
            from: self.from,
            to: self.to,
            family: self.meter_producer,
        })
    }
}

fn parse_obis(name: &str, value: &str) -> DlmsResult<ObisCode> {
    ObisCode::from_string(value)
        .map_err(|e| DlmsError::InvalidData(format!("{} '{}': {}", name, value, e)))
}

fn require_short_name(name: &str, value: Option<u16>) -> DlmsResult<u16> {
    value.ok_or_else(|| {
        DlmsError::InvalidData(format!("{} is required for short name referencing", name))
    })
}

/// Validated profile read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRequest {
    pub profile: CosemObjectRef,
    /// Clock object used as sort object of the range read
    pub clock: CosemObjectRef,
    /// Columns to extract, in output order
    pub fields: Vec<ObisCode>,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub family: DeviceFamily,
}

/// Runtime settings of a [`crate::ProfileReader`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Meter label used in log lines
    pub meter: String,
    pub exchange: ExchangeSettings,
    /// Overall limit for the layout, range read and conversion phases
    pub deadline: Option<Duration>,
}
