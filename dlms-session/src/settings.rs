//! Session-level settings shared by the engine and the codec

use dlms_core::DlmsError;
use dlms_transport::ReceiveParameters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// HDLC frame flag, also the end-of-packet marker
pub const HDLC_FLAG: u8 = 0x7E;

/// Smallest buffer that can hold an HDLC frame
const HDLC_MIN_FRAME: usize = 5;

/// Framing used on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfaceType {
    /// HDLC frames delimited by `0x7E`
    #[default]
    Hdlc,
    /// IP wrapper with an 8-byte header and no terminator
    Wrapper,
}

impl InterfaceType {
    /// Receive parameters for the next fragment
    ///
    /// `expected` is the codec's estimate of the remaining byte count and is
    /// only used for interfaces without an end-of-packet marker.
    pub fn receive_parameters(&self, buffered: usize, expected: usize) -> ReceiveParameters {
        match self {
            InterfaceType::Hdlc => {
                let count = if buffered == 0 { HDLC_MIN_FRAME } else { 1 };
                ReceiveParameters::until_marker(HDLC_FLAG, count)
            }
            InterfaceType::Wrapper => ReceiveParameters::exact(expected.max(1)),
        }
    }
}

impl FromStr for InterfaceType {
    type Err = DlmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HDLC" => Ok(InterfaceType::Hdlc),
            "WRAPPER" => Ok(InterfaceType::Wrapper),
            other => Err(DlmsError::InvalidData(format!("Unknown interface type: {}", other))),
        }
    }
}

/// Authentication level of the association
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authentication {
    #[default]
    None,
    Low,
    High,
    HighMd5,
    HighSha1,
    HighGmac,
    HighSha256,
    HighEcdsa,
}

impl Authentication {
    /// High level security needs an extra challenge/response round
    pub fn is_high_level(&self) -> bool {
        *self > Authentication::Low
    }
}

impl FromStr for Authentication {
    type Err = DlmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "NONE" => Authentication::None,
            "LOW" => Authentication::Low,
            "HIGH" => Authentication::High,
            "HIGH_MD5" => Authentication::HighMd5,
            "HIGH_SHA1" => Authentication::HighSha1,
            "HIGH_GMAC" => Authentication::HighGmac,
            "HIGH_SHA256" => Authentication::HighSha256,
            "HIGH_ECDSA" => Authentication::HighEcdsa,
            other => {
                return Err(DlmsError::InvalidData(format!(
                    "Unknown authentication level: {}",
                    other
                )))
            }
        };
        Ok(level)
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Authentication::None => "NONE",
            Authentication::Low => "LOW",
            Authentication::High => "HIGH",
            Authentication::HighMd5 => "HIGH_MD5",
            Authentication::HighSha1 => "HIGH_SHA1",
            Authentication::HighGmac => "HIGH_GMAC",
            Authentication::HighSha256 => "HIGH_SHA256",
            Authentication::HighEcdsa => "HIGH_ECDSA",
        };
        f.write_str(name)
    }
}

/// Retry and timing policy of the exchange engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    /// Deadline of one physical receive
    #[serde(with = "duration_ms", rename = "receive_timeout_ms")]
    pub receive_timeout: Duration,
    /// Resends of the same frame after a timeout or malformed reply
    pub max_retries: u32,
    /// Wait before resending to a busy device
    #[serde(with = "duration_ms", rename = "busy_backoff_ms")]
    pub busy_backoff: Duration,
    /// Busy answers tolerated per exchange
    pub max_busy_retries: u32,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_secs(5),
            max_retries: 3,
            busy_backoff: Duration::from_secs(1),
            max_busy_retries: 3,
        }
    }
}

/// Association parameters a codec must apply before connecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecSettings {
    pub client_address: u16,
    /// Combined logical and physical server address
    pub server_address: u32,
    pub authentication: Authentication,
    pub interface_type: InterfaceType,
    pub use_logical_name_referencing: bool,
}

/// Serde helper storing a `Duration` as whole milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
