use std::fmt;
use thiserror::Error;

/// Error codes a device can return in a reply
///
/// `Rejected` is the "busy" answer: the device refused the frame but
/// may accept the same request a moment later. Every other non-zero code
/// is terminal for the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DisconnectMode,
    ReceiveNotReady,
    Rejected,
    UnacceptableFrame,
    HardwareFault,
    TemporaryFailure,
    ReadWriteDenied,
    UndefinedObject,
    InconsistentClass,
    UnavailableObject,
    UnmatchedType,
    AccessViolated,
    DataBlockUnavailable,
    LongGetOrReadAborted,
    NoLongGetOrReadInProgress,
    LongSetOrWriteAborted,
    NoLongSetOrWriteInProgress,
    DataBlockNumberInvalid,
    OtherReason,
    Unknown(i16),
}

impl ErrorCode {
    /// Map a raw reply error value to a code
    ///
    /// Returns `None` for `0`, which means success.
    pub fn from_raw(value: i16) -> Option<Self> {
        let code = match value {
            0 => return None,
            -4 => ErrorCode::DisconnectMode,
            -3 => ErrorCode::ReceiveNotReady,
            -2 => ErrorCode::Rejected,
            -1 => ErrorCode::UnacceptableFrame,
            1 => ErrorCode::HardwareFault,
            2 => ErrorCode::TemporaryFailure,
            3 => ErrorCode::ReadWriteDenied,
            4 => ErrorCode::UndefinedObject,
            9 => ErrorCode::InconsistentClass,
            11 => ErrorCode::UnavailableObject,
            12 => ErrorCode::UnmatchedType,
            13 => ErrorCode::AccessViolated,
            14 => ErrorCode::DataBlockUnavailable,
            15 => ErrorCode::LongGetOrReadAborted,
            16 => ErrorCode::NoLongGetOrReadInProgress,
            17 => ErrorCode::LongSetOrWriteAborted,
            18 => ErrorCode::NoLongSetOrWriteInProgress,
            19 => ErrorCode::DataBlockNumberInvalid,
            250 => ErrorCode::OtherReason,
            other => ErrorCode::Unknown(other),
        };
        Some(code)
    }

    /// Raw value as carried in the reply
    pub fn raw(&self) -> i16 {
        match self {
            ErrorCode::DisconnectMode => -4,
            ErrorCode::ReceiveNotReady => -3,
            ErrorCode::Rejected => -2,
            ErrorCode::UnacceptableFrame => -1,
            ErrorCode::HardwareFault => 1,
            ErrorCode::TemporaryFailure => 2,
            ErrorCode::ReadWriteDenied => 3,
            ErrorCode::UndefinedObject => 4,
            ErrorCode::InconsistentClass => 9,
            ErrorCode::UnavailableObject => 11,
            ErrorCode::UnmatchedType => 12,
            ErrorCode::AccessViolated => 13,
            ErrorCode::DataBlockUnavailable => 14,
            ErrorCode::LongGetOrReadAborted => 15,
            ErrorCode::NoLongGetOrReadInProgress => 16,
            ErrorCode::LongSetOrWriteAborted => 17,
            ErrorCode::NoLongSetOrWriteInProgress => 18,
            ErrorCode::DataBlockNumberInvalid => 19,
            ErrorCode::OtherReason => 250,
            ErrorCode::Unknown(value) => *value,
        }
    }

    /// Whether the device only signalled that it is busy
    pub fn is_busy(&self) -> bool {
        matches!(self, ErrorCode::Rejected)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Unknown(value) => write!(f, "unknown error code {}", value),
            other => write!(f, "{:?} ({})", other, other.raw()),
        }
    }
}

/// Main error type for DLMS profile reading
#[derive(Error, Debug)]
pub enum DlmsError {
    /// I/O failure on the underlying connection
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// A single physical receive did not complete in time
    #[error("Timeout")]
    Timeout,

    /// The device stayed silent across every resend of a frame
    #[error("Failed to receive reply from the device in given time ({attempts} attempts)")]
    ExchangeTimeout { attempts: u32 },

    /// The device answered with an error code
    #[error("Device protocol error: {0}")]
    DeviceProtocol(ErrorCode),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Reply bytes could not be parsed; retried inside the exchange
    #[error("Frame invalid: {0}")]
    FrameInvalid(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The capture objects of a profile could not be read or parsed
    #[error("Capture layout could not be resolved: {0}")]
    LayoutResolution(String),

    /// One profile row could not be turned into a reading
    #[error("Row {row} could not be converted: {reason}")]
    Conversion { row: usize, reason: String },

    /// A row needed the previous timestamp but none was seeded
    #[error("Row {row} needs a previous timestamp but no seed was provided")]
    MissingTimestampSeed { row: usize },
}

impl DlmsError {
    /// Transport-level failures: I/O errors and receive timeouts
    pub fn is_transport(&self) -> bool {
        matches!(self, DlmsError::Connection(_) | DlmsError::Timeout)
    }

    /// Failures the exchange engine answers with a resend
    pub fn is_retryable(&self) -> bool {
        matches!(self, DlmsError::Timeout | DlmsError::FrameInvalid(_))
    }

    /// The device error code, if this is a device protocol error
    pub fn device_code(&self) -> Option<ErrorCode> {
        match self {
            DlmsError::DeviceProtocol(code) => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for DLMS operations
pub type DlmsResult<T> = Result<T, DlmsError>;
