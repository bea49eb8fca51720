//! Transport layer module for DLMS/COSEM protocol
//!
//! This crate provides the byte-oriented connection used by the exchange
//! engine, with TCP, serial and replay implementations.

pub mod stream;
pub mod tcp;
pub mod serial;
pub mod replay;

pub use dlms_core::{DlmsError, DlmsResult};
pub use stream::{ReceiveParameters, StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
pub use serial::{SerialSettings, SerialTransport};
pub use replay::{ReplayHandle, ReplayStep, ReplayTransport};
