//! DLMS/COSEM profile reading client
//!
//! This crate runs a complete load-profile read against one meter:
//! association, capture layout, range read, conversion to readings and
//! disconnect. Frames are built and parsed by a caller supplied
//! [`dlms_session::FrameCodec`].

pub mod builder;
pub mod config;
pub mod reader;

pub use builder::ProfileReaderBuilder;
pub use config::{MeterParams, ProfileRequest, ReaderConfig, DEFAULT_PORT};
pub use reader::{ProfileReader, ProfileReadout};
