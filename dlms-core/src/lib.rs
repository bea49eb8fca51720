//! Core types and utilities for DLMS/COSEM profile reading
//!
//! This crate provides the error taxonomy, OBIS codes, COSEM date/time
//! types, decoded values and object references shared by the other
//! `dlms-*` crates.

pub mod error;
pub mod obis_code;
pub mod object;
pub mod datatypes;

pub use error::{DlmsError, DlmsResult, ErrorCode};
pub use obis_code::ObisCode;
pub use object::{CaptureObject, CosemObjectRef};
pub use datatypes::*;
