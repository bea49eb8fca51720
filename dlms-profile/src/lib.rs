//! Profile Generic (class 7) data handling
//!
//! Turns the capture-objects attribute of a profile into a
//! [`CaptureLayout`], its buffer into [`RawRow`]s, and rows into
//! timestamped [`Reading`]s with the converter picked by [`DeviceFamily`].

pub mod capture;
pub mod converter;
pub mod family;
pub mod profile_generic;
pub mod reading;
pub mod row;
pub mod timestamp;

pub use capture::CaptureLayout;
pub use converter::{Converter, InferenceConverter, PositionalConverter};
pub use family::DeviceFamily;
pub use profile_generic::ProfileEntries;
pub use reading::{Conversion, Reading, SkippedRow, TimestampSource};
pub use row::{rows_from_buffer, RawRow};
pub use timestamp::{next_slot, resolve, round15};
