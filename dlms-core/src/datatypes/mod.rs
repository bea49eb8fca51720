//! Data types used in DLMS/COSEM protocol

pub mod cell;
pub mod data_object;
pub mod cosem_date;
pub mod cosem_time;
pub mod cosem_date_time;

// Re-export types
pub use cell::Cell;
pub use cosem_date::{CosemDate, CosemDateFormat};
pub use cosem_time::CosemTime;
pub use cosem_date_time::{ClockStatus, CosemDateTime, DEVIATION_NOT_SPECIFIED};
pub use data_object::DataObject;
