//! 实体标识解析与行记录编码。
//!
//! ```text
//! DeviceSnapshot ──> EntityMap (key → EntityDescriptor)
//!                          │
//! MeasurementEvent ────────┴──> encode_event ──> EncodedRecord
//! ```

mod encode;
mod resolve;

pub use encode::{encode_event, encode_record, escape_identifier, format_state_value};
pub use resolve::EntityMap;

/// 规范化错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("unknown entity key: {key}")]
    UnknownEntity { key: u32 },
}
