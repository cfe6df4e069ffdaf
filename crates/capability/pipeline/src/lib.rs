//! 转发流水线：每台设备一个编码阶段，全局一个批量写入器。
//!
//! ```text
//! snapshot (oneshot) ─┐
//!                     ├─> EncodingStage ──┐
//! events (mpsc) ──────┘                   ├─> records (mpsc) ─> SinkWriter ─> LineWriter
//!             ... 其他设备的 EncodingStage ┘
//! ```

mod sink;
mod stage;

pub use sink::SinkWriter;
pub use stage::EncodingStage;

use relay_normalize::NormalizeError;

/// Pipeline 处理错误。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("metadata channel closed before snapshot: {0}")]
    MetadataUnavailable(String),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("sink channel closed")]
    SinkClosed,
    #[error("writer error: {0}")]
    Writer(String),
}
