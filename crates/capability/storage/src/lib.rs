//! # 存储模块
//!
//! 行记录的写入抽象与实现。
//!
//! 1. **接口抽象层** (`traits.rs`)：`LineWriter`（建库、选库、批量写入）
//! 2. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 3. **实现层**：
//!    - `influx.rs`：InfluxDB 1.x HTTP API（生产环境使用）
//!    - `in_memory.rs`：内存实现（测试与演示）
//!
//! ```rust,ignore
//! use relay_storage::{InfluxClient, LineWriter};
//!
//! let client = InfluxClient::new("localhost", 8086)?;
//! client.ensure_database("esphome").await?;
//! client.select_database("esphome").await?;
//! client.write_batch(&records).await?;
//! ```

pub mod error;
pub mod in_memory;
pub mod influx;
pub mod traits;

pub use error::*;
pub use in_memory::InMemoryLineStore;
pub use influx::InfluxClient;
pub use traits::*;
