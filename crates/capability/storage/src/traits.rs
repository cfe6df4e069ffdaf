//! 存储接口 Trait 定义

use crate::error::StorageError;
use async_trait::async_trait;
use domain::EncodedRecord;

/// 行记录写入接口
///
/// 由唯一的 Sink Writer 持有；调用顺序为 ensure → select → write_batch*。
#[async_trait]
pub trait LineWriter: Send + Sync {
    /// 确保目标数据库存在（已存在时不报错）
    async fn ensure_database(&self, name: &str) -> Result<(), StorageError>;

    /// 选择后续写入的目标数据库
    async fn select_database(&self, name: &str) -> Result<(), StorageError>;

    /// 一次调用写入整批记录
    async fn write_batch(&self, records: &[EncodedRecord]) -> Result<(), StorageError>;
}
