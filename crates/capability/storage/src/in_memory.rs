//! 行记录内存实现
//!
//! 仅用于本地测试和演示。

use crate::error::StorageError;
use crate::traits::LineWriter;
use async_trait::async_trait;
use domain::EncodedRecord;
use std::collections::BTreeSet;
use std::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    databases: BTreeSet<String>,
    selected: Option<String>,
    batches: Vec<Vec<EncodedRecord>>,
}

/// 行记录内存存储
#[derive(Default)]
pub struct InMemoryLineStore {
    state: RwLock<MemoryState>,
}

impl InMemoryLineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的批次（按写入顺序）
    pub fn batches(&self) -> Vec<Vec<EncodedRecord>> {
        self.state
            .read()
            .map(|state| state.batches.clone())
            .unwrap_or_default()
    }

    /// 当前选中的数据库
    pub fn selected_database(&self) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.selected.clone())
    }

    /// 已创建的数据库
    pub fn databases(&self) -> Vec<String> {
        self.state
            .read()
            .map(|state| state.databases.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LineWriter for InMemoryLineStore {
    async fn ensure_database(&self, name: &str) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        state.databases.insert(name.to_string());
        Ok(())
    }

    async fn select_database(&self, name: &str) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if !state.databases.contains(name) {
            return Err(StorageError::new(format!("database not found: {name}")));
        }
        state.selected = Some(name.to_string());
        Ok(())
    }

    async fn write_batch(&self, records: &[EncodedRecord]) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if state.selected.is_none() {
            return Err(StorageError::new("no database selected"));
        }
        state.batches.push(records.to_vec());
        Ok(())
    }
}
