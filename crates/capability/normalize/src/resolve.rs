use crate::NormalizeError;
use domain::{DeviceSnapshot, EntityDescriptor};
use std::collections::HashMap;

/// 单台设备的实体映射（key → EntityDescriptor），连接时构建一次。
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    entries: HashMap<u32, EntityDescriptor>,
}

impl EntityMap {
    /// 由实体列表构建映射；重复 key 以后出现者为准。
    pub fn from_entities<I>(entities: I) -> Self
    where
        I: IntoIterator<Item = EntityDescriptor>,
    {
        let entries = entities
            .into_iter()
            .map(|entity| (entity.key, entity))
            .collect();
        Self { entries }
    }

    pub fn from_snapshot(snapshot: &DeviceSnapshot) -> Self {
        Self::from_entities(snapshot.entities.iter().cloned())
    }

    /// 按 key 查找实体描述。
    pub fn resolve(&self, key: u32) -> Result<&EntityDescriptor, NormalizeError> {
        self.entries
            .get(&key)
            .ok_or(NormalizeError::UnknownEntity { key })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
