/// 设备标识（连接后一次性获取，之后不变）。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    pub name: String,
    pub model: Option<String>,
    pub mac_address: Option<String>,
    pub firmware_version: Option<String>,
}

impl DeviceIdentity {
    /// 仅含设备名的标识。
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// 实体类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Sensor,
    BinarySensor,
    Switch,
    TextSensor,
    Other,
}

/// 实体描述：数值 key 到可读标识的映射条目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub key: u32,
    pub kind: EntityKind,
    pub object_id: String,
    pub name: String,
    /// 无单位的实体（开关、文本等）为空串。
    pub unit_of_measurement: String,
    pub unique_id: String,
}

impl EntityDescriptor {
    /// 构造数值传感器描述。
    pub fn sensor(
        key: u32,
        name: impl Into<String>,
        unit_of_measurement: impl Into<String>,
        unique_id: impl Into<String>,
    ) -> Self {
        Self {
            key,
            kind: EntityKind::Sensor,
            object_id: String::new(),
            name: name.into(),
            unit_of_measurement: unit_of_measurement.into(),
            unique_id: unique_id.into(),
        }
    }
}

/// 设备元数据快照：连接后一次性获取的设备标识与实体列表。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub identity: DeviceIdentity,
    pub entities: Vec<EntityDescriptor>,
}

/// 状态值。
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Float(f64),
    Bool(bool),
    Text(String),
}

/// 设备上报的一次状态变化。
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementEvent {
    pub key: u32,
    pub value: StateValue,
}

impl MeasurementEvent {
    pub fn new(key: u32, value: StateValue) -> Self {
        Self { key, value }
    }
}

/// 编码后的一行记录（行协议格式）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord(String);

impl EncodedRecord {
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for EncodedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
