pub mod data;

pub use data::{
    DeviceIdentity, DeviceSnapshot, EncodedRecord, EntityDescriptor, EntityKind,
    MeasurementEvent, StateValue,
};

/// 设备连接端点：一台 ESPHome 设备的地址与口令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl DeviceEndpoint {
    /// 构造设备端点。
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
        }
    }

    /// `host:port` 形式的地址，用于建立连接与日志。
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
