//! 转发服务设置加载（YAML 设置文件 + 环境变量覆盖）。

use domain::DeviceEndpoint;
use serde::Deserialize;
use std::env;
use std::path::Path;

/// ESPHome 原生 API 默认端口。
pub const DEFAULT_ESPHOME_PORT: u16 = 6053;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("invalid settings document: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("missing required setting: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// InfluxDB 连接设置。
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InfluxSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
}

/// 单台 ESPHome 设备设置。
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EsphomeSettings {
    pub host: String,
    #[serde(default = "default_esphome_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
}

fn default_esphome_port() -> u16 {
    DEFAULT_ESPHOME_PORT
}

impl EsphomeSettings {
    pub fn endpoint(&self) -> DeviceEndpoint {
        DeviceEndpoint::new(self.host.clone(), self.port, self.password.clone())
    }
}

/// 转发服务运行配置。
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub influxdb: InfluxSettings,
    #[serde(default)]
    pub esphome: Vec<EsphomeSettings>,
}

impl Settings {
    /// 读取设置文件并应用环境变量覆盖。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(path.display().to_string(), err))?;
        let mut settings = Self::from_yaml_str(&text)?;
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 仅解析 YAML 文本（不读环境变量）。
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// 用 `RELAY_INFLUXDB_*` 环境变量覆盖 InfluxDB 设置。
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(host) = read_optional("RELAY_INFLUXDB_HOST") {
            self.influxdb.host = host;
        }
        self.influxdb.port = read_u16_with_default("RELAY_INFLUXDB_PORT", self.influxdb.port)?;
        if let Some(database) = read_optional("RELAY_INFLUXDB_DATABASE") {
            self.influxdb.database = database;
        }
        Ok(())
    }

    /// 所有设备端点（按配置顺序）。
    pub fn endpoints(&self) -> Vec<DeviceEndpoint> {
        self.esphome.iter().map(EsphomeSettings::endpoint).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.influxdb.host.trim().is_empty() {
            return Err(ConfigError::Missing("influxdb.host".to_string()));
        }
        if self.influxdb.database.trim().is_empty() {
            return Err(ConfigError::Missing("influxdb.database".to_string()));
        }
        for (index, device) in self.esphome.iter().enumerate() {
            if device.host.trim().is_empty() {
                return Err(ConfigError::Missing(format!("esphome[{index}].host")));
            }
        }
        Ok(())
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esphome_port_and_password_default() {
        let settings = Settings::from_yaml_str(
            "influxdb: {host: db, port: 8086, database: home}\nesphome:\n  - host: porch.local\n",
        )
        .expect("settings");
        let device = &settings.esphome[0];
        assert_eq!(device.port, DEFAULT_ESPHOME_PORT);
        assert!(device.password.is_empty());
    }

    #[test]
    fn empty_database_is_missing() {
        let err = Settings::from_yaml_str("influxdb: {host: db, port: 8086, database: ''}\n")
            .expect_err("missing database");
        assert_eq!(err.to_string(), "missing required setting: influxdb.database");
    }
}
