use relay_config::{ConfigError, Settings};
use std::io::Write;

const SETTINGS: &str = r#"
influxdb:
  host: localhost
  port: 8086
  database: esphome
esphome:
  - host: porch.local
    port: 6053
    password: secret
  - host: back-yard.local
    port: 6054
    password: other
"#;

#[test]
fn load_settings_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(SETTINGS.as_bytes()).expect("write settings");

    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("RELAY_INFLUXDB_DATABASE", "override");
        std::env::set_var("RELAY_INFLUXDB_PORT", "9999");
    }
    let settings = Settings::load(file.path()).expect("settings");
    unsafe {
        std::env::remove_var("RELAY_INFLUXDB_DATABASE");
        std::env::remove_var("RELAY_INFLUXDB_PORT");
    }

    assert_eq!(settings.influxdb.host, "localhost");
    assert_eq!(settings.influxdb.port, 9999);
    assert_eq!(settings.influxdb.database, "override");

    let endpoints = settings.endpoints();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0].address(), "porch.local:6053");
    assert_eq!(endpoints[0].password, "secret");
    assert_eq!(endpoints[1].address(), "back-yard.local:6054");
}

#[test]
fn parse_settings_document() {
    let settings = Settings::from_yaml_str(SETTINGS).expect("settings");

    assert_eq!(settings.influxdb.database, "esphome");
    assert_eq!(settings.esphome.len(), 2);
    assert_eq!(settings.esphome[1].password, "other");
}

#[test]
fn missing_influxdb_section_is_rejected() {
    let err = Settings::from_yaml_str("esphome: []\n").expect_err("missing influxdb");
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn missing_device_host_is_rejected() {
    let err = Settings::from_yaml_str(
        "influxdb: {host: db, port: 8086, database: home}\nesphome:\n  - host: ''\n",
    )
    .expect_err("missing host");
    assert_eq!(err.to_string(), "missing required setting: esphome[0].host");
}

#[test]
fn missing_file_reports_path() {
    let err = Settings::load("/nonexistent/settings.yaml").expect_err("missing file");
    assert!(matches!(err, ConfigError::Io(ref path, _) if path == "/nonexistent/settings.yaml"));
}
