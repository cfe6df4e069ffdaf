//! ESPHome → InfluxDB 转发服务入口。

mod relay;

use clap::Parser;
use relay::Relay;
use relay_config::Settings;
use relay_ingest::EsphomeConnector;
use relay_storage::InfluxClient;
use relay_telemetry::{init_tracing, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(
    name = "esphome-relay",
    version,
    about = "Relay ESPHome device states into InfluxDB"
)]
struct Cli {
    /// 设置文件路径（YAML）
    #[arg(short, long, default_value = "settings.yaml")]
    settings: PathBuf,
    /// 输出 debug 级别日志
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于覆盖 RELAY_INFLUXDB_*
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // 配置错误在启动任何任务之前直接返回
    let settings = Settings::load(&cli.settings)?;
    info!(
        target: "relay.app",
        settings = %cli.settings.display(),
        influxdb = %format!("{}:{}", settings.influxdb.host, settings.influxdb.port),
        database = %settings.influxdb.database,
        devices = settings.esphome.len(),
        "settings_loaded"
    );

    let writer = Arc::new(InfluxClient::new(
        &settings.influxdb.host,
        settings.influxdb.port,
    )?);
    let relay = Relay::new(
        Arc::new(EsphomeConnector),
        writer,
        settings.influxdb.database.clone(),
        settings.endpoints(),
    );

    let result = relay.run(shutdown_signal()).await;
    info!(target: "relay.app", metrics = ?metrics().snapshot(), "relay_stopped");
    result?;
    Ok(())
}

/// 等待 Ctrl-C；信号不可用时永不返回。
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "relay.app", error = %err, "ctrl_c_unavailable");
        std::future::pending::<()>().await;
    }
}
