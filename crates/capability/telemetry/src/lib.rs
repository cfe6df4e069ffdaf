//! 日志初始化与转发链路计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub devices_connected: u64,
    pub device_failures: u64,
    pub measurements_received: u64,
    pub records_encoded: u64,
    pub unknown_entities: u64,
    pub batches_written: u64,
    pub records_written: u64,
    pub write_failures: u64,
}

/// 进程级计数指标。
pub struct TelemetryMetrics {
    devices_connected: AtomicU64,
    device_failures: AtomicU64,
    measurements_received: AtomicU64,
    records_encoded: AtomicU64,
    unknown_entities: AtomicU64,
    batches_written: AtomicU64,
    records_written: AtomicU64,
    write_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            devices_connected: AtomicU64::new(0),
            device_failures: AtomicU64::new(0),
            measurements_received: AtomicU64::new(0),
            records_encoded: AtomicU64::new(0),
            unknown_entities: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            devices_connected: self.devices_connected.load(Ordering::Relaxed),
            device_failures: self.device_failures.load(Ordering::Relaxed),
            measurements_received: self.measurements_received.load(Ordering::Relaxed),
            records_encoded: self.records_encoded.load(Ordering::Relaxed),
            unknown_entities: self.unknown_entities.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing：优先 RUST_LOG，否则 verbose 为 debug、默认 info。
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));
    let _ = fmt().with_env_filter(filter).try_init();
}

fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// 记录设备连接成功（快照已发布）。
pub fn record_device_connected() {
    metrics().devices_connected.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备链路终止。
pub fn record_device_failure() {
    metrics().device_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录收到的状态变化次数。
pub fn record_measurement_received() {
    metrics()
        .measurements_received
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录编码输出次数。
pub fn record_record_encoded() {
    metrics().records_encoded.fetch_add(1, Ordering::Relaxed);
}

/// 记录未知实体 key 次数。
pub fn record_unknown_entity() {
    metrics().unknown_entities.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次批量写入及其行数。
pub fn record_batch_written(records: usize) {
    let metrics = metrics();
    metrics.batches_written.fetch_add(1, Ordering::Relaxed);
    metrics
        .records_written
        .fetch_add(records as u64, Ordering::Relaxed);
}

/// 记录写入失败次数。
pub fn record_write_failure() {
    metrics().write_failures.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::default_level;

    #[test]
    fn verbose_selects_debug() {
        assert_eq!(default_level(true), "debug");
        assert_eq!(default_level(false), "info");
    }
}
