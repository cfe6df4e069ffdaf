//! 转发链路装配模块
//!
//! 每台设备一个 `DeviceListener` 与一个 `EncodingStage`，全局一个 `SinkWriter`，
//! 全部作为任务放入同一个 `JoinSet`：
//!
//! - 设备侧失败（含任务 panic）只影响该设备，记录日志与计数，其他设备继续运行；
//! - 写入失败视为致命，终止所有任务并返回错误；
//! - 所有设备链路结束后继续等待关闭信号；
//! - 收到关闭信号后直接中止所有任务，不做排空。

use domain::DeviceEndpoint;
use relay_ingest::{DeviceConnector, DeviceListener, IngestError};
use relay_pipeline::{EncodingStage, PipelineError, SinkWriter};
use relay_storage::LineWriter;
use relay_telemetry::record_device_failure;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{error, info, warn};

/// 转发服务错误。
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("sink failed: {0}")]
    Sink(PipelineError),
    #[error("sink task failed: {0}")]
    Task(JoinError),
}

/// JoinSet 中各任务的结束结果。
enum TaskOutcome {
    Listener {
        device: String,
        result: Result<(), IngestError>,
    },
    Stage {
        device: String,
        result: Result<(), PipelineError>,
    },
    Sink(Result<(), PipelineError>),
}

/// 任务归属，用于把 panic 映射回设备。
enum TaskRole {
    Sink,
    Device(String),
}

pub struct Relay {
    connector: Arc<dyn DeviceConnector>,
    writer: Arc<dyn LineWriter>,
    database: String,
    endpoints: Vec<DeviceEndpoint>,
}

impl Relay {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        writer: Arc<dyn LineWriter>,
        database: impl Into<String>,
        endpoints: Vec<DeviceEndpoint>,
    ) -> Self {
        Self {
            connector,
            writer,
            database: database.into(),
            endpoints,
        }
    }

    /// 运行到 `shutdown` 完成或写入失败。
    ///
    /// 所有设备链路都结束后仍等待 `shutdown`，不自行退出。
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), RelayError> {
        let (mut tasks, mut roles) = self.spawn_tasks();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(target: "relay.app", tasks = tasks.len(), "shutdown_requested");
                    tasks.abort_all();
                    return Ok(());
                }
                joined = tasks.join_next_with_id() => {
                    let Some(joined) = joined else {
                        break;
                    };
                    let handled = match joined {
                        Ok((id, outcome)) => {
                            roles.remove(&id);
                            handle_outcome(outcome)
                        }
                        Err(err) => handle_join_error(roles.remove(&err.id()), err),
                    };
                    if let Err(err) = handled {
                        tasks.abort_all();
                        return Err(err);
                    }
                }
            }
        }

        warn!(target: "relay.app", "all_pipelines_ended");
        shutdown.await;
        info!(target: "relay.app", "shutdown_requested");
        Ok(())
    }

    fn spawn_tasks(self) -> (JoinSet<TaskOutcome>, HashMap<Id, TaskRole>) {
        let Self {
            connector,
            writer,
            database,
            endpoints,
        } = self;
        let mut tasks = JoinSet::new();
        let mut roles = HashMap::new();

        // 1. 全局唯一的写入任务，所有设备共享一个记录通道
        let (records_tx, records_rx) = mpsc::unbounded_channel();
        let sink = SinkWriter::new(writer, database, records_rx);
        let handle = tasks.spawn(async move { TaskOutcome::Sink(sink.run().await) });
        roles.insert(handle.id(), TaskRole::Sink);

        // 2. 每台设备：元数据通道 + 测量通道，listener 与 stage 各一个任务
        for endpoint in endpoints {
            let device = endpoint.address();
            let (snapshot_tx, snapshot_rx) = oneshot::channel();
            let (events_tx, events_rx) = mpsc::unbounded_channel();

            let stage = EncodingStage::new(
                device.clone(),
                snapshot_rx,
                events_rx,
                records_tx.clone(),
            );
            let stage_device = device.clone();
            let handle = tasks.spawn(async move {
                TaskOutcome::Stage {
                    device: stage_device,
                    result: stage.run().await,
                }
            });
            roles.insert(handle.id(), TaskRole::Device(device.clone()));

            let listener = DeviceListener::new(endpoint, connector.clone());
            let listener_device = device.clone();
            let handle = tasks.spawn(async move {
                TaskOutcome::Listener {
                    device: listener_device,
                    result: listener.run(snapshot_tx, events_tx).await,
                }
            });
            roles.insert(handle.id(), TaskRole::Device(device));
        }
        info!(target: "relay.app", tasks = tasks.len(), "relay_started");
        (tasks, roles)
    }
}

/// 任务 panic：设备任务按设备失败处理，写入任务失败为致命。
fn handle_join_error(role: Option<TaskRole>, err: JoinError) -> Result<(), RelayError> {
    match role {
        Some(TaskRole::Device(device)) => {
            record_device_failure();
            error!(target: "relay.app", device = %device, error = %err, "device_task_panicked");
            Ok(())
        }
        Some(TaskRole::Sink) | None => {
            error!(target: "relay.app", error = %err, "sink_task_failed");
            Err(RelayError::Task(err))
        }
    }
}

/// 记录单个任务的结束；仅写入失败向上返回。
fn handle_outcome(outcome: TaskOutcome) -> Result<(), RelayError> {
    match outcome {
        TaskOutcome::Listener {
            device,
            result: Ok(()),
        } => {
            info!(target: "relay.app", device = %device, "device_session_ended");
        }
        TaskOutcome::Listener {
            device,
            result: Err(err),
        } => {
            record_device_failure();
            error!(target: "relay.app", device = %device, error = %err, "device_failed");
        }
        TaskOutcome::Stage {
            device,
            result: Ok(()),
        } => {
            info!(target: "relay.app", device = %device, "encoding_stage_ended");
        }
        TaskOutcome::Stage {
            device,
            result: Err(err),
        } => {
            warn!(target: "relay.app", device = %device, error = %err, "encoding_stage_failed");
        }
        TaskOutcome::Sink(Ok(())) => {
            info!(target: "relay.app", "sink_ended");
        }
        TaskOutcome::Sink(Err(err)) => {
            error!(target: "relay.app", error = %err, "sink_failed");
            return Err(RelayError::Sink(err));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::{DeviceIdentity, EncodedRecord, EntityDescriptor, StateValue};
    use relay_ingest::{DeviceSession, StateHandler, StateUpdate};
    use relay_storage::{InMemoryLineStore, StorageError};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 按主机名返回设备名的假会话；`hold` 为 true 时订阅后永不结束。
    struct FakeSession {
        name: String,
        updates: Vec<StateUpdate>,
        hold: bool,
    }

    #[async_trait]
    impl DeviceSession for FakeSession {
        async fn device_info(&mut self) -> Result<DeviceIdentity, IngestError> {
            Ok(DeviceIdentity::named(self.name.clone()))
        }

        async fn list_entities(&mut self) -> Result<Vec<EntityDescriptor>, IngestError> {
            Ok(vec![EntityDescriptor::sensor(1, "temp", "C", "temp_1")])
        }

        async fn subscribe_states(
            &mut self,
            handler: &dyn StateHandler,
        ) -> Result<(), IngestError> {
            for update in self.updates.drain(..) {
                handler.on_state(update)?;
            }
            if self.hold {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    struct FakeConnector {
        hold: bool,
    }

    #[async_trait]
    impl DeviceConnector for FakeConnector {
        async fn connect(
            &self,
            endpoint: &DeviceEndpoint,
        ) -> Result<Box<dyn DeviceSession>, IngestError> {
            if endpoint.host == "bad.local" {
                panic!("malformed frame from device");
            }
            if endpoint.host == "offline.local" {
                return Err(IngestError::Connection(
                    endpoint.address(),
                    "connection refused".to_string(),
                ));
            }
            let name = endpoint.host.trim_end_matches(".local").replace('-', " ");
            Ok(Box::new(FakeSession {
                name,
                updates: vec![reading(21.5), reading(22.0)],
                hold: self.hold,
            }))
        }
    }

    struct BrokenWriter;

    #[async_trait]
    impl LineWriter for BrokenWriter {
        async fn ensure_database(&self, _name: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn select_database(&self, _name: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn write_batch(&self, _records: &[EncodedRecord]) -> Result<(), StorageError> {
            Err(StorageError::new("influxdb returned 500 Internal Server Error: down"))
        }
    }

    fn reading(value: f64) -> StateUpdate {
        StateUpdate {
            key: 1,
            value: StateValue::Float(value),
            missing: false,
        }
    }

    fn endpoint(host: &str) -> DeviceEndpoint {
        DeviceEndpoint::new(host, 6053, "")
    }

    fn written_lines(store: &InMemoryLineStore) -> Vec<String> {
        let mut lines: Vec<String> = store
            .batches()
            .into_iter()
            .flatten()
            .map(EncodedRecord::into_string)
            .collect();
        lines.sort();
        lines
    }

    /// 写入至少 `count` 行后再让出若干轮调度，作为关闭信号。
    async fn after_lines(store: Arc<InMemoryLineStore>, count: usize) {
        while written_lines(&store).len() < count {
            tokio::task::yield_now().await;
        }
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn relays_every_device_into_one_database() {
        let store = Arc::new(InMemoryLineStore::new());
        let relay = Relay::new(
            Arc::new(FakeConnector { hold: false }),
            store.clone(),
            "esphome",
            vec![endpoint("porch.local"), endpoint("back-yard.local")],
        );

        relay
            .run(after_lines(store.clone(), 4))
            .await
            .expect("clean shutdown");

        assert_eq!(store.selected_database().as_deref(), Some("esphome"));
        assert_eq!(
            written_lines(&store),
            vec![
                "temp,device=back\\ yard,unit_of_measurement=C,unique_id=temp_1  state=21.5",
                "temp,device=back\\ yard,unit_of_measurement=C,unique_id=temp_1  state=22.0",
                "temp,device=porch,unit_of_measurement=C,unique_id=temp_1  state=21.5",
                "temp,device=porch,unit_of_measurement=C,unique_id=temp_1  state=22.0",
            ]
        );
    }

    #[tokio::test]
    async fn offline_device_does_not_stop_others() {
        let store = Arc::new(InMemoryLineStore::new());
        let relay = Relay::new(
            Arc::new(FakeConnector { hold: false }),
            store.clone(),
            "esphome",
            vec![endpoint("offline.local"), endpoint("porch.local")],
        );

        relay
            .run(after_lines(store.clone(), 2))
            .await
            .expect("device failure is not fatal");

        assert_eq!(
            written_lines(&store),
            vec![
                "temp,device=porch,unit_of_measurement=C,unique_id=temp_1  state=21.5",
                "temp,device=porch,unit_of_measurement=C,unique_id=temp_1  state=22.0",
            ]
        );
    }

    #[tokio::test]
    async fn panicking_device_does_not_stop_others() {
        let store = Arc::new(InMemoryLineStore::new());
        let relay = Relay::new(
            Arc::new(FakeConnector { hold: true }),
            store.clone(),
            "esphome",
            vec![endpoint("bad.local"), endpoint("porch.local")],
        );

        relay
            .run(after_lines(store.clone(), 2))
            .await
            .expect("device panic is not fatal");

        assert_eq!(
            written_lines(&store),
            vec![
                "temp,device=porch,unit_of_measurement=C,unique_id=temp_1  state=21.5",
                "temp,device=porch,unit_of_measurement=C,unique_id=temp_1  state=22.0",
            ]
        );
    }

    #[tokio::test]
    async fn relay_waits_for_shutdown_after_every_device_ends() {
        let fired = Arc::new(AtomicBool::new(false));
        let signal = fired.clone();
        let relay = Relay::new(
            Arc::new(FakeConnector { hold: false }),
            Arc::new(InMemoryLineStore::new()),
            "esphome",
            vec![endpoint("offline.local")],
        );

        relay
            .run(async move {
                for _ in 0..64 {
                    tokio::task::yield_now().await;
                }
                signal.store(true, Ordering::SeqCst);
            })
            .await
            .expect("clean shutdown");

        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn write_failure_stops_relay() {
        let relay = Relay::new(
            Arc::new(FakeConnector { hold: true }),
            Arc::new(BrokenWriter),
            "esphome",
            vec![endpoint("porch.local")],
        );

        let err = relay
            .run(std::future::pending::<()>())
            .await
            .expect_err("sink failure is fatal");

        assert!(matches!(err, RelayError::Sink(PipelineError::Writer(_))));
    }

    #[tokio::test]
    async fn shutdown_aborts_running_devices() {
        let store = Arc::new(InMemoryLineStore::new());
        let relay = Relay::new(
            Arc::new(FakeConnector { hold: true }),
            store,
            "esphome",
            vec![endpoint("porch.local")],
        );

        relay
            .run(async {})
            .await
            .expect("shutdown is a clean exit");
    }
}
