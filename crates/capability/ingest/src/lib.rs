//! 设备监听：连接设备、发布一次元数据快照、持续转发状态变化。

use async_trait::async_trait;
use domain::{
    DeviceEndpoint, DeviceIdentity, DeviceSnapshot, EntityDescriptor, MeasurementEvent,
};
use relay_protocol::{EsphomeClient, ProtocolError};
use relay_telemetry::{record_device_connected, record_measurement_received};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

pub use relay_protocol::StateUpdate;

/// 采集错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("connection to {0} failed: {1}")]
    Connection(String, String),
    #[error("authentication rejected by {0}")]
    Authentication(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("device disconnected")]
    Disconnected,
    #[error("metadata receiver dropped")]
    MetadataClosed,
    #[error("measurement receiver dropped")]
    MeasurementClosed,
}

impl From<ProtocolError> for IngestError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Disconnected => IngestError::Disconnected,
            other => IngestError::Session(other.to_string()),
        }
    }
}

/// 状态变化回调。
pub trait StateHandler: Send + Sync {
    fn on_state(&self, update: StateUpdate) -> Result<(), IngestError>;
}

/// 已登录的设备会话。
#[async_trait]
pub trait DeviceSession: Send {
    async fn device_info(&mut self) -> Result<DeviceIdentity, IngestError>;

    async fn list_entities(&mut self) -> Result<Vec<EntityDescriptor>, IngestError>;

    /// 订阅状态变化并持续回调，直到会话结束。
    async fn subscribe_states(&mut self, handler: &dyn StateHandler) -> Result<(), IngestError>;
}

/// 设备连接器（连接 + 认证）。
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &DeviceEndpoint,
    ) -> Result<Box<dyn DeviceSession>, IngestError>;
}

/// ESPHome 原生 API 连接器。
#[derive(Debug, Default)]
pub struct EsphomeConnector;

#[async_trait]
impl DeviceConnector for EsphomeConnector {
    async fn connect(
        &self,
        endpoint: &DeviceEndpoint,
    ) -> Result<Box<dyn DeviceSession>, IngestError> {
        let mut client = EsphomeClient::connect_tcp(endpoint)
            .await
            .map_err(|err| IngestError::Connection(endpoint.address(), err.to_string()))?;
        client.login(&endpoint.password).await.map_err(|err| match err {
            ProtocolError::InvalidPassword => IngestError::Authentication(endpoint.address()),
            other => IngestError::Connection(endpoint.address(), other.to_string()),
        })?;
        Ok(Box::new(EsphomeSession { client }))
    }
}

struct EsphomeSession {
    client: EsphomeClient<TcpStream>,
}

#[async_trait]
impl DeviceSession for EsphomeSession {
    async fn device_info(&mut self) -> Result<DeviceIdentity, IngestError> {
        Ok(self.client.device_info().await?)
    }

    async fn list_entities(&mut self) -> Result<Vec<EntityDescriptor>, IngestError> {
        Ok(self.client.list_entities().await?)
    }

    async fn subscribe_states(&mut self, handler: &dyn StateHandler) -> Result<(), IngestError> {
        self.client.subscribe_states().await?;
        loop {
            let update = self.client.next_state().await?;
            handler.on_state(update)?;
        }
    }
}

/// 把状态变化转发到测量通道；设备标记为无读数的状态不转发。
struct ChannelStateHandler {
    device: String,
    events: mpsc::UnboundedSender<MeasurementEvent>,
}

impl StateHandler for ChannelStateHandler {
    fn on_state(&self, update: StateUpdate) -> Result<(), IngestError> {
        if update.missing {
            debug!(
                target: "relay.ingest",
                device = %self.device,
                key = update.key,
                "missing_state_skipped"
            );
            return Ok(());
        }
        record_measurement_received();
        self.events
            .send(MeasurementEvent::new(update.key, update.value))
            .map_err(|_| IngestError::MeasurementClosed)
    }
}

/// 单台设备的监听器。
pub struct DeviceListener {
    endpoint: DeviceEndpoint,
    connector: Arc<dyn DeviceConnector>,
}

impl DeviceListener {
    pub fn new(endpoint: DeviceEndpoint, connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            endpoint,
            connector,
        }
    }

    /// connect → 设备信息 → 实体列表 → 发布快照 → 订阅。
    ///
    /// 快照一定先于任何测量事件发出；任何失败都直接返回，不重连。
    pub async fn run(
        &self,
        snapshot_tx: oneshot::Sender<DeviceSnapshot>,
        events: mpsc::UnboundedSender<MeasurementEvent>,
    ) -> Result<(), IngestError> {
        let address = self.endpoint.address();
        info!(target: "relay.ingest", device = %address, "device_connecting");

        let mut session = self.connector.connect(&self.endpoint).await?;
        let identity = session.device_info().await?;
        let entities = session.list_entities().await?;
        info!(
            target: "relay.ingest",
            device = %address,
            name = %identity.name,
            model = ?identity.model,
            mac = ?identity.mac_address,
            firmware = ?identity.firmware_version,
            entities = entities.len(),
            "device_snapshot_captured"
        );

        let device = identity.name.clone();
        snapshot_tx
            .send(DeviceSnapshot { identity, entities })
            .map_err(|_| IngestError::MetadataClosed)?;
        record_device_connected();

        let handler = ChannelStateHandler { device, events };
        session.subscribe_states(&handler).await
    }
}
