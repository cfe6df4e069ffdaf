use crate::PipelineError;
use domain::{DeviceSnapshot, EncodedRecord, MeasurementEvent};
use relay_normalize::{EntityMap, NormalizeError, encode_event};
use relay_telemetry::{record_record_encoded, record_unknown_entity};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// 单台设备的编码阶段。
///
/// AwaitingMetadata：等待唯一一条快照；Streaming：逐条解析、编码、下发。
pub struct EncodingStage {
    device: String,
    snapshot: oneshot::Receiver<DeviceSnapshot>,
    events: mpsc::UnboundedReceiver<MeasurementEvent>,
    records: mpsc::UnboundedSender<EncodedRecord>,
}

impl EncodingStage {
    /// `device` 仅用于日志（快照到达前设备名未知，通常传地址）。
    pub fn new(
        device: impl Into<String>,
        snapshot: oneshot::Receiver<DeviceSnapshot>,
        events: mpsc::UnboundedReceiver<MeasurementEvent>,
        records: mpsc::UnboundedSender<EncodedRecord>,
    ) -> Self {
        Self {
            device: device.into(),
            snapshot,
            events,
            records,
        }
    }

    /// 运行到上游测量通道关闭（Ok）或出现错误。
    pub async fn run(self) -> Result<(), PipelineError> {
        let Self {
            device,
            snapshot,
            mut events,
            records,
        } = self;

        let snapshot = snapshot
            .await
            .map_err(|_| PipelineError::MetadataUnavailable(device.clone()))?;
        let entities = EntityMap::from_snapshot(&snapshot);
        let identity = snapshot.identity;
        info!(
            target: "relay.pipeline",
            device = %device,
            name = %identity.name,
            entities = entities.len(),
            "encoding_started"
        );

        while let Some(event) = events.recv().await {
            let record = match encode_event(&identity, &entities, &event) {
                Ok(record) => record,
                Err(err @ NormalizeError::UnknownEntity { .. }) => {
                    record_unknown_entity();
                    warn!(
                        target: "relay.pipeline",
                        device = %device,
                        key = event.key,
                        error = %err,
                        "unknown_entity"
                    );
                    return Err(err.into());
                }
            };
            debug!(target: "relay.pipeline", device = %device, line = %record, "record_encoded");
            records.send(record).map_err(|_| PipelineError::SinkClosed)?;
            record_record_encoded();
        }

        info!(target: "relay.pipeline", device = %device, "encoding_finished");
        Ok(())
    }
}
