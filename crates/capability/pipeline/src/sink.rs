use crate::PipelineError;
use domain::EncodedRecord;
use relay_storage::LineWriter;
use relay_telemetry::{record_batch_written, record_write_failure};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// 全局唯一的批量写入器，独占数据库连接。
pub struct SinkWriter {
    writer: Arc<dyn LineWriter>,
    database: String,
    records: mpsc::UnboundedReceiver<EncodedRecord>,
}

impl SinkWriter {
    pub fn new(
        writer: Arc<dyn LineWriter>,
        database: impl Into<String>,
        records: mpsc::UnboundedReceiver<EncodedRecord>,
    ) -> Self {
        Self {
            writer,
            database: database.into(),
            records,
        }
    }

    /// 建库、选库，然后循环：等到至少一条记录，取走当前排队的全部记录，写一次。
    ///
    /// 写入失败直接返回（不重试）；所有生产者退出后返回 Ok。
    pub async fn run(mut self) -> Result<(), PipelineError> {
        self.writer
            .ensure_database(&self.database)
            .await
            .map_err(|err| PipelineError::Writer(err.to_string()))?;
        self.writer
            .select_database(&self.database)
            .await
            .map_err(|err| PipelineError::Writer(err.to_string()))?;
        info!(target: "relay.sink", database = %self.database, "sink_ready");

        while let Some(batch) = self.next_batch().await {
            debug!(target: "relay.sink", lines = batch.len(), "writing_lines");
            if let Err(err) = self.writer.write_batch(&batch).await {
                record_write_failure();
                error!(
                    target: "relay.sink",
                    database = %self.database,
                    lines = batch.len(),
                    error = %err,
                    "batch_write_failed"
                );
                return Err(PipelineError::Writer(err.to_string()));
            }
            record_batch_written(batch.len());
        }

        info!(target: "relay.sink", "sink_finished");
        Ok(())
    }

    /// 阻塞到至少一条记录，再非阻塞取走其余排队记录（保持入队顺序）。
    async fn next_batch(&mut self) -> Option<Vec<EncodedRecord>> {
        let first = self.records.recv().await?;
        let mut batch = vec![first];
        while let Ok(record) = self.records.try_recv() {
            batch.push(record);
        }
        Some(batch)
    }
}
