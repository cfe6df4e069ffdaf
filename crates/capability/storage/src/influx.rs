//! InfluxDB 1.x HTTP 写入
//!
//! - 建库：`POST /query?q=CREATE DATABASE "<name>"`
//! - 写入：`POST /write?db=<name>&precision=ns`，请求体为换行分隔的行记录

use crate::error::StorageError;
use crate::traits::LineWriter;
use async_trait::async_trait;
use domain::EncodedRecord;
use reqwest::Url;
use std::sync::RwLock;
use tracing::debug;

/// InfluxDB HTTP 客户端
pub struct InfluxClient {
    client: reqwest::Client,
    base_url: String,
    database: RwLock<Option<String>>,
}

impl InfluxClient {
    /// 创建客户端（不发起连接）
    pub fn new(host: &str, port: u16) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url(host, port),
            database: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn selected(&self) -> Result<String, StorageError> {
        self.database
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .clone()
            .ok_or_else(|| StorageError::new("no database selected"))
    }

    async fn post(&self, url: Url, body: String) -> Result<(), StorageError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(StorageError::new(format!(
            "influxdb returned {}: {}",
            status,
            text.trim()
        )))
    }
}

#[async_trait]
impl LineWriter for InfluxClient {
    async fn ensure_database(&self, name: &str) -> Result<(), StorageError> {
        let url = query_url(&self.base_url, &create_database_statement(name))?;
        self.post(url, String::new()).await
    }

    async fn select_database(&self, name: &str) -> Result<(), StorageError> {
        let mut database = self
            .database
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        *database = Some(name.to_string());
        Ok(())
    }

    async fn write_batch(&self, records: &[EncodedRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let database = self.selected()?;
        let url = write_url(&self.base_url, &database)?;
        debug!(target: "relay.storage", database = %database, lines = records.len(), "influx_write");
        self.post(url, batch_body(records)).await
    }
}

/// `http://host:port`
pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// 建库语句（库名加双引号，内部双引号转义）
pub fn create_database_statement(name: &str) -> String {
    format!("CREATE DATABASE \"{}\"", name.replace('"', "\\\""))
}

pub fn query_url(base_url: &str, statement: &str) -> Result<Url, StorageError> {
    Url::parse_with_params(&format!("{}/query", base_url), &[("q", statement)])
        .map_err(|err| StorageError::new(err.to_string()))
}

pub fn write_url(base_url: &str, database: &str) -> Result<Url, StorageError> {
    Url::parse_with_params(
        &format!("{}/write", base_url),
        &[("db", database), ("precision", "ns")],
    )
    .map_err(|err| StorageError::new(err.to_string()))
}

/// 换行分隔的请求体
pub fn batch_body(records: &[EncodedRecord]) -> String {
    records
        .iter()
        .map(EncodedRecord::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_database_quotes_name() {
        assert_eq!(
            create_database_statement("esphome"),
            "CREATE DATABASE \"esphome\""
        );
        assert_eq!(
            create_database_statement("a\"b"),
            "CREATE DATABASE \"a\\\"b\""
        );
    }

    #[test]
    fn urls_carry_parameters() {
        let base = base_url("localhost", 8086);
        let query = query_url(&base, "CREATE DATABASE \"home\"").expect("query url");
        assert_eq!(query.path(), "/query");
        assert_eq!(
            query.query_pairs().next().map(|(k, v)| (k.into_owned(), v.into_owned())),
            Some(("q".to_string(), "CREATE DATABASE \"home\"".to_string()))
        );

        let write = write_url(&base, "home").expect("write url");
        assert_eq!(write.as_str(), "http://localhost:8086/write?db=home&precision=ns");
    }

    #[test]
    fn body_joins_lines() {
        let records = vec![EncodedRecord::new("a  state=1.0"), EncodedRecord::new("b  state=2.0")];
        assert_eq!(batch_body(&records), "a  state=1.0\nb  state=2.0");
    }
}
