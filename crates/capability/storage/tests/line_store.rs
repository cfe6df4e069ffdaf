use domain::EncodedRecord;
use relay_storage::{InMemoryLineStore, InfluxClient, LineWriter};

#[tokio::test]
async fn in_memory_store_records_batches() {
    let store = InMemoryLineStore::new();
    store.ensure_database("esphome").await.expect("ensure");
    store.ensure_database("esphome").await.expect("ensure twice");
    store.select_database("esphome").await.expect("select");

    let batch = vec![
        EncodedRecord::new("temp,device=porch  state=1.0"),
        EncodedRecord::new("temp,device=porch  state=2.0"),
    ];
    store.write_batch(&batch).await.expect("write");

    assert_eq!(store.databases(), vec!["esphome".to_string()]);
    assert_eq!(store.selected_database().as_deref(), Some("esphome"));
    assert_eq!(store.batches(), vec![batch]);
}

#[tokio::test]
async fn in_memory_store_requires_selection() {
    let store = InMemoryLineStore::new();

    let err = store
        .write_batch(&[EncodedRecord::new("x  state=1.0")])
        .await
        .expect_err("no database");
    assert_eq!(err.to_string(), "no database selected");

    let err = store.select_database("missing").await.expect_err("unknown db");
    assert_eq!(err.to_string(), "database not found: missing");
}

#[tokio::test]
async fn influx_client_rejects_write_before_select() {
    let client = InfluxClient::new("localhost", 8086).expect("client");
    assert_eq!(client.base_url(), "http://localhost:8086");

    let err = client
        .write_batch(&[EncodedRecord::new("x  state=1.0")])
        .await
        .expect_err("no database");
    assert_eq!(err.to_string(), "no database selected");
}
