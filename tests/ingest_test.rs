//! Bulk ingestion over directory and zip exports

mod common;

use common::*;
use rt_archive::error::AppError;
use rt_archive::ingest::{self, read_tickets};
use rt_archive::models::ManifestEntry;
use rt_archive::search::{index_exists, IndexManager};
use rt_archive::storage::open_source;
use tempfile::TempDir;

fn manifest_ids(path: &std::path::Path) -> Vec<String> {
    let entries: Vec<ManifestEntry> =
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    entries.into_iter().map(|e| e.id).collect()
}

#[tokio::test]
async fn test_ingest_skips_non_ticket_files() {
    let archive = ingest_archive(
        &sample_tickets(),
        &[
            ("README.json", b"not a ticket at all"),
            ("notes.txt", b"hello"),
            ("rtgithub.csv", b"100,5\n"),
        ],
    )
    .await;

    assert_eq!(archive.report.tickets, 3);
    assert_eq!(archive.report.indexed, 3);
    assert_eq!(archive.report.skipped, 0);
    assert_eq!(
        manifest_ids(&archive.report.manifest_path),
        vec!["100", "101", "102"]
    );

    let manager = IndexManager::open(&archive.index_path()).unwrap();
    assert_eq!(manager.get_stats().unwrap().total_documents, 3);
}

#[tokio::test]
async fn test_manifest_keeps_positions_only() {
    let archive = ingest_archive(&sample_tickets(), &[]).await;

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&archive.report.manifest_path).unwrap()).unwrap();
    let second = &raw[1];
    assert_eq!(second["Id"], "101");
    assert_eq!(second["Transactions"][0]["Attachments"], serde_json::json!([]));
    assert_eq!(
        second["Transactions"][1]["Attachments"],
        serde_json::json!([{"Id": "1002"}, {"Id": "1003"}])
    );
    assert!(second.get("Queue").is_none());
    assert!(second["Transactions"][1]["Attachments"][0]
        .get("OriginalContent")
        .is_none());
}

#[tokio::test]
async fn test_order_is_numeric_not_lexical() {
    let tickets = vec![
        ticket("10", "open", "ten", vec![]),
        ticket("2", "open", "two", vec![]),
        ticket("1", "open", "one", vec![]),
        ticket("100", "open", "hundred", vec![]),
    ];
    let archive = ingest_archive(&tickets, &[]).await;

    assert_eq!(
        manifest_ids(&archive.report.manifest_path),
        vec!["1", "2", "10", "100"]
    );
}

#[tokio::test]
async fn test_directory_and_zip_produce_identical_manifests() {
    let temp_dir = TempDir::new().unwrap();
    let tickets = numbered_tickets(25);

    let dir_data = temp_dir.path().join("dir");
    write_export_dir(&dir_data, &tickets, &[]);
    let dir_out = temp_dir.path().join("dir-out");
    let dir_report = ingest::run(&ingest_config(&dir_data, &dir_out)).await.unwrap();

    let zip_data = temp_dir.path().join("export.zip");
    write_export_zip(&zip_data, &tickets, &[("notes.txt", b"skip me")]);
    let zip_out = temp_dir.path().join("zip-out");
    let zip_report = ingest::run(&ingest_config(&zip_data, &zip_out)).await.unwrap();

    assert_eq!(dir_report.tickets, 25);
    assert_eq!(zip_report.tickets, 25);
    assert_eq!(
        std::fs::read(&dir_report.manifest_path).unwrap(),
        std::fs::read(&zip_report.manifest_path).unwrap()
    );
}

#[tokio::test]
async fn test_invalid_ticket_aborts_everything() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("data");
    write_export_dir(&data, &sample_tickets(), &[("7.json", b"{\"Id\": \"7\", ")]);

    let config = ingest_config(&data, &data);
    let err = ingest::run(&config).await.unwrap_err();
    match err {
        AppError::MalformedDocument(message) => assert!(message.contains("7.json")),
        other => panic!("unexpected error: {other}"),
    }

    assert!(!config.manifest_path().exists());
    assert!(!index_exists(&config.index_path()));
}

#[tokio::test]
async fn test_rerun_replaces_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("data");
    write_export_dir(&data, &numbered_tickets(3), &[]);
    let config = ingest_config(&data, &data);

    ingest::run(&config).await.unwrap();
    write_export_dir(&data, &numbered_tickets(5), &[]);
    let report = ingest::run(&config).await.unwrap();

    assert_eq!(report.tickets, 5);
    let manager = IndexManager::open(&report.index_path).unwrap();
    assert_eq!(manager.get_stats().unwrap().total_documents, 5);
}

#[tokio::test]
async fn test_read_tickets_with_single_reader() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("data");
    write_export_dir(&data, &numbered_tickets(12), &[]);

    let source = open_source(&data).unwrap();
    let tickets = read_tickets(source, 1).await.unwrap();
    let ids: Vec<u64> = tickets.iter().filter_map(|t| t.numeric_id()).collect();
    assert_eq!(ids, (1..=12).collect::<Vec<_>>());
}
