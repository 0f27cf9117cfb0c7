//! Shared fixtures: small ticket exports written to temporary directories
//! and zip archives.

#![allow(dead_code)]

use rt_archive::config::ServerConfig;
use rt_archive::ingest::{self, IngestConfig, IngestReport};
use serde_json::{json, Value};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const WRITER_HEAP: usize = 50_000_000;

pub fn attachment(id: &str, filename: &str, content_type: &str, original_content: &str) -> Value {
    json!({
        "Id": id,
        "Filename": filename,
        "ContentType": content_type,
        "OriginalContent": original_content,
        "Headers": "X-Fixture: yes",
    })
}

pub fn transaction(id: &str, attachments: Vec<Value>) -> Value {
    json!({
        "Id": id,
        "Type": "Correspond",
        "Creator": {"Name": "alice", "EmailAddress": "alice@example.com"},
        "Attachments": attachments,
    })
}

pub fn ticket(id: &str, status: &str, subject: &str, transactions: Vec<Value>) -> Value {
    json!({
        "Id": id,
        "Status": status,
        "Subject": subject,
        "Queue": "perl5",
        "Requestors": [{"EmailAddress": "bob@example.com"}],
        "CustomFields": {"Severity": "medium"},
        "Transactions": transactions,
    })
}

/// Three tickets with text and binary attachments
pub fn sample_tickets() -> Vec<Value> {
    vec![
        ticket(
            "100",
            "open",
            "Segfault in regex engine",
            vec![
                transaction(
                    "1",
                    vec![attachment("1001", "report.txt", "text/plain", "hello\nworld\n")],
                ),
                transaction("2", vec![]),
            ],
        ),
        ticket(
            "101",
            "resolved",
            "Patch for perlfunc typo",
            vec![
                transaction("3", vec![]),
                transaction(
                    "4",
                    vec![
                        attachment("1002", "blob.bin", "application/octet-stream", "AAEC/w=="),
                        attachment("1003", "fix.diff", "text/x-diff", "--- a\n+++ b\n"),
                    ],
                ),
            ],
        ),
        ticket("102", "open", "Build fails on ARM", vec![]),
    ]
}

/// `count` tickets with ids 1..=count, even ids open, odd ids resolved
pub fn numbered_tickets(count: u64) -> Vec<Value> {
    (1..=count)
        .map(|id| {
            let status = if id % 2 == 0 { "open" } else { "resolved" };
            ticket(&id.to_string(), status, &format!("Ticket number {}", id), vec![])
        })
        .collect()
}

fn ticket_id(ticket: &Value) -> String {
    ticket["Id"].as_str().unwrap().to_string()
}

/// Write each ticket as `<id>.json`, plus any extra files
pub fn write_export_dir(dir: &Path, tickets: &[Value], extra: &[(&str, &[u8])]) {
    std::fs::create_dir_all(dir).unwrap();
    for ticket in tickets {
        let path = dir.join(format!("{}.json", ticket_id(ticket)));
        std::fs::write(path, serde_json::to_vec_pretty(ticket).unwrap()).unwrap();
    }
    for (name, body) in extra {
        std::fs::write(dir.join(name), body).unwrap();
    }
}

/// Write the same layout into a zip archive
pub fn write_export_zip(path: &Path, tickets: &[Value], extra: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    // Reverse order so archive order differs from id order
    for ticket in tickets.iter().rev() {
        writer
            .start_file(format!("{}.json", ticket_id(ticket)), SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(&serde_json::to_vec_pretty(ticket).unwrap())
            .unwrap();
    }
    for (name, body) in extra {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap();
}

pub fn ingest_config(data_path: &Path, out_dir: &Path) -> IngestConfig {
    IngestConfig {
        data_path: data_path.to_path_buf(),
        out_dir: out_dir.to_path_buf(),
        index_name: "index.tantivy".to_string(),
        batch_size: 2,
        parallel_reads: 4,
        writer_heap_size: WRITER_HEAP,
    }
}

/// An ingested export: tickets, manifest and index in one directory
pub struct Archive {
    pub dir: TempDir,
    pub report: IngestReport,
}

impl Archive {
    pub fn data_path(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn index_path(&self) -> PathBuf {
        self.report.index_path.clone()
    }
}

/// Write `tickets` (and `extra` files) and run a full ingestion over them
pub async fn ingest_archive(tickets: &[Value], extra: &[(&str, &[u8])]) -> Archive {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write_export_dir(&data, tickets, extra);

    let report = ingest::run(&ingest_config(&data, &data)).await.unwrap();
    Archive { dir, report }
}

pub fn server_config(prefix: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        http_port: 0,
        prefix: prefix.to_string(),
        site: "Test Archive".to_string(),
        short_site: "Test".to_string(),
        github_prefix: "https://github.com/example/repo".to_string(),
        snapshot_time: None,
        request_timeout_secs: 10,
    }
}
