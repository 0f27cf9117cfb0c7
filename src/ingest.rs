//! Bulk ingestion
//!
//! Reads every `<id>.json` ticket of an export, then writes the manifest
//! (`index.json`) and builds the full-text index from the same sorted ticket
//! list. Both outputs are staged next to their final location and only moved
//! into place once the whole run has succeeded.

use crate::config::IngestSettings;
use crate::error::{AppError, Result};
use crate::models::ManifestEntry;
use crate::search::{IndexBuilder, TicketDocument};
use crate::storage::{open_source, TicketSource};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// File name of the manifest inside the output directory
pub const MANIFEST_FILE: &str = "index.json";

static TICKET_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.json$").expect("ticket file pattern is valid"));

/// Whether `name` is a per-ticket document (`<digits>.json`)
pub fn is_ticket_file(name: &str) -> bool {
    TICKET_FILE.is_match(name)
}

/// Ingestion run configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Directory or `.zip` of exported ticket documents
    pub data_path: PathBuf,

    /// Where the manifest and the index are written
    pub out_dir: PathBuf,

    /// Directory name of the index inside `out_dir`
    pub index_name: String,

    /// Tickets per index commit
    pub batch_size: usize,

    /// Ticket files read concurrently
    pub parallel_reads: usize,

    /// Index writer heap size in bytes
    pub writer_heap_size: usize,
}

impl IngestConfig {
    pub fn from_settings(settings: &IngestSettings, writer_heap_size: usize) -> Self {
        Self {
            data_path: settings.data_path.clone(),
            out_dir: settings.out_dir.clone(),
            index_name: settings.index_name.clone(),
            batch_size: settings.batch_size,
            parallel_reads: settings.parallel_reads,
            writer_heap_size,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.out_dir.join(MANIFEST_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.out_dir.join(&self.index_name)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Tickets written to the manifest
    pub tickets: usize,

    /// Tickets added to the full-text index
    pub indexed: usize,

    /// Tickets left out of the index because their id is not numeric
    pub skipped: usize,

    pub manifest_path: PathBuf,
    pub index_path: PathBuf,
    pub took: Duration,
}

/// Read and parse every ticket document of `source`, at most
/// `parallel_reads` at a time.
///
/// Names not matching `<digits>.json` are ignored. Any unreadable or
/// unparsable ticket fails the whole read. The result is sorted by numeric
/// ticket id.
pub async fn read_tickets(
    source: Arc<dyn TicketSource>,
    parallel_reads: usize,
) -> Result<Vec<ManifestEntry>> {
    let names: Vec<String> = source
        .list()
        .await?
        .into_iter()
        .filter(|name| is_ticket_file(name))
        .collect();

    tracing::info!(
        location = ?source.location(),
        files = names.len(),
        parallel_reads,
        "Reading tickets"
    );

    let semaphore = Arc::new(Semaphore::new(parallel_reads.max(1)));
    let tickets = Arc::new(Mutex::new(Vec::with_capacity(names.len())));
    let mut workers = JoinSet::new();

    for name in names {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| AppError::Internal(format!("read pool closed: {}", e)))?;
        let source = Arc::clone(&source);
        let tickets = Arc::clone(&tickets);

        workers.spawn(async move {
            let _permit = permit;
            let bytes = source.get_file(&name).await?;
            let entry: ManifestEntry = serde_json::from_slice(&bytes)
                .map_err(|e| AppError::MalformedDocument(format!("{}: {}", name, e)))?;
            tickets.lock().push(entry);
            Ok::<(), AppError>(())
        });
    }

    // Dropping the set on the first error aborts the remaining workers
    while let Some(result) = workers.join_next().await {
        result??;
    }

    let mut tickets = Arc::try_unwrap(tickets)
        .map_err(|_| AppError::Internal("ticket list still shared after read".to_string()))?
        .into_inner();
    sort_tickets(&mut tickets);

    tracing::info!(tickets = tickets.len(), "Read tickets");
    Ok(tickets)
}

/// Sort by numeric id; ids that are not numbers go last, by text.
pub fn sort_tickets(tickets: &mut [ManifestEntry]) {
    tickets.sort_by(|a, b| match (a.numeric_id(), b.numeric_id()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}

/// Serialize the manifest
pub fn write_manifest<W: Write>(writer: W, tickets: &[ManifestEntry]) -> Result<()> {
    serde_json::to_writer(writer, tickets).map_err(|e| AppError::Io(e.into()))
}

/// Build a fresh full-text index at `path`, committing every `batch_size`
/// tickets. Returns the number of tickets indexed and skipped.
pub fn build_index(
    tickets: &[ManifestEntry],
    path: &Path,
    batch_size: usize,
    writer_heap_size: usize,
) -> Result<(usize, usize)> {
    let mut builder = IndexBuilder::create(path, writer_heap_size)?;
    let mut skipped = 0;

    for chunk in tickets.chunks(batch_size.max(1)) {
        let documents: Vec<TicketDocument> = chunk
            .iter()
            .filter_map(|entry| {
                let document = TicketDocument::from_entry(entry);
                if document.is_none() {
                    tracing::error!(
                        ticket_id = %entry.id,
                        "Ticket id is not numeric, leaving it out of the search index"
                    );
                    skipped += 1;
                }
                document
            })
            .collect();
        builder.add_batch(&documents)?;
    }

    let indexed = builder.finish()?;
    Ok((indexed, skipped))
}

/// Move the staged index and manifest into place.
///
/// The previous index is parked inside `staging` until both renames have
/// succeeded and is put back if either fails; it is removed with `staging`.
fn install_outputs(
    staging: &Path,
    staged_index: &Path,
    index_path: &Path,
    staged_manifest: &Path,
    manifest_path: &Path,
) -> Result<()> {
    let retired = staging.join("previous-index");
    let had_previous = index_path.exists();
    if had_previous {
        std::fs::rename(index_path, &retired)?;
    }

    let restore = |err: std::io::Error| {
        if had_previous {
            if let Err(restore_err) = std::fs::rename(&retired, index_path) {
                tracing::error!(
                    index = ?index_path,
                    error = %restore_err,
                    "Could not restore the previous index"
                );
            }
        }
        err
    };

    if let Err(err) = std::fs::rename(staged_index, index_path) {
        return Err(restore(err).into());
    }

    if let Err(err) = std::fs::rename(staged_manifest, manifest_path) {
        if let Err(remove_err) = std::fs::remove_dir_all(index_path) {
            tracing::error!(
                index = ?index_path,
                error = %remove_err,
                "Could not remove the new index"
            );
        }
        return Err(restore(err).into());
    }

    Ok(())
}

/// Run a complete ingestion
pub async fn run(config: &IngestConfig) -> Result<IngestReport> {
    let started = Instant::now();

    let source = open_source(&config.data_path)?;
    let tickets = read_tickets(Arc::clone(&source), config.parallel_reads).await;
    source.close().await;
    let tickets = tickets?;
    let ticket_count = tickets.len();

    std::fs::create_dir_all(&config.out_dir)?;
    let staging = tempfile::Builder::new()
        .prefix(".rt-archive-ingest")
        .tempdir_in(&config.out_dir)?;
    let staged_manifest = staging.path().join(MANIFEST_FILE);
    let staged_index = staging.path().join(&config.index_name);

    let (indexed, skipped) = {
        let staged_manifest = staged_manifest.clone();
        let staged_index = staged_index.clone();
        let batch_size = config.batch_size;
        let writer_heap_size = config.writer_heap_size;

        tokio::task::spawn_blocking(move || -> Result<(usize, usize)> {
            let mut writer = BufWriter::new(File::create(&staged_manifest)?);
            write_manifest(&mut writer, &tickets)?;
            writer.flush()?;

            build_index(&tickets, &staged_index, batch_size, writer_heap_size)
        })
        .await??
    };

    let manifest_path = config.manifest_path();
    let index_path = config.index_path();
    install_outputs(
        staging.path(),
        &staged_index,
        &index_path,
        &staged_manifest,
        &manifest_path,
    )?;

    let report = IngestReport {
        tickets: ticket_count,
        indexed,
        skipped,
        manifest_path,
        index_path,
        took: started.elapsed(),
    };

    tracing::info!(
        tickets = report.tickets,
        indexed = report.indexed,
        skipped = report.skipped,
        manifest = ?report.manifest_path,
        index = ?report.index_path,
        took_ms = report.took.as_millis() as u64,
        "Ingestion complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> ManifestEntry {
        ManifestEntry {
            id: id.to_string(),
            status: "open".to_string(),
            subject: format!("ticket {}", id),
            transactions: vec![],
        }
    }

    fn staged_outputs(out: &Path) -> tempfile::TempDir {
        let staging = tempfile::tempdir_in(out).unwrap();
        std::fs::create_dir(staging.path().join("index.tantivy")).unwrap();
        std::fs::write(staging.path().join("index.tantivy").join("new"), b"").unwrap();
        std::fs::write(staging.path().join("index.json"), b"[]").unwrap();
        std::fs::create_dir(out.join("index.tantivy")).unwrap();
        std::fs::write(out.join("index.tantivy").join("old"), b"").unwrap();
        staging
    }

    #[test]
    fn test_install_replaces_previous_outputs() {
        let out = tempfile::tempdir().unwrap();
        let staging = staged_outputs(out.path());
        std::fs::write(out.path().join("index.json"), b"[{}]").unwrap();

        install_outputs(
            staging.path(),
            &staging.path().join("index.tantivy"),
            &out.path().join("index.tantivy"),
            &staging.path().join("index.json"),
            &out.path().join("index.json"),
        )
        .unwrap();
        drop(staging);

        assert!(out.path().join("index.tantivy").join("new").exists());
        assert!(!out.path().join("index.tantivy").join("old").exists());
        assert_eq!(std::fs::read(out.path().join("index.json")).unwrap(), b"[]");
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_failed_install_keeps_previous_index() {
        let out = tempfile::tempdir().unwrap();
        let staging = staged_outputs(out.path());
        // A directory in the manifest's place makes the last rename fail
        let blocked = out.path().join("index.json");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), b"").unwrap();

        let result = install_outputs(
            staging.path(),
            &staging.path().join("index.tantivy"),
            &out.path().join("index.tantivy"),
            &staging.path().join("index.json"),
            &blocked,
        );

        assert!(result.is_err());
        assert!(out.path().join("index.tantivy").join("old").exists());
        assert!(!out.path().join("index.tantivy").join("new").exists());
    }

    #[test]
    fn test_ticket_file_pattern() {
        assert!(is_ticket_file("1.json"));
        assert!(is_ticket_file("123456.json"));
        assert!(!is_ticket_file("index.json"));
        assert!(!is_ticket_file("merged.json"));
        assert!(!is_ticket_file("12.json.bak"));
        assert!(!is_ticket_file("a12.json"));
        assert!(!is_ticket_file("rtgithub.csv"));
    }

    #[test]
    fn test_sort_is_numeric() {
        let mut tickets = vec![entry("100"), entry("9"), entry("x"), entry("20"), entry("1")];
        sort_tickets(&mut tickets);
        let ids: Vec<&str> = tickets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "9", "20", "100", "x"]);
    }

    #[test]
    fn test_build_index_skips_non_numeric_ids() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let tickets = vec![entry("1"), entry("two"), entry("3")];

        let (indexed, skipped) =
            build_index(&tickets, &temp_dir.path().join("idx"), 1, 50_000_000).unwrap();
        assert_eq!(indexed, 2);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_manifest_is_an_array() {
        let mut out = Vec::new();
        write_manifest(&mut out, &[entry("1")]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["Id"], "1");
        assert_eq!(value[0]["Transactions"], serde_json::json!([]));
    }
}
