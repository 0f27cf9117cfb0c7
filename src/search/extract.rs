//! Locating the index on disk: extraction from an archive and waiting for a
//! synced index to appear.

use crate::search::error::{SearchError, SearchResult};
use crate::search::index::index_exists;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use zip::ZipArchive;

/// Whether `path` names a zip archive rather than an index directory
pub fn is_zipped_index(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Extract the `index_name/` tree of `archive_path` into a temporary
/// directory.
///
/// The returned [`TempDir`] owns the extracted files and must outlive every
/// handle opened on the returned index path.
pub fn extract_index(archive_path: &Path, index_name: &str) -> SearchResult<(TempDir, PathBuf)> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| {
        SearchError::IndexInitFailed(format!(
            "Failed to open {}: {}",
            archive_path.display(),
            e
        ))
    })?;

    let temp_dir = tempfile::Builder::new().prefix("rt-archive-index").tempdir()?;
    let target = temp_dir.path().join(index_name);
    std::fs::create_dir_all(&target)?;

    let mut extracted = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| {
            SearchError::IndexInitFailed(format!("Failed to read archive entry {}: {}", i, e))
        })?;
        if entry.is_dir() {
            continue;
        }

        // Entries with absolute or `..` paths have no enclosed name
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let Ok(relative) = name.strip_prefix(index_name) else {
            continue;
        };

        let destination = target.join(relative);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&destination)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }

    if extracted == 0 {
        return Err(SearchError::IndexNotFound(format!(
            "{} has no {}/ entries",
            archive_path.display(),
            index_name
        )));
    }

    tracing::info!(
        archive = ?archive_path,
        files = extracted,
        target = ?target,
        "Extracted search index"
    );

    Ok((temp_dir, target))
}

/// Wait until an index exists at `path`, looking `retries + 1` times.
pub async fn wait_for_index(path: &Path, retries: u32, interval: Duration) -> SearchResult<()> {
    for attempt in 0..=retries {
        if index_exists(path) {
            return Ok(());
        }
        if attempt < retries {
            tracing::info!(
                path = ?path,
                attempt = attempt + 1,
                retries,
                "Search index not present yet, waiting"
            );
            tokio::time::sleep(interval).await;
        }
    }

    Err(SearchError::IndexNotFound(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_zip_detection() {
        assert!(is_zipped_index(Path::new("out/archive.zip")));
        assert!(is_zipped_index(Path::new("OUT.ZIP")));
        assert!(!is_zipped_index(Path::new("out/index.tantivy")));
    }

    #[test]
    fn test_extracts_only_the_index_tree() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("data.zip");
        write_zip(
            &zip_path,
            &[
                ("1.json", b"{}"),
                ("index.tantivy/meta.json", b"{}"),
                ("index.tantivy/seg/abc.idx", b"data"),
            ],
        );

        let (_guard, index_path) = extract_index(&zip_path, "index.tantivy").unwrap();
        assert!(index_path.join("meta.json").exists());
        assert!(index_path.join("seg/abc.idx").exists());
        assert!(!index_path.join("1.json").exists());
    }

    #[test]
    fn test_archive_without_index() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("data.zip");
        write_zip(&zip_path, &[("1.json", b"{}")]);

        let err = extract_index(&zip_path, "index.tantivy").unwrap_err();
        assert!(matches!(err, SearchError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn test_wait_gives_up() {
        let temp_dir = TempDir::new().unwrap();
        let err = wait_for_index(temp_dir.path(), 2, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn test_wait_returns_once_present() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("meta.json"), b"{}").unwrap();
        wait_for_index(temp_dir.path(), 0, Duration::from_secs(60))
            .await
            .unwrap();
    }
}
