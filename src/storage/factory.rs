use crate::storage::{ArchiveSource, DirectorySource, StorageResult, TicketSource};
use std::path::Path;
use std::sync::Arc;

/// Create a ticket source for `path`: a `.zip` file opens as an archive,
/// anything else as a directory.
pub fn open_source(path: &Path) -> StorageResult<Arc<dyn TicketSource>> {
    if is_archive_path(path) {
        tracing::info!(path = ?path, "Initializing archive storage backend");
        Ok(Arc::new(ArchiveSource::open(path)?))
    } else {
        tracing::info!(path = ?path, "Initializing directory storage backend");
        Ok(Arc::new(DirectorySource::new(path)?))
    }
}

pub(crate) fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}
