use crate::storage::{is_valid_name, StorageError, StorageResult, TicketSource};
use async_trait::async_trait;
use memmap2::{Mmap, MmapOptions};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::ZipArchive;

/// A read-only mapping of the archive file, shared by every reader
#[derive(Clone)]
struct MappedArchive(Arc<Mmap>);

impl AsRef<[u8]> for MappedArchive {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

type Reader = ZipArchive<Cursor<MappedArchive>>;

/// Documents stored inside a single zip archive.
///
/// The file table is indexed once at open time; lookups afterwards are map
/// lookups. Each read decompresses from its own clone of the archive handle,
/// so concurrent reads never wait on each other. The mapping stays alive
/// until [`TicketSource::close`] is called and in-flight reads finish.
pub struct ArchiveSource {
    path: PathBuf,
    entries: HashMap<String, usize>,
    archive: RwLock<Option<Reader>>,
}

impl ArchiveSource {
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |message: String| StorageError::OpenFailed {
            location: path.clone(),
            message,
        };

        let file = File::open(&path).map_err(|e| open_failed(e.to_string()))?;
        // The export is treated as immutable while it is served
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .map_err(|e| open_failed(format!("memory map failed: {}", e)))?;
        let mut archive = ZipArchive::new(Cursor::new(MappedArchive(Arc::new(mmap))))
            .map_err(|e| open_failed(e.to_string()))?;

        let mut entries = HashMap::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| open_failed(e.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            entries.insert(entry.name().to_string(), index);
        }

        tracing::info!(
            archive = ?path,
            entries = entries.len(),
            "Opened archive ticket source"
        );

        Ok(Self {
            path,
            entries,
            archive: RwLock::new(Some(archive)),
        })
    }

    /// Number of file entries in the archive
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A private handle for one read; shares the mapping and file table
    fn reader(&self) -> StorageResult<Reader> {
        self.archive
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| StorageError::Closed {
                location: self.path.clone(),
            })
    }
}

#[async_trait]
impl TicketSource for ArchiveSource {
    fn location(&self) -> &Path {
        &self.path
    }

    async fn get_file(&self, name: &str) -> StorageResult<Vec<u8>> {
        let index = match self.entries.get(name) {
            Some(index) if is_valid_name(name) => *index,
            _ => return Err(StorageError::not_found(name, &self.path)),
        };

        let mut zip = self.reader()?;
        let name = name.to_string();

        tokio::task::spawn_blocking(move || {
            let read_failed = |message: String| StorageError::ReadFailed {
                name: name.clone(),
                message,
            };

            let mut entry = zip.by_index(index).map_err(|e| read_failed(e.to_string()))?;
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| read_failed(e.to_string()))?;
            Ok::<_, StorageError>(bytes)
        })
        .await
        .map_err(|e| StorageError::ReadFailed {
            name: self.path.display().to_string(),
            message: e.to_string(),
        })?
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .filter(|name| is_valid_name(name))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn close(&self) {
        if self.archive.write().take().is_some() {
            tracing::info!(archive = ?self.path, "Closed archive ticket source");
        }
    }
}
