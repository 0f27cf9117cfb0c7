use crate::storage::{is_valid_name, StorageError, StorageResult, TicketSource};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Documents stored as loose files under a root directory.
///
/// Logical name `X` maps to `<root>/X`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StorageError::OpenFailed {
                location: root,
                message: "not a directory".to_string(),
            });
        }

        tracing::info!(root = ?root, "Opened directory ticket source");
        Ok(Self { root })
    }
}

#[async_trait]
impl TicketSource for DirectorySource {
    fn location(&self) -> &Path {
        &self.root
    }

    async fn get_file(&self, name: &str) -> StorageResult<Vec<u8>> {
        if !is_valid_name(name) {
            return Err(StorageError::not_found(name, &self.root));
        }

        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(name, &self.root))
            }
            Err(e) => Err(StorageError::ReadFailed {
                name: name.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let read_failed = |e: std::io::Error| StorageError::ReadFailed {
            name: self.root.display().to_string(),
            message: e.to_string(),
        };

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(read_failed)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
            let file_type = entry.file_type().await.map_err(read_failed)?;
            if !file_type.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}
