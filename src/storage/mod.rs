//! Storage backends for archived ticket data
//!
//! A ticket export is either a directory of loose files or a single zip
//! archive holding the same files. Both are exposed through [`TicketSource`],
//! which resolves a logical name (`index.json`, `1234.json`, `merged.json`)
//! to the document bytes.

mod archive;
mod directory;
mod error;
mod factory;

pub use archive::ArchiveSource;
pub use directory::DirectorySource;
pub use error::{StorageError, StorageResult};
pub use factory::open_source;

use async_trait::async_trait;
use std::path::Path;

/// Read-only access to the documents of one export
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Where the documents are read from
    fn location(&self) -> &Path;

    /// Read the whole document stored under `name`
    async fn get_file(&self, name: &str) -> StorageResult<Vec<u8>>;

    /// Read `<name>.json`
    async fn get_json(&self, name: &str) -> StorageResult<Vec<u8>> {
        self.get_file(&format!("{}.json", name)).await
    }

    /// Names of every top-level document, sorted
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Release any handle held on the underlying storage
    async fn close(&self) {}
}

/// Logical names are flat: anything that could climb out of the root is
/// treated as absent.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
