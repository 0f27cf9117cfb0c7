//! Search index management

use crate::search::document::{build_ticket_schema, SearchDocument, TicketDocument, TicketFields};
use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tantivy::collector::Count;
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher};

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Total number of documents in the index
    pub total_documents: u64,

    /// Index size in bytes
    pub index_size_bytes: u64,

    /// Number of segments
    pub num_segments: usize,
}

/// Read-only handle on a built ticket index.
///
/// An archive index is never written after it is built, so the reader is
/// loaded once and never reloaded.
pub struct IndexManager {
    /// The Tantivy index
    index: Index,

    /// The schema
    schema: Schema,

    /// Resolved ticket fields
    fields: TicketFields,

    /// Index reader
    reader: IndexReader,

    /// Index directory
    path: PathBuf,
}

impl IndexManager {
    /// Open an existing index
    pub fn open(path: &Path) -> SearchResult<Self> {
        if !index_exists(path) {
            return Err(SearchError::IndexNotFound(path.display().to_string()));
        }

        let index = Index::open_in_dir(path).map_err(|e| {
            SearchError::IndexInitFailed(format!("Failed to open existing index: {}", e))
        })?;
        let schema = index.schema();
        let fields = TicketFields::from_schema(&schema)?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create reader: {}", e)))?;

        tracing::info!(path = ?path, "Opened ticket search index");

        Ok(Self {
            index,
            schema,
            fields,
            reader,
            path: path.to_path_buf(),
        })
    }

    /// Get the schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Get the index
    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn fields(&self) -> &TicketFields {
        &self.fields
    }

    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    /// Get index statistics
    pub fn get_stats(&self) -> SearchResult<IndexStats> {
        let searcher = self.reader.searcher();

        // Count total documents
        let total_documents = searcher
            .search(&tantivy::query::AllQuery, &Count)
            .map_err(|e| SearchError::SearchFailed(format!("Failed to count documents: {}", e)))?
            as u64;

        let num_segments = searcher.segment_readers().len();

        // Calculate approximate index size
        let index_size_bytes = std::fs::read_dir(&self.path)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0);

        Ok(IndexStats {
            total_documents,
            index_size_bytes,
            num_segments,
        })
    }
}

/// Check if an index exists at the given path
pub fn index_exists(path: &Path) -> bool {
    path.join("meta.json").exists()
}

/// Writes a fresh ticket index, one committed batch at a time
pub struct IndexBuilder {
    fields: TicketFields,
    writer: IndexWriter,
    path: PathBuf,
    indexed: usize,
    batches: usize,
}

impl IndexBuilder {
    /// Create a new, empty index at `path`
    pub fn create(path: &Path, writer_heap_size: usize) -> SearchResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            SearchError::IndexInitFailed(format!("Failed to create index directory: {}", e))
        })?;

        let schema = build_ticket_schema();
        let fields = TicketFields::from_schema(&schema)?;
        let index = Index::create_in_dir(path, schema).map_err(|e| {
            SearchError::IndexInitFailed(format!("Failed to create new index: {}", e))
        })?;

        let writer = index
            .writer(writer_heap_size)
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            fields,
            writer,
            path: path.to_path_buf(),
            indexed: 0,
            batches: 0,
        })
    }

    /// Add and commit one batch of ticket documents
    pub fn add_batch(&mut self, documents: &[TicketDocument]) -> SearchResult<usize> {
        for document in documents {
            self.writer
                .add_document(document.to_tantivy_doc(&self.fields))
                .map_err(|e| {
                    SearchError::IndexingFailed(format!(
                        "Failed to add ticket {}: {}",
                        document.document_id(),
                        e
                    ))
                })?;
        }

        self.writer
            .commit()
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to commit batch: {}", e)))?;

        self.indexed += documents.len();
        self.batches += 1;
        tracing::debug!(
            batch = self.batches,
            size = documents.len(),
            indexed = self.indexed,
            "Committed index batch"
        );

        Ok(documents.len())
    }

    /// Wait for background merges and release the writer lock
    pub fn finish(self) -> SearchResult<usize> {
        self.writer.wait_merging_threads().map_err(|e| {
            SearchError::IndexingFailed(format!("Failed to finish merging: {}", e))
        })?;

        tracing::info!(
            path = ?self.path,
            documents = self.indexed,
            batches = self.batches,
            "Finished building ticket index"
        );

        Ok(self.indexed)
    }
}
