//! Search document structures and indexing

use crate::models::ManifestEntry;
use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use tantivy::schema::*;
use tantivy::TantivyDocument;

/// Trait for documents that can be indexed and searched
pub trait SearchDocument {
    /// Convert to Tantivy document
    fn to_tantivy_doc(&self, fields: &TicketFields) -> TantivyDocument;

    /// Get document ID
    fn document_id(&self) -> u64;
}

/// The searchable projection of a ticket: no transaction or attachment
/// content ever reaches the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDocument {
    /// Ticket number
    pub id: u64,

    /// Ticket status (new, open, resolved, ...)
    pub status: String,

    /// Ticket subject
    pub subject: String,
}

impl TicketDocument {
    /// Project a manifest entry; `None` when its id is not numeric.
    pub fn from_entry(entry: &ManifestEntry) -> Option<Self> {
        Some(Self {
            id: entry.numeric_id()?,
            status: entry.status.clone(),
            subject: entry.subject.clone(),
        })
    }
}

impl SearchDocument for TicketDocument {
    fn to_tantivy_doc(&self, fields: &TicketFields) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_u64(fields.id, self.id);
        doc.add_text(fields.status, &self.status);
        doc.add_text(fields.subject, &self.subject);
        doc
    }

    fn document_id(&self) -> u64 {
        self.id
    }
}

/// Field handles of the ticket schema
#[derive(Debug, Clone, Copy)]
pub struct TicketFields {
    pub id: Field,
    pub status: Field,
    pub subject: Field,
}

impl TicketFields {
    /// Resolve the ticket fields, failing if an opened index has a
    /// different schema.
    pub fn from_schema(schema: &Schema) -> SearchResult<Self> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaError(format!("index has no {} field", name)))
        };

        Ok(Self {
            id: field("id")?,
            status: field("status")?,
            subject: field("subject")?,
        })
    }
}

/// Build the search schema for tickets
pub fn build_ticket_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // ID - numeric, fast for sorting and range queries
    schema_builder.add_u64_field("id", INDEXED | STORED | FAST);

    // Status - tokenized, stored for result rows
    schema_builder.add_text_field("status", TEXT | STORED);

    // Subject - stemmed, positions kept for phrase queries and highlighting
    let subject_indexing = TextFieldIndexing::default()
        .set_tokenizer("en_stem")
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    schema_builder.add_text_field(
        "subject",
        TextOptions::default()
            .set_indexing_options(subject_indexing)
            .set_stored(),
    );

    schema_builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ManifestTransaction;

    fn entry(id: &str) -> ManifestEntry {
        ManifestEntry {
            id: id.to_string(),
            status: "open".to_string(),
            subject: "Segfault in regex engine".to_string(),
            transactions: vec![ManifestTransaction {
                id: "1".to_string(),
                attachments: vec![],
            }],
        }
    }

    #[test]
    fn test_entry_to_document() {
        let doc = TicketDocument::from_entry(&entry("1234")).unwrap();
        assert_eq!(doc.id, 1234);
        assert_eq!(doc.status, "open");
        assert_eq!(doc.document_id(), 1234);
    }

    #[test]
    fn test_non_numeric_id_is_skipped() {
        assert!(TicketDocument::from_entry(&entry("abc")).is_none());
    }

    #[test]
    fn test_schema_building() {
        let schema = build_ticket_schema();
        let fields = TicketFields::from_schema(&schema).unwrap();

        assert!(schema.get_field_entry(fields.id).is_fast());
        assert!(schema.get_field_entry(fields.subject).is_stored());
        assert!(schema.get_field_entry(fields.status).is_indexed());
    }

    #[test]
    fn test_foreign_schema_is_rejected() {
        let mut builder = Schema::builder();
        builder.add_text_field("title", TEXT);
        let schema = builder.build();

        assert!(matches!(
            TicketFields::from_schema(&schema),
            Err(SearchError::SchemaError(_))
        ));
    }
}
