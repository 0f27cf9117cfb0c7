//! Attachment offset index
//!
//! Maps every attachment id to the ticket holding it and to its position
//! inside that ticket's document, so an attachment can be served without
//! searching the ticket tree. The index is derived from the manifest at
//! startup and never persisted.

use crate::error::{AppError, Result};
use crate::models::ManifestEntry;
use serde::de::{self, DeserializeSeed, SeqAccess, Visitor};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

/// Location of an attachment inside its ticket document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentOffset {
    /// Owning ticket
    pub ticket_id: String,

    /// Zero-based position in the ticket's `Transactions`
    pub transaction: usize,

    /// Zero-based position in that transaction's `Attachments`
    pub attachment: usize,
}

impl fmt::Display for AttachmentOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticket {} transaction #{} attachment #{}",
            self.ticket_id, self.transaction, self.attachment
        )
    }
}

/// Read-only map from attachment id to [`AttachmentOffset`]
#[derive(Debug, Default)]
pub struct OffsetIndex {
    offsets: HashMap<String, AttachmentOffset>,
    tickets: usize,
}

impl OffsetIndex {
    /// Build the index by decoding a manifest document one entry at a time.
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let mut index = OffsetIndex::default();
        let mut deserializer = serde_json::Deserializer::from_reader(reader);

        ManifestSeed { index: &mut index }
            .deserialize(&mut deserializer)
            .map_err(|e| AppError::MalformedManifest(e.to_string()))?;
        deserializer
            .end()
            .map_err(|e| AppError::MalformedManifest(e.to_string()))?;

        tracing::info!(
            tickets = index.tickets,
            attachments = index.offsets.len(),
            "Loaded attachment offset index"
        );

        Ok(index)
    }

    /// Build the index from entries already in memory
    pub fn from_entries<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a ManifestEntry>,
    {
        let mut index = OffsetIndex::default();
        for entry in entries {
            index
                .insert_entry(entry)
                .map_err(AppError::MalformedManifest)?;
        }
        Ok(index)
    }

    /// Record every attachment of `entry`.
    ///
    /// Attachment ids are globally unique in the tracker, so an id already
    /// mapped somewhere else is rejected.
    fn insert_entry(&mut self, entry: &ManifestEntry) -> std::result::Result<(), String> {
        for (transaction, tx) in entry.transactions.iter().enumerate() {
            for (attachment, att) in tx.attachments.iter().enumerate() {
                let offset = AttachmentOffset {
                    ticket_id: entry.id.clone(),
                    transaction,
                    attachment,
                };

                match self.offsets.get(&att.id) {
                    Some(existing) if *existing != offset => {
                        return Err(format!(
                            "attachment {} is at {} and at {}",
                            att.id, existing, offset
                        ));
                    }
                    Some(_) => {}
                    None => {
                        self.offsets.insert(att.id.clone(), offset);
                    }
                }
            }
        }

        self.tickets += 1;
        Ok(())
    }

    /// Locate an attachment, failing with `NotFound` when it is unknown
    pub fn lookup(&self, attachment_id: &str) -> Result<&AttachmentOffset> {
        self.offsets.get(attachment_id).ok_or_else(|| {
            AppError::NotFound(format!("no metadata for attachment {}", attachment_id))
        })
    }

    pub fn get(&self, attachment_id: &str) -> Option<&AttachmentOffset> {
        self.offsets.get(attachment_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttachmentOffset)> {
        self.offsets.iter().map(|(id, offset)| (id.as_str(), offset))
    }

    /// Number of attachments indexed
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Number of manifest entries processed
    pub fn ticket_count(&self) -> usize {
        self.tickets
    }
}

struct ManifestSeed<'a> {
    index: &'a mut OffsetIndex,
}

impl<'de, 'a> DeserializeSeed<'de> for ManifestSeed<'a> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'a> Visitor<'de> for ManifestSeed<'a> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an array of manifest entries")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(entry) = seq.next_element::<ManifestEntry>()? {
            self.index.insert_entry(&entry).map_err(de::Error::custom)?;
        }
        Ok(())
    }
}
