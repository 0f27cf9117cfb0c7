//! Ticket repository
//!
//! Combines a [`TicketSource`] with the attachment [`OffsetIndex`] and the
//! optional cross-reference maps shipped with an export.

use crate::error::{AppError, Result};
use crate::models::{Attachment, StoredAttachment, TicketMeta, TicketView};
use crate::offsets::{AttachmentOffset, OffsetIndex};
use crate::storage::TicketSource;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Manifest document name (`index.json`)
pub const MANIFEST_NAME: &str = "index";

/// Merged-ticket map document name (`merged.json`)
pub const MERGED_NAME: &str = "merged";

/// RT ticket to GitHub issue map
pub const GITHUB_MAP_FILE: &str = "rtgithub.csv";

/// Read-only access to tickets and their attachments
pub struct TicketRepository {
    source: Arc<dyn TicketSource>,
    offsets: OffsetIndex,
    merged: HashMap<String, String>,
    github: HashMap<String, String>,
    cache: Option<Cache<String, Arc<Value>>>,
}

impl TicketRepository {
    /// Load the manifest and the optional maps from `source`.
    ///
    /// `cache_size` bounds the number of parsed tickets kept in memory; 0
    /// disables caching.
    pub async fn open(source: Arc<dyn TicketSource>, cache_size: u64) -> Result<Self> {
        let manifest = source.get_json(MANIFEST_NAME).await?;
        let offsets =
            tokio::task::spawn_blocking(move || OffsetIndex::load(manifest.as_slice())).await??;

        let merged = match source.get_json(MERGED_NAME).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AppError::MalformedDocument(format!("merged.json: {}", e)))?,
            Err(err) if err.is_not_found() => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        let github = match source.get_file(GITHUB_MAP_FILE).await {
            Ok(bytes) => parse_github_map(&bytes)?,
            Err(err) if err.is_not_found() => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        let cache = (cache_size > 0).then(|| Cache::builder().max_capacity(cache_size).build());

        tracing::info!(
            location = ?source.location(),
            tickets = offsets.ticket_count(),
            attachments = offsets.len(),
            merged = merged.len(),
            github_issues = github.len(),
            cache_size,
            "Ticket repository ready"
        );

        Ok(Self {
            source,
            offsets,
            merged,
            github,
            cache,
        })
    }

    /// Fetch and parse the document of ticket `id`
    pub async fn get_ticket(&self, id: &str) -> Result<Arc<Value>> {
        if let Some(cache) = &self.cache {
            if let Some(document) = cache.get(id).await {
                return Ok(document);
            }
        }

        let bytes = self.source.get_json(id).await?;
        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::MalformedDocument(format!("ticket {}: {}", id, e)))?;
        let document = Arc::new(document);

        if let Some(cache) = &self.cache {
            cache.insert(id.to_string(), Arc::clone(&document)).await;
        }

        Ok(document)
    }

    /// Fetch ticket `id` with its known fields and cross references resolved
    pub async fn get_ticket_view(&self, id: &str) -> Result<TicketView> {
        let document = self.get_ticket(id).await?;
        let meta = TicketMeta::from_document(&document)
            .map_err(|e| AppError::MalformedDocument(format!("ticket {}: {}", id, e)))?;

        Ok(TicketView {
            github_issue: self.github.get(&meta.id).cloned(),
            github_url: None,
            merged_into: self.merged.get(id).cloned(),
            meta,
            document,
        })
    }

    /// Resolve an attachment id to its filename, content type and bytes
    pub async fn get_attachment(&self, attachment_id: &str) -> Result<Attachment> {
        let offset = self.offsets.lookup(attachment_id)?;

        let document = match self.get_ticket(&offset.ticket_id).await {
            Ok(document) => document,
            Err(err) if err.is_not_found() => {
                tracing::error!(
                    attachment_id = %attachment_id,
                    ticket_id = %offset.ticket_id,
                    "Manifest references a missing ticket"
                );
                return Err(AppError::IntegrityViolation(format!(
                    "attachment {} belongs to ticket {}, which does not exist",
                    attachment_id, offset.ticket_id
                )));
            }
            Err(err) => return Err(err),
        };

        let stored = locate(&document, offset, attachment_id)?;
        let stored = StoredAttachment::deserialize(stored).map_err(|e| {
            AppError::MalformedAttachment(format!("attachment {}: {}", attachment_id, e))
        })?;

        if let Some(stored_id) = stored.id.as_deref() {
            if stored_id != attachment_id {
                tracing::error!(
                    attachment_id = %attachment_id,
                    stored_id = %stored_id,
                    offset = %offset,
                    "Offset index points at a different attachment"
                );
                return Err(AppError::IntegrityViolation(format!(
                    "{} holds attachment {}, not {}",
                    offset, stored_id, attachment_id
                )));
            }
        }

        let content = stored.decode_content().map_err(|e| {
            AppError::MalformedAttachment(format!("attachment {}: {}", attachment_id, e))
        })?;

        tracing::debug!(
            attachment_id = %attachment_id,
            ticket_id = %offset.ticket_id,
            content_type = %stored.content_type,
            size = content.len(),
            "Resolved attachment"
        );

        Ok(Attachment {
            filename: stored.filename,
            content_type: stored.content_type,
            content,
        })
    }

    /// The ticket `id` was ultimately merged into, following chains of
    /// merges. `None` when it was never merged or the chain loops.
    pub fn canonical_id(&self, id: &str) -> Option<&str> {
        resolve_merge(&self.merged, id)
    }

    pub fn offsets(&self) -> &OffsetIndex {
        &self.offsets
    }

    /// Release the underlying storage
    pub async fn close(&self) {
        self.source.close().await;
    }
}

fn resolve_merge<'a>(merged: &'a HashMap<String, String>, id: &str) -> Option<&'a str> {
    let mut current = merged.get(id)?.as_str();
    let mut seen = HashSet::from([id]);

    while let Some(next) = merged.get(current) {
        if !seen.insert(current) {
            tracing::warn!(ticket_id = %id, "Merged ticket map contains a cycle");
            return None;
        }
        current = next.as_str();
    }
    Some(current)
}

/// Walk `Transactions[t].Attachments[a]` of a ticket document
fn locate<'a>(
    document: &'a Value,
    offset: &AttachmentOffset,
    attachment_id: &str,
) -> Result<&'a Value> {
    let transactions = sequence(document, "Transactions");
    let Some(transaction) = transactions.get(offset.transaction) else {
        tracing::error!(
            attachment_id = %attachment_id,
            ticket_id = %offset.ticket_id,
            transaction = offset.transaction,
            attachment = offset.attachment,
            transactions = transactions.len(),
            "Transaction position out of range"
        );
        return Err(AppError::IntegrityViolation(format!(
            "{} but the ticket has {} transactions",
            offset,
            transactions.len()
        )));
    };

    let attachments = sequence(transaction, "Attachments");
    attachments.get(offset.attachment).ok_or_else(|| {
        tracing::error!(
            attachment_id = %attachment_id,
            ticket_id = %offset.ticket_id,
            transaction = offset.transaction,
            attachment = offset.attachment,
            attachments = attachments.len(),
            "Attachment position out of range"
        );
        AppError::IntegrityViolation(format!(
            "{} but the transaction has {} attachments",
            offset,
            attachments.len()
        ))
    })
}

fn sequence<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Parse `ticket_id,github_issue` rows
fn parse_github_map(bytes: &[u8]) -> Result<HashMap<String, String>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| AppError::MalformedDocument(format!("{}: {}", GITHUB_MAP_FILE, e)))?;

    let mut map = HashMap::new();
    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (ticket, issue) = line.split_once(',').ok_or_else(|| {
            AppError::MalformedDocument(format!(
                "{} line {}: expected two columns",
                GITHUB_MAP_FILE,
                line_number + 1
            ))
        })?;
        map.insert(unquote(ticket).to_string(), unquote(issue).to_string());
    }
    Ok(map)
}

fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_map() {
        let map = parse_github_map(b"1,12\n\"2\",\"17\"\n\n3, 40\n").unwrap();
        assert_eq!(map.get("1").map(String::as_str), Some("12"));
        assert_eq!(map.get("2").map(String::as_str), Some("17"));
        assert_eq!(map.get("3").map(String::as_str), Some("40"));
    }

    #[test]
    fn test_github_map_rejects_single_column() {
        assert!(matches!(
            parse_github_map(b"1,12\n2\n"),
            Err(AppError::MalformedDocument(_))
        ));
    }

    fn merged(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }

    #[test]
    fn test_merge_chains_resolve_to_the_last_ticket() {
        let map = merged(&[("99", "100"), ("100", "101"), ("7", "8")]);
        assert_eq!(resolve_merge(&map, "99"), Some("101"));
        assert_eq!(resolve_merge(&map, "100"), Some("101"));
        assert_eq!(resolve_merge(&map, "7"), Some("8"));
        assert_eq!(resolve_merge(&map, "101"), None);
    }

    #[test]
    fn test_merge_cycles_resolve_to_nothing() {
        let map = merged(&[
            ("99", "100"),
            ("100", "99"),
            ("5", "5"),
            ("1", "2"),
            ("2", "3"),
            ("3", "2"),
        ]);
        assert_eq!(resolve_merge(&map, "99"), None);
        assert_eq!(resolve_merge(&map, "100"), None);
        assert_eq!(resolve_merge(&map, "5"), None);
        assert_eq!(resolve_merge(&map, "1"), None);
    }

    #[test]
    fn test_locate_out_of_range() {
        let doc = serde_json::json!({
            "Transactions": [{"Attachments": [{"Id": "a"}]}]
        });
        let offset = |transaction, attachment| AttachmentOffset {
            ticket_id: "1".to_string(),
            transaction,
            attachment,
        };

        assert!(locate(&doc, &offset(0, 0), "a").is_ok());
        assert!(matches!(
            locate(&doc, &offset(1, 0), "a"),
            Err(AppError::IntegrityViolation(_))
        ));
        assert!(matches!(
            locate(&doc, &offset(0, 3), "a"),
            Err(AppError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn test_null_sequences_are_empty() {
        let doc = serde_json::json!({"Transactions": null});
        assert!(sequence(&doc, "Transactions").is_empty());
        assert!(sequence(&doc, "Missing").is_empty());
    }
}
