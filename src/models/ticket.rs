use crate::models::{id_string, nullable_string, optional_id};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// The ticket fields the archive reads directly; everything else stays in
/// the raw document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TicketMeta {
    #[serde(deserialize_with = "id_string")]
    pub id: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub status: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub subject: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub queue: String,
}

impl TicketMeta {
    pub fn from_document(document: &Value) -> Result<Self, serde_json::Error> {
        TicketMeta::deserialize(document)
    }
}

/// A ticket ready for display: typed metadata, cross references resolved at
/// load time, and the untouched document for everything else.
#[derive(Debug, Clone, Serialize)]
pub struct TicketView {
    #[serde(flatten)]
    pub meta: TicketMeta,

    /// Issue number this ticket was migrated to, if any
    pub github_issue: Option<String>,

    /// Link to that issue, when the site has a GitHub prefix configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,

    /// Canonical ticket when this one was merged into another
    pub merged_into: Option<String>,

    pub document: Arc<Value>,
}

/// An attachment as stored inside a ticket document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredAttachment {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "nullable_string")]
    pub filename: String,

    pub content_type: String,

    pub original_content: String,
}

impl StoredAttachment {
    /// `text/*` bodies are stored verbatim, everything else as base64.
    pub fn decode_content(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.content_type.starts_with("text/") {
            Ok(self.original_content.as_bytes().to_vec())
        } else {
            base64::engine::general_purpose::STANDARD.decode(&self.original_content)
        }
    }
}

/// An attachment resolved for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}
