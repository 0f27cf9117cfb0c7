use crate::models::{id_string, nullable_seq, nullable_string};
use serde::{Deserialize, Serialize};

/// One ticket of the manifest (`index.json`).
///
/// Transactions and attachments keep the positions they have in the full
/// ticket document; those positions are used as direct addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestEntry {
    #[serde(deserialize_with = "id_string")]
    pub id: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub status: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub subject: String,

    #[serde(default, deserialize_with = "nullable_seq")]
    pub transactions: Vec<ManifestTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestTransaction {
    #[serde(deserialize_with = "id_string")]
    pub id: String,

    #[serde(default, deserialize_with = "nullable_seq")]
    pub attachments: Vec<ManifestAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestAttachment {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

impl ManifestEntry {
    /// The ticket id as a number, if it is one
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }

    /// Total number of attachments across all transactions
    pub fn attachment_count(&self) -> usize {
        self.transactions.iter().map(|t| t.attachments.len()).sum()
    }
}
