//! Search query building

use serde::{Deserialize, Serialize};

/// Sort order for search results (by ticket id)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Parse the wire flag: `"0"` ascending, `"1"` descending. Anything else
    /// falls back to descending.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("0") => SortOrder::Ascending,
            _ => SortOrder::Descending,
        }
    }

    pub fn as_flag(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "0",
            SortOrder::Descending => "1",
        }
    }

    pub(crate) fn as_tantivy(&self) -> tantivy::Order {
        match self {
            SortOrder::Ascending => tantivy::Order::Asc,
            SortOrder::Descending => tantivy::Order::Desc,
        }
    }
}

/// Query string that selects every ticket
pub const ALL_TICKETS_QUERY: &str = "status:*";

/// What the full-text engine is asked to match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryText {
    /// Every ticket of any status
    AllTickets,

    /// A query-parser expression over `subject` and `status`
    Expression(String),
}

impl QueryText {
    /// `*` and `status:*` match everything; they are rewritten so the
    /// engine never expands a wildcard over the whole term dictionary.
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "*" | ALL_TICKETS_QUERY => QueryText::AllTickets,
            other => QueryText::Expression(other.to_string()),
        }
    }
}

/// A bounded, ordered ticket search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketQuery {
    pub text: QueryText,

    pub order: SortOrder,

    /// Number of results to skip
    pub offset: usize,

    /// Maximum number of results (at least 1)
    pub limit: usize,

    /// Produce highlighted subject fragments
    pub highlight: bool,
}

impl TicketQuery {
    pub fn new(text: &str) -> Self {
        Self {
            text: QueryText::parse(text),
            order: SortOrder::default(),
            offset: 0,
            limit: 10,
            highlight: false,
        }
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_highlight(mut self, highlight: bool) -> Self {
        self.highlight = highlight;
        self
    }
}
