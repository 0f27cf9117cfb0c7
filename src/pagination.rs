//! Query and pagination engine
//!
//! Turns the loosely typed parameters of a search request into a bounded,
//! id-ordered page of tickets with links to the neighbouring pages.
//! Malformed parameters never fail a request: each one falls back to its
//! default.

use crate::config::SearchSettings;
use crate::error::{AppError, Result};
use crate::search::{CancelSignal, SearchService, SortOrder, TicketHit, TicketQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Page sizes offered to clients
pub const PAGE_SIZES: [u64; 4] = [10, 25, 50, 100];

/// Largest accepted start offset; the engine adds offset and page size.
const MAX_START: u64 = u32::MAX as u64;

/// Raw search parameters as they arrive in a query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub q: String,

    /// Zero-based offset of the first hit
    pub start: Option<String>,

    /// Page size
    pub num: Option<String>,

    /// `"0"` ascending, `"1"` descending
    pub order: Option<String>,
}

impl SearchRequest {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }
}

/// Page size bounds
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 100,
        }
    }
}

impl From<&SearchSettings> for PageLimits {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            default_page_size: settings.default_page_size,
            max_page_size: settings.max_page_size,
        }
    }
}

/// Normalised search parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    pub query: String,
    pub start: u64,
    pub page_size: u64,
    pub order: SortOrder,
}

impl PageParams {
    pub fn from_request(request: &SearchRequest, limits: &PageLimits) -> Self {
        let start = request
            .start
            .as_deref()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0)
            .min(MAX_START);

        let page_size = match request
            .num
            .as_deref()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            Some(size) if size > 0 && size <= limits.max_page_size => size,
            _ => limits.default_page_size,
        };

        Self {
            query: request.q.trim().to_string(),
            start,
            page_size,
            order: SortOrder::from_flag(request.order.as_deref()),
        }
    }
}

/// Links to the neighbouring pages, as `?q=..&start=..&num=..&order=..`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub next: Option<String>,
    pub prev: Option<String>,
}

/// Compute the next and previous links of a page.
///
/// `next` exists iff `start + page_size < total`; `prev` exists iff
/// `start >= page_size`.
pub fn compute_links(
    query: &str,
    start: u64,
    page_size: u64,
    total: u64,
    order: SortOrder,
) -> PageLinks {
    let link = |offset: u64| {
        format!(
            "?q={}&start={}&num={}&order={}",
            urlencoding::encode(query),
            offset,
            page_size,
            order.as_flag()
        )
    };

    let next = start
        .checked_add(page_size)
        .filter(|&next| next < total)
        .map(&link);
    let prev = start.checked_sub(page_size).map(&link);

    PageLinks { next, prev }
}

/// One result row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketRow {
    pub id: String,
    pub status: String,
    pub subject: String,
}

impl From<TicketHit> for TicketRow {
    fn from(hit: TicketHit) -> Self {
        Self {
            id: hit.id.to_string(),
            status: hit.status,
            subject: hit.subject,
        }
    }
}

/// A page of search results
#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    pub query: String,

    /// Query syntax error, reported instead of failing the request
    pub error: Option<String>,

    pub tickets: Vec<TicketRow>,

    /// One-based position of the first row (0 when there are no hits)
    pub start: u64,

    /// One-based position of the last row
    pub end: u64,

    pub page_size: u64,
    pub total: u64,
    pub took_ms: u64,

    #[serde(flatten)]
    pub links: PageLinks,

    pub sizes: Vec<u64>,

    /// Order flag, `"0"` or `"1"`
    pub order: &'static str,
}

impl QueryPage {
    fn empty(params: &PageParams) -> Self {
        Self {
            query: params.query.clone(),
            error: None,
            tickets: Vec::new(),
            start: 0,
            end: 0,
            page_size: params.page_size,
            total: 0,
            took_ms: 0,
            links: PageLinks::default(),
            sizes: PAGE_SIZES.to_vec(),
            order: params.order.as_flag(),
        }
    }
}

/// Runs search requests against the full-text index
pub struct QueryEngine {
    service: Arc<SearchService>,
    limits: PageLimits,
}

impl QueryEngine {
    pub fn new(service: Arc<SearchService>, limits: PageLimits) -> Self {
        Self { service, limits }
    }

    pub fn service(&self) -> &Arc<SearchService> {
        &self.service
    }

    pub fn limits(&self) -> &PageLimits {
        &self.limits
    }

    /// Execute a search request.
    ///
    /// An empty query yields an empty page without touching the index. A
    /// query the parser rejects yields an empty page carrying the error.
    pub async fn execute(&self, request: &SearchRequest, signal: CancelSignal) -> Result<QueryPage> {
        let params = PageParams::from_request(request, &self.limits);
        let mut page = QueryPage::empty(&params);
        if params.query.is_empty() {
            return Ok(page);
        }

        let query = TicketQuery::new(&params.query)
            .with_order(params.order)
            .with_offset(params.start as usize)
            .with_limit(params.page_size as usize);

        let response = match self.service.search(&query, signal).await {
            Ok(response) => response,
            Err(err) if err.is_client_error() => {
                tracing::debug!(query = %params.query, error = %err, "Rejected search query");
                page.error = Some(err.to_string());
                return Ok(page);
            }
            Err(err) => return Err(AppError::from(err)),
        };

        let total = response.total_hits as u64;
        page.total = total;
        page.took_ms = response.took.as_millis() as u64;
        page.start = if total > 0 { params.start + 1 } else { 0 };
        page.end = params.start.saturating_add(params.page_size).min(total);
        page.links = compute_links(
            &params.query,
            params.start,
            params.page_size,
            total,
            params.order,
        );
        page.tickets = response.hits.into_iter().map(TicketRow::from).collect();

        tracing::info!(
            query = %params.query,
            start = params.start,
            page_size = params.page_size,
            total,
            took_ms = page.took_ms,
            "Search served"
        );

        Ok(page)
    }
}
