//! Main search service implementation

use crate::search::cancel::{CancelSignal, Cancellable};
use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};
use crate::search::index::{IndexManager, IndexStats};
use crate::search::query::{QueryText, TicketQuery};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, Query, QueryParser};
use tantivy::schema::Value;
use tantivy::{DocAddress, Searcher, SnippetGenerator, TantivyDocument};
use tokio::task::JoinError;

/// A highlighted subject fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// Text of the fragment
    pub fragment: String,

    /// Byte ranges of `fragment` that matched the query
    pub ranges: Vec<Range<usize>>,
}

impl Highlight {
    /// Render the fragment with matches in bold for a terminal
    pub fn render_ansi(&self) -> String {
        let mut out = String::with_capacity(self.fragment.len() + self.ranges.len() * 8);
        let mut cursor = 0;
        for range in &self.ranges {
            let (Some(before), Some(matched)) = (
                self.fragment.get(cursor..range.start),
                self.fragment.get(range.clone()),
            ) else {
                continue;
            };
            out.push_str(before);
            out.push_str("\x1b[1m");
            out.push_str(matched);
            out.push_str("\x1b[0m");
            cursor = range.end;
        }
        out.push_str(self.fragment.get(cursor..).unwrap_or_default());
        out
    }
}

/// A single search result hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketHit {
    /// Ticket number
    pub id: u64,

    /// Ticket status
    pub status: String,

    /// Ticket subject
    pub subject: String,

    /// Highlighted subject (if highlighting was requested)
    pub highlight: Option<Highlight>,
}

/// Search response with results and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Search results
    pub hits: Vec<TicketHit>,

    /// Total number of hits (before pagination)
    pub total_hits: usize,

    /// Search execution time
    pub took: Duration,
}

/// Main search service
pub struct SearchService {
    /// Index manager
    index_manager: Arc<IndexManager>,

    /// Configuration
    config: SearchConfig,
}

impl SearchService {
    /// Open the index named by `config`
    pub fn open(config: SearchConfig) -> SearchResult<Self> {
        let index_manager = Arc::new(IndexManager::open(&config.index_path)?);

        Ok(Self {
            index_manager,
            config,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search for tickets, sorted by id.
    ///
    /// The search runs on the blocking pool. Cancelling `signal`, or running
    /// past the configured deadline, abandons it at the next segment boundary.
    pub async fn search(
        &self,
        query: &TicketQuery,
        signal: CancelSignal,
    ) -> SearchResult<SearchResponse> {
        let manager = Arc::clone(&self.index_manager);
        let query = query.clone();
        let task_signal = signal.clone();
        let deadline = self.config.search_timeout;

        let task = tokio::task::spawn_blocking(move || execute(&manager, &query, &task_signal));
        with_deadline(task, deadline, &signal).await
    }

    /// Get index statistics
    pub fn get_stats(&self) -> SearchResult<IndexStats> {
        self.index_manager.get_stats()
    }
}

/// Await a search task, cancelling `signal` once `deadline` passes
async fn with_deadline<F>(
    task: F,
    deadline: Duration,
    signal: &CancelSignal,
) -> SearchResult<SearchResponse>
where
    F: Future<Output = Result<SearchResult<SearchResponse>, JoinError>>,
{
    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(Ok(response))) => Ok(response),
        Ok(Ok(Err(err))) if signal.is_cancelled() => {
            tracing::debug!(error = %err, "Search abandoned after cancellation");
            Err(SearchError::Cancelled)
        }
        Ok(Ok(Err(err))) => Err(err),
        Ok(Err(join_err)) => Err(SearchError::SearchFailed(format!(
            "Search task failed: {}",
            join_err
        ))),
        Err(_) => {
            signal.cancel();
            tracing::warn!(timeout = ?deadline, "Search exceeded its deadline");
            Err(SearchError::Timeout(deadline))
        }
    }
}

fn build_query(manager: &IndexManager, text: &QueryText) -> SearchResult<Box<dyn Query>> {
    match text {
        QueryText::AllTickets => Ok(Box::new(AllQuery)),
        QueryText::Expression(expression) => {
            let fields = manager.fields();
            let parser = QueryParser::for_index(manager.index(), vec![fields.subject, fields.status]);
            Ok(parser.parse_query(expression)?)
        }
    }
}

fn execute(
    manager: &IndexManager,
    query: &TicketQuery,
    signal: &CancelSignal,
) -> SearchResult<SearchResponse> {
    let start_time = Instant::now();
    let tantivy_query = build_query(manager, &query.text)?;
    let searcher = manager.searcher();

    // The collector heap holds offset + limit entries; nothing past the
    // document count can be returned anyway.
    let num_docs = searcher.num_docs() as usize;
    let limit = query.limit.min(num_docs).max(1);
    let offset = query.offset.min(num_docs);

    let collector = Cancellable::new(
        (
            Count,
            TopDocs::with_limit(limit)
                .and_offset(offset)
                .order_by_fast_field::<u64>("id", query.order.as_tantivy()),
        ),
        signal.clone(),
    );

    let (total_hits, top_docs) = searcher
        .search(&*tantivy_query, &collector)
        .map_err(|e| SearchError::SearchFailed(format!("Search execution failed: {}", e)))?;

    let snippets = if query.highlight {
        Some(
            SnippetGenerator::create(&searcher, &*tantivy_query, manager.fields().subject)
                .map_err(|e| {
                    SearchError::SearchFailed(format!("Failed to prepare highlighting: {}", e))
                })?,
        )
    } else {
        None
    };

    let mut hits = Vec::with_capacity(top_docs.len());
    for (_, doc_address) in top_docs {
        hits.push(load_hit(manager, &searcher, doc_address, snippets.as_ref())?);
    }

    let took = start_time.elapsed();
    tracing::debug!(
        total_hits,
        returned = hits.len(),
        offset = query.offset,
        took_ms = took.as_millis() as u64,
        "Search completed"
    );

    Ok(SearchResponse {
        hits,
        total_hits,
        took,
    })
}

/// Convert a stored document to a TicketHit
fn load_hit(
    manager: &IndexManager,
    searcher: &Searcher,
    address: DocAddress,
    snippets: Option<&SnippetGenerator>,
) -> SearchResult<TicketHit> {
    let fields = manager.fields();
    let doc: TantivyDocument = searcher
        .doc(address)
        .map_err(|e| SearchError::SearchFailed(format!("Failed to retrieve doc: {}", e)))?;

    let id = doc
        .get_first(fields.id)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| SearchError::SchemaError("stored document has no id".to_string()))?;
    let text = |field| {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let status = text(fields.status);
    let subject = text(fields.subject);

    let highlight = snippets.map(|generator| {
        let snippet = generator.snippet_from_doc(&doc);
        if snippet.fragment().is_empty() {
            Highlight {
                fragment: subject.clone(),
                ranges: Vec::new(),
            }
        } else {
            Highlight {
                fragment: snippet.fragment().to_string(),
                ranges: snippet.highlighted().to_vec(),
            }
        }
    });

    Ok(TicketHit {
        id,
        status,
        subject,
        highlight,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::document::TicketDocument;
    use crate::search::index::IndexBuilder;
    use crate::search::query::SortOrder;
    use crate::search::SearchConfigBuilder;
    use tempfile::TempDir;

    fn build_service(temp_dir: &TempDir, tickets: &[(u64, &str, &str)]) -> SearchService {
        let path = temp_dir.path().join("index.tantivy");
        let mut builder = IndexBuilder::create(&path, 50_000_000).unwrap();
        let docs: Vec<TicketDocument> = tickets
            .iter()
            .map(|(id, status, subject)| TicketDocument {
                id: *id,
                status: status.to_string(),
                subject: subject.to_string(),
            })
            .collect();
        builder.add_batch(&docs).unwrap();
        builder.finish().unwrap();

        SearchService::open(SearchConfigBuilder::new().index_path(path).build()).unwrap()
    }

    fn sample(temp_dir: &TempDir) -> SearchService {
        build_service(
            temp_dir,
            &[
                (3, "open", "Regex engine crashes on lookbehind"),
                (1, "resolved", "Typo in perlfunc"),
                (7, "open", "Memory leak in regex compilation"),
                (5, "new", "Build fails on ARM"),
            ],
        )
    }

    fn ids(response: &SearchResponse) -> Vec<u64> {
        response.hits.iter().map(|hit| hit.id).collect()
    }

    #[tokio::test]
    async fn test_all_tickets_sorted_descending() {
        let temp_dir = TempDir::new().unwrap();
        let service = sample(&temp_dir);

        let response = service
            .search(&TicketQuery::new("*"), CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(response.total_hits, 4);
        assert_eq!(ids(&response), vec![7, 5, 3, 1]);
    }

    #[tokio::test]
    async fn test_ascending_with_offset() {
        let temp_dir = TempDir::new().unwrap();
        let service = sample(&temp_dir);

        let query = TicketQuery::new("status:*")
            .with_order(SortOrder::Ascending)
            .with_offset(1)
            .with_limit(2);
        let response = service.search(&query, CancelSignal::new()).await.unwrap();
        assert_eq!(response.total_hits, 4);
        assert_eq!(ids(&response), vec![3, 5]);
    }

    #[tokio::test]
    async fn test_status_and_subject_queries() {
        let temp_dir = TempDir::new().unwrap();
        let service = sample(&temp_dir);

        let response = service
            .search(&TicketQuery::new("status:open"), CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(ids(&response), vec![7, 3]);

        let response = service
            .search(&TicketQuery::new("regex"), CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(response.total_hits, 2);
    }

    #[tokio::test]
    async fn test_invalid_query_is_a_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let service = sample(&temp_dir);

        let err = service
            .search(&TicketQuery::new("nosuchfield:x"), CancelSignal::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::QueryParsingFailed(_)));
    }

    #[tokio::test]
    async fn test_cancelled_search() {
        let temp_dir = TempDir::new().unwrap();
        let service = sample(&temp_dir);

        let signal = CancelSignal::new();
        signal.cancel();
        let err = service.search(&TicketQuery::new("*"), signal).await.unwrap_err();
        assert!(matches!(err, SearchError::Cancelled));
    }

    #[tokio::test]
    async fn test_highlighting() {
        let temp_dir = TempDir::new().unwrap();
        let service = sample(&temp_dir);

        let query = TicketQuery::new("leak").with_highlight(true);
        let response = service.search(&query, CancelSignal::new()).await.unwrap();
        let highlight = response.hits[0].highlight.as_ref().unwrap();
        assert_eq!(highlight.ranges.len(), 1);
        assert_eq!(&highlight.fragment[highlight.ranges[0].clone()], "leak");
        assert!(highlight.render_ansi().contains("\x1b[1mleak\x1b[0m"));

        // Nothing to highlight: the subject is returned as is
        let query = TicketQuery::new("status:new").with_highlight(true);
        let response = service.search(&query, CancelSignal::new()).await.unwrap();
        let highlight = response.hits[0].highlight.as_ref().unwrap();
        assert_eq!(highlight.fragment, "Build fails on ARM");
        assert!(highlight.ranges.is_empty());
    }

    #[tokio::test]
    async fn test_offset_past_the_index() {
        let temp_dir = TempDir::new().unwrap();
        let service = sample(&temp_dir);

        let query = TicketQuery::new("*").with_offset(u32::MAX as usize);
        let response = service.search(&query, CancelSignal::new()).await.unwrap();
        assert_eq!(response.total_hits, 4);
        assert!(response.hits.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_cancels_the_search() {
        let signal = CancelSignal::new();
        let worker_signal = signal.clone();

        // Stands in for a search that only stops when told to
        let task = tokio::task::spawn_blocking(move || -> SearchResult<SearchResponse> {
            while !worker_signal.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(SearchError::Cancelled)
        });

        let err = with_deadline(task, Duration::from_millis(20), &signal)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Timeout(d) if d == Duration::from_millis(20)));
        assert!(signal.is_cancelled());

        let err = crate::error::AppError::from(err);
        assert_eq!(err.status_code(), axum::http::StatusCode::REQUEST_TIMEOUT);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_search_that_never_finishes_times_out() {
        let signal = CancelSignal::new();
        let task = std::future::pending::<Result<SearchResult<SearchResponse>, JoinError>>();
        let err = with_deadline(task, Duration::ZERO, &signal)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Timeout(_)));
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_render_ansi_without_matches() {
        let highlight = Highlight {
            fragment: "plain".to_string(),
            ranges: vec![],
        };
        assert_eq!(highlight.render_ansi(), "plain");
    }
}
