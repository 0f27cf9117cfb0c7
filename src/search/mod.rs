//! Full-text ticket search powered by Tantivy
//!
//! The index holds one small document per ticket (`id`, `status` and
//! `subject`) and is built once by the ingestion run. At serve time it is
//! opened read-only and every search is:
//!
//! - **Sorted** by ticket id through the `id` fast field, never by score
//! - **Paginated** with an offset and a bounded limit
//! - **Cancellable** through a [`CancelSignal`] checked between segments
//! - **Deadline-bound** by `SearchConfig::search_timeout`
//!
//! ```text
//! TicketQuery ──► SearchService::search ──► spawn_blocking
//!                                           │
//!                                           ▼
//!                         Cancellable<(Count, TopDocs by id)>
//!                                           │
//!                                           ▼
//!                                IndexManager (reader)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rt_archive::search::{CancelSignal, SearchConfig, SearchService, TicketQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let search = SearchService::open(SearchConfig::default())?;
//!
//!     let query = TicketQuery::new("status:open").with_limit(20);
//!     let results = search.search(&query, CancelSignal::new()).await?;
//!     println!("Found {} tickets", results.total_hits);
//!
//!     Ok(())
//! }
//! ```

mod cancel;
mod config;
mod document;
mod error;
mod extract;
mod index;
mod query;
mod service;

pub use cancel::{CancelOnDrop, CancelSignal, Cancellable};
pub use config::{SearchConfig, SearchConfigBuilder};
pub use document::{build_ticket_schema, SearchDocument, TicketDocument, TicketFields};
pub use error::{SearchError, SearchResult};
pub use extract::{extract_index, is_zipped_index, wait_for_index};
pub use index::{index_exists, IndexBuilder, IndexManager, IndexStats};
pub use query::{QueryText, SortOrder, TicketQuery, ALL_TICKETS_QUERY};
pub use service::{Highlight, SearchResponse, SearchService, TicketHit};
