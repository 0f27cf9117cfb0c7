pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::config::ServerConfig;
use crate::pagination::QueryEngine;
use crate::repository::TicketRepository;
use chrono::NaiveDateTime;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<TicketRepository>,
    pub engine: Arc<QueryEngine>,
    pub config: Arc<ServerConfig>,

    /// When the served export was taken
    pub snapshot: Option<NaiveDateTime>,
}

impl AppState {
    pub fn new(
        repository: Arc<TicketRepository>,
        engine: Arc<QueryEngine>,
        mut config: ServerConfig,
    ) -> Self {
        config.prefix = normalize_prefix(&config.prefix);
        Self {
            repository,
            engine,
            config: Arc::new(config),
            snapshot: None,
        }
    }

    /// Set the snapshot time
    pub fn with_snapshot(mut self, snapshot: Option<NaiveDateTime>) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Route prefix, `/name` or empty for the root
    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }
}

/// `rt/`, `/rt` and `/rt/` all mount under `/rt`
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
