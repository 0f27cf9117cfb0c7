use anyhow::Context;
use rt_archive::{
    api::{build_router, AppState},
    config::Config,
    pagination::{PageLimits, QueryEngine},
    repository::TicketRepository,
    search::{extract_index, is_zipped_index, wait_for_index, SearchConfig, SearchService},
    storage::open_source,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "rt_archive={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting RT archive v{}", env!("CARGO_PKG_VERSION"));
    let snapshot = config.snapshot_time()?;

    // Locate the search index; an index shipped inside a zip is unpacked
    // and the temporary copy lives until shutdown
    let mut search_config = SearchConfig::from(&config.search);
    let _extracted = if is_zipped_index(&search_config.index_path) {
        let archive = search_config.index_path.clone();
        let index_name = config.ingest.index_name.clone();
        let (guard, path) =
            tokio::task::spawn_blocking(move || extract_index(&archive, &index_name)).await??;
        search_config.index_path = path;
        Some(guard)
    } else {
        wait_for_index(
            &search_config.index_path,
            config.search.wait_retries,
            Duration::from_secs(config.search.wait_interval_secs),
        )
        .await?;
        None
    };

    let search = Arc::new(SearchService::open(search_config)?);
    tracing::info!(stats = ?search.get_stats()?, "Search index opened");

    // Ticket storage
    let source = open_source(&config.data.path)?;
    let repository = Arc::new(TicketRepository::open(source, config.data.cache_size).await?);

    let engine = Arc::new(QueryEngine::new(search, PageLimits::from(&config.search)));
    let state = AppState::new(Arc::clone(&repository), engine, config.server.clone())
        .with_snapshot(snapshot);
    let app = build_router(state);

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", http_addr))?;

    tracing::info!("HTTP server listening on http://{}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutting down gracefully...");
    repository.close().await;
    Ok(())
}
