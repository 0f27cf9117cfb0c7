use crate::api::{handlers, AppState};
use axum::{routing::get, Router};
use std::time::Duration;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the archive router
pub fn build_router(state: AppState) -> Router {
    let prefix = state.prefix().to_string();
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let archive = Router::new()
        .route("/", get(handlers::index))
        .route("/index.html", get(handlers::index))
        .route("/Ticket/Display.html", get(handlers::display_ticket))
        .route(
            "/Ticket/Attachment/:transaction_id/:attachment_id/:filename",
            get(handlers::download_attachment),
        )
        .route("/Search/Simple.html", get(handlers::search));

    let router = Router::new()
        .route("/robots.txt", get(handlers::robots_txt))
        .route("/health", get(handlers::health_check));

    let router = if prefix.is_empty() {
        router.merge(archive)
    } else {
        router
            .route("/", get(handlers::index))
            .route("/index.html", get(handlers::index))
            .nest(&prefix, archive)
    };

    with_middleware(router.with_state(state), timeout)
}

/// Request deadline and tracing around every route
fn with_middleware(router: Router, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new()),
        )
}
