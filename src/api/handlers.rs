use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::TicketView;
use crate::pagination::{QueryPage, SearchRequest};
use crate::search::CancelSignal;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Start page: every ticket, newest first
pub async fn index(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&format!("{}/Search/Simple.html?q=status:*", state.prefix()))
}

pub async fn robots_txt() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain")],
        "User-agent: *\nDisallow: /",
    )
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let stats = state.engine.service().get_stats()?;
    let offsets = state.repository.offsets();

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        site: state.config.site.clone(),
        short_site: state.config.short_site.clone(),
        tickets: offsets.ticket_count(),
        attachments: offsets.len(),
        indexed_tickets: stats.total_documents,
        snapshot_time: state
            .snapshot
            .map(|t| t.format(crate::config::SNAPSHOT_FORMAT).to_string()),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub site: String,
    pub short_site: String,
    pub tickets: usize,
    pub attachments: usize,
    pub indexed_tickets: u64,
    pub snapshot_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DisplayParams {
    pub id: Option<String>,
}

/// Show one ticket; merged tickets redirect to the ticket they were merged
/// into.
pub async fn display_ticket(
    State(state): State<AppState>,
    Query(params): Query<DisplayParams>,
) -> Result<Response> {
    let id = params.id.as_deref().map(str::trim).unwrap_or_default();
    if id.is_empty() {
        return Err(AppError::NotFound("no ticket id given".to_string()));
    }

    if let Some(canonical) = state.repository.canonical_id(id) {
        tracing::debug!(ticket_id = %id, merged_into = %canonical, "Redirecting merged ticket");
        let location = format!(
            "{}/Ticket/Display.html?id={}",
            state.prefix(),
            urlencoding::encode(canonical)
        );
        return Ok(Redirect::temporary(&location).into_response());
    }

    let mut view: TicketView = state.repository.get_ticket_view(id).await?;
    view.github_url = github_url(&state.config.github_prefix, view.github_issue.as_deref());
    Ok(Json(view).into_response())
}

/// `<prefix>/issues/<n>`, or nothing without a prefix or an issue
fn github_url(prefix: &str, issue: Option<&str>) -> Option<String> {
    let prefix = prefix.trim().trim_end_matches('/');
    match issue {
        Some(issue) if !prefix.is_empty() => Some(format!("{}/issues/{}", prefix, issue)),
        _ => None,
    }
}

/// Download an attachment.
///
/// Only the attachment id addresses the content; the transaction id and
/// file name exist for readable URLs.
pub async fn download_attachment(
    State(state): State<AppState>,
    Path((_transaction_id, attachment_id, _filename)): Path<(String, String, String)>,
) -> Result<Response> {
    let attachment = state.repository.get_attachment(&attachment_id).await?;

    let content_type = HeaderValue::from_str(&attachment.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(&attachment.filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        attachment.content,
    )
        .into_response())
}

/// `attachment; filename="..."`, or the RFC 5987 form for non-ASCII names
fn content_disposition(filename: &str) -> String {
    if !filename.is_ascii() {
        return format!(
            "attachment; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        );
    }

    let mut quoted = String::with_capacity(filename.len());
    for c in filename.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            c if c.is_control() => {}
            c => quoted.push(c),
        }
    }
    format!("attachment; filename=\"{}\"", quoted)
}

/// Search tickets
pub async fn search(
    State(state): State<AppState>,
    Query(request): Query<SearchRequest>,
) -> Result<Json<QueryPage>> {
    // Fires if this future is dropped (client gone, request timed out)
    let signal = CancelSignal::new();
    let guard = signal.guard();

    let page = state.engine.execute(&request, signal).await;
    guard.disarm();

    Ok(Json(page?))
}
