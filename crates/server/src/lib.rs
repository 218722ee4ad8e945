//! HTTP search surface for the movie recommendation client.
//!
//! Routes:
//! - `GET /` serves a static search form
//! - `GET /search?query=...` renders the top recommendations for a title
//! - `GET /health` answers liveness probes

mod render;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use catalog::{ErrorKind, RecsError};
use pipeline::RecommendationResolver;

/// Number of recommendations shown per search
pub const SEARCH_LIMIT: u32 = 5;

#[derive(Clone)]
pub struct AppState {
    resolver: RecommendationResolver,
    cancel: CancellationToken,
}

impl AppState {
    pub fn new(resolver: RecommendationResolver) -> Self {
        Self {
            resolver,
            cancel: CancellationToken::new(),
        }
    }

    /// In-flight searches are abandoned once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/search", get(search))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the search surface on `listener` until `shutdown` fires.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = listener.local_addr().context("listener has no local address")?;
    info!("Search surface listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("HTTP server failed")?;

    info!("Search surface stopped");
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(render::SEARCH_FORM)
}

async fn health() -> &'static str {
    "ok"
}

async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let query = params.query.unwrap_or_default();

    match state.resolver.resolve(&query, SEARCH_LIMIT, &state.cancel).await {
        Ok(results) => Html(render::results_page(&query, &results)).into_response(),
        Err(err) => error_response(&query, err),
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Transport => StatusCode::BAD_GATEWAY,
        ErrorKind::PartialFailure | ErrorKind::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(query: &str, err: RecsError) -> Response {
    let status = status_for(err.kind());
    if status.is_client_error() {
        warn!("Search for {:?} rejected: {}", query, err);
    } else {
        error!("Search for {:?} failed: {}", query, err);
    }

    let heading = status.canonical_reason().unwrap_or("Error");
    (status, Html(render::error_page(heading, &err.to_string()))).into_response()
}
