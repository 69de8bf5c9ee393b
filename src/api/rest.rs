// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Everything is public — this server
// feeds demo chart pages, there is nothing to protect.
//
// CORS is configured permissively so the chart dev server (vite) can connect
// from another origin.
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;
use crate::engine::RandomWalk;
use crate::types::StreamKind;

/// Upper bound on a single history response.
const MAX_HISTORY_COUNT: usize = 2_000;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/symbols", get(symbols))
        .route("/api/v1/history", get(history))
        .route("/api/v1/sse", get(crate::api::sse::sse_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_streams: u64,
    messages_sent: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
        active_streams: state.active_streams.load(Ordering::Relaxed),
        messages_sent: state.messages_sent.load(Ordering::Relaxed),
        server_time: Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Symbols
// =============================================================================

async fn symbols(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.symbols.clone())
}

// =============================================================================
// History
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub symbol: String,
    pub kind: StreamKind,
    /// Number of samples; defaults to the configured history length.
    pub count: Option<usize>,
}

/// Serve a freshly generated backfill so a chart can render before the first
/// live push arrives. Each request gets its own walk — the history is
/// synthetic, there is nothing to replay.
async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let count = query
        .count
        .unwrap_or(state.config.history_count)
        .min(MAX_HISTORY_COUNT);
    let now_ms = Utc::now().timestamp_millis();
    let mut source = RandomWalk::new();

    info!(
        symbol = %query.symbol,
        kind = %query.kind,
        count,
        "history requested"
    );

    match query.kind {
        StreamKind::Bar => {
            let bars = source.backfill_bars(count, state.config.bar_interval_ms, now_ms);
            (StatusCode::OK, Json(serde_json::json!(bars)))
        }
        StreamKind::Point => {
            let points = source.backfill_points(
                count,
                state.config.tick_interval_ms as i64,
                now_ms,
                state.config.min_value,
                state.config.max_value,
            );
            (StatusCode::OK, Json(serde_json::json!(points)))
        }
    }
}
