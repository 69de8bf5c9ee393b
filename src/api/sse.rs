// =============================================================================
// SSE Handler — Push-based feed delivery
// =============================================================================
//
// Clients connect to `/api/v1/sse?symbol=<id>&kind=<bar|point>` and receive:
//   1. An immediate `history` event carrying the backfilled series so the
//      chart can render before the first live push.
//   2. A live event per scheduler tick with the `FeedMessage` JSON.
//
// Each connection owns its own engine `Stream`; the stream's subscriber
// pushes into an mpsc channel that backs the SSE body. Dropping the body on
// client disconnect drops the connection guard, which stops the stream — no
// shared registry of streams exists anywhere.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::Utc;
use futures_util::stream::{self, Stream as EventStream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::engine::stream::{OnMessage, Stream, StreamOptions};
use crate::engine::RandomWalk;
use crate::types::{SeedHistory, StreamKind};

// =============================================================================
// Query parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SseQuery {
    pub symbol: String,
    pub kind: StreamKind,
}

// =============================================================================
// Connection guard
// =============================================================================

/// Keeps the engine stream alive for the lifetime of the SSE body and tears
/// it down on disconnect.
struct ConnectionGuard {
    stream: Stream,
    state: Arc<AppState>,
    connection_id: Uuid,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.stream.stop();
        self.state.stream_closed();
        info!(
            connection = %self.connection_id,
            symbol = %self.stream.symbol_id(),
            kind = %self.stream.kind(),
            "sse stream disconnected"
        );
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Axum handler: build a per-connection stream and expose it as an SSE body.
pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Sse<impl EventStream<Item = Result<Event, axum::Error>>> {
    let connection_id = Uuid::new_v4();
    let now_ms = Utc::now().timestamp_millis();

    let mut options = StreamOptions::new(query.symbol.clone(), query.kind);
    options.bar_interval_ms = state.config.bar_interval_ms;
    options.tick_interval_ms = state.config.tick_interval_ms;
    options.point_capacity = state.config.point_capacity;
    options.min_value = state.config.min_value;
    options.max_value = state.config.max_value;

    // Backfill once, then seed the stream from it so the live walk continues
    // the same series the chart just rendered.
    let mut source = RandomWalk::new();
    let (seed, history_event) = match query.kind {
        StreamKind::Bar => {
            let bars =
                source.backfill_bars(state.config.history_count, options.bar_interval_ms, now_ms);
            let event = Event::default().event("history").json_data(&bars);
            (SeedHistory::Bars(bars), event)
        }
        StreamKind::Point => {
            let points = source.backfill_points(
                state.config.history_count,
                options.tick_interval_ms as i64,
                now_ms,
                options.min_value,
                options.max_value,
            );
            let event = Event::default().event("history").json_data(&points);
            (SeedHistory::Points(points), event)
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let counter = Arc::clone(&state);
    let on_message: OnMessage = Arc::new(move |msg| {
        counter.message_sent();
        // A closed receiver means the client went away; the guard cleans up
        // once the body is dropped.
        let _ = tx.send(msg);
    });

    let feed = Stream::new(options, on_message);
    feed.start(Some(seed));
    state.stream_opened();

    info!(
        connection = %connection_id,
        symbol = %query.symbol,
        kind = %query.kind,
        "sse stream connected"
    );

    let guard = ConnectionGuard {
        stream: feed,
        state: Arc::clone(&state),
        connection_id,
    };

    let live = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|msg| (msg, rx))
    })
    .map(move |msg| {
        // The guard lives inside this closure: it is dropped, stopping the
        // stream, when the SSE body is dropped.
        let _hold: &ConnectionGuard = &guard;
        debug!(symbol = %msg.symbol_id(), "sse push");
        Event::default().json_data(&msg)
    });

    let events = stream::iter([history_event]).chain(live);
    Sse::new(events).keep_alive(KeepAlive::default())
}
