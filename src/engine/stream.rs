// =============================================================================
// Stream Controller — Per-symbol scheduling loop and lifecycle
// =============================================================================
//
// One `Stream` owns one periodic ticker task plus the state it drives: a
// `RandomWalk` source routed into either a `BarAggregator` or a
// `SeriesBuffer`, and a subscriber callback invoked with every emission.
//
// Lifecycle contract:
//   - `start()` / `stop()` are idempotent; repeated calls in the same state
//     are no-ops.
//   - `stop()` is synchronous: once it returns, the subscriber will not be
//     invoked again until a later `start()`. The `last` value survives a stop
//     so an unseeded restart resumes the walk instead of re-anchoring.
//   - Callbacks for one stream never overlap and are never reordered: each
//     tick acquires the emit gate, mutates state under the inner lock, then
//     invokes the subscriber outside the state lock but still inside the
//     gate. `stop()` takes the same gate, so it waits out an in-flight
//     emission.
//
// Neither lock is ever held across an await point. The subscriber callback
// must not call `start`/`stop` on its own stream — the gate is not reentrant.
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::bar_aggregator::BarAggregator;
use crate::engine::series_buffer::SeriesBuffer;
use crate::engine::tick_source::RandomWalk;
use crate::types::{Bar, FeedMessage, Point, SeedHistory, StreamKind};

/// Subscriber callback, invoked synchronously from the scheduler.
pub type OnMessage = Arc<dyn Fn(FeedMessage) + Send + Sync>;

/// Wall-time source, injectable so tests can drive bucket rollover
/// deterministically.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// The production clock: current Unix time in milliseconds.
pub fn wall_clock() -> Clock {
    Arc::new(|| Utc::now().timestamp_millis())
}

// =============================================================================
// Options
// =============================================================================

/// Construction-time options for one stream.
#[derive(Clone)]
pub struct StreamOptions {
    /// Stream identity, opaque to the engine.
    pub symbol_id: String,
    /// Selects bar aggregation vs line-series routing.
    pub kind: StreamKind,
    /// Bucket width for bar streams.
    pub bar_interval_ms: i64,
    /// Scheduler cadence.
    pub tick_interval_ms: u64,
    /// Sliding-window length for point streams.
    pub point_capacity: usize,
    /// Clamp range for point values.
    pub min_value: f64,
    pub max_value: f64,
    /// Seed for the tick source; `None` uses OS entropy.
    pub rng_seed: Option<u64>,
    /// Wall-time source.
    pub clock: Clock,
}

impl StreamOptions {
    pub fn new(symbol_id: impl Into<String>, kind: StreamKind) -> Self {
        Self {
            symbol_id: symbol_id.into(),
            kind,
            bar_interval_ms: 60_000,
            tick_interval_ms: 1_000,
            point_capacity: 300,
            min_value: 50.0,
            max_value: 200.0,
            rng_seed: None,
            clock: wall_clock(),
        }
    }
}

// =============================================================================
// Stream
// =============================================================================

/// Routing state: exactly one of the two pipelines per stream.
enum Route {
    Bar(BarAggregator),
    Point(SeriesBuffer),
}

/// State owned exclusively by one stream. Never aliased outward — every
/// emission and accessor returns a copy.
struct Inner {
    running: bool,
    task: Option<JoinHandle<()>>,
    route: Route,
    source: RandomWalk,
}

/// One running instance of the engine bound to a symbol, an interval, and a
/// subscriber.
pub struct Stream {
    options: StreamOptions,
    on_message: OnMessage,
    inner: Arc<Mutex<Inner>>,
    /// Serialises emissions against `stop()`. Held while the subscriber runs.
    emit_gate: Arc<Mutex<()>>,
}

impl Stream {
    pub fn new(options: StreamOptions, on_message: OnMessage) -> Self {
        let route = match options.kind {
            StreamKind::Bar => Route::Bar(BarAggregator::new(options.bar_interval_ms)),
            StreamKind::Point => Route::Point(SeriesBuffer::new(options.point_capacity)),
        };
        let source = match options.rng_seed {
            Some(seed) => RandomWalk::with_seed(seed),
            None => RandomWalk::new(),
        };

        Self {
            options,
            on_message,
            inner: Arc::new(Mutex::new(Inner {
                running: false,
                task: None,
                route,
                source,
            })),
            emit_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn symbol_id(&self) -> &str {
        &self.options.symbol_id
    }

    pub fn kind(&self) -> StreamKind {
        self.options.kind
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    /// The current bar, for bar streams.
    pub fn last_bar(&self) -> Option<Bar> {
        match &self.inner.lock().route {
            Route::Bar(agg) => agg.last(),
            Route::Point(_) => None,
        }
    }

    /// Copy of the current window, for point streams.
    pub fn points(&self) -> Vec<Point> {
        match &self.inner.lock().route {
            Route::Bar(_) => Vec::new(),
            Route::Point(buffer) => buffer.snapshot(),
        }
    }

    /// Begin the periodic scheduler. No-op when already running.
    ///
    /// A non-empty `seed` initialises `last` from its final element; without
    /// one, the first tick synthesizes an anchor — unless a previous run left
    /// state behind, in which case the walk resumes from it.
    pub fn start(&self, seed: Option<SeedHistory>) {
        let mut inner = self.inner.lock();
        if inner.running {
            debug!(symbol = %self.options.symbol_id, "start ignored — already running");
            return;
        }

        if let Some(seed) = seed {
            match (&mut inner.route, seed) {
                (Route::Bar(agg), SeedHistory::Bars(bars)) => agg.seed(&bars),
                (Route::Point(buffer), SeedHistory::Points(points)) => {
                    buffer.extend_from(&points)
                }
                _ => {
                    warn!(
                        symbol = %self.options.symbol_id,
                        kind = %self.options.kind,
                        "seed history kind mismatch — ignoring seed"
                    );
                }
            }
        }

        inner.running = true;
        inner.task = Some(tokio::spawn(run_ticker(
            Arc::clone(&self.inner),
            Arc::clone(&self.emit_gate),
            Arc::clone(&self.on_message),
            self.options.clone(),
        )));

        info!(
            symbol = %self.options.symbol_id,
            kind = %self.options.kind,
            tick_interval_ms = self.options.tick_interval_ms,
            "stream started"
        );
    }

    /// Cancel the scheduler. No-op when not running.
    ///
    /// Acquires the emit gate first, so any emission already in flight
    /// completes before this returns — afterwards the subscriber will not be
    /// invoked again. `last` is preserved for a later restart.
    pub fn stop(&self) {
        let _gate = self.emit_gate.lock();
        let mut inner = self.inner.lock();
        if !inner.running {
            debug!(symbol = %self.options.symbol_id, "stop ignored — not running");
            return;
        }

        inner.running = false;
        if let Some(task) = inner.task.take() {
            task.abort();
        }

        info!(symbol = %self.options.symbol_id, "stream stopped");
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Ticker task
// =============================================================================

/// The per-stream scheduling loop. Exits when `running` is cleared.
async fn run_ticker(
    inner: Arc<Mutex<Inner>>,
    emit_gate: Arc<Mutex<()>>,
    on_message: OnMessage,
    options: StreamOptions,
) {
    let period = Duration::from_millis(options.tick_interval_ms.max(1));
    // First fire lands one full period after start, not immediately.
    let mut ticker = interval_at(Instant::now() + period, period);
    // A stalled subscriber must not cause a burst of catch-up emissions.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        // Gate, then state lock; both released before the next await.
        let _gate = emit_gate.lock();
        let msg = {
            let mut state = inner.lock();
            if !state.running {
                break;
            }

            let now_ms = (options.clock)();
            let Inner { route, source, .. } = &mut *state;

            match route {
                Route::Bar(agg) => FeedMessage::Bar {
                    symbol_id: options.symbol_id.clone(),
                    bar: agg.on_tick(now_ms, source),
                },
                Route::Point(buffer) => {
                    let prev = match buffer.back() {
                        Some(point) => point.value,
                        // Fresh unseeded stream: anchor the walk.
                        None => source.anchor_price(),
                    };
                    let point =
                        source.next_point(prev, now_ms, options.min_value, options.max_value);
                    buffer.append(point);
                    FeedMessage::Point {
                        symbol_id: options.symbol_id.clone(),
                        point,
                    }
                }
            }
        };

        // Subscriber runs outside the state lock, inside the gate: emissions
        // stay ordered and `stop()` waits for this call to finish.
        (on_message)(msg);
    }

    debug!(symbol = %options.symbol_id, "stream ticker exited");
}
