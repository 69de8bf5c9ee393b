// =============================================================================
// Tick Source — Bounded random walk for synthetic bars and points
// =============================================================================
//
// Pure value generation: given the previous sample and a mode (fresh bucket vs
// in-bucket update for bars, unconditional for points), produce the next raw
// sample. No timers, no subscribers, no shared state — the stream scheduler
// owns one `RandomWalk` per stream and drives it.
//
// Production streams use OS entropy; tests construct the source through
// `with_seed` so every scenario is reproducible.
// =============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Bar, Point};

/// Noise magnitude when opening a new bucket, as a fraction of the open.
const NEW_BUCKET_VOLATILITY: f64 = 0.02;

/// Noise magnitude for in-bucket updates, as a fraction of the current close.
const SAME_BUCKET_VOLATILITY: f64 = 0.005;

/// Floor so the walk keeps moving even when the price drifts near zero.
const MIN_VOLATILITY: f64 = 0.01;

/// Volume assigned to a synthesized anchor bar.
pub const BASE_VOLUME: u64 = 1_000;

/// Round to 2 decimals — prices on the wire are display values.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bounded random-walk sample generator.
pub struct RandomWalk {
    rng: StdRng,
}

impl RandomWalk {
    /// Production source backed by OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic source for reproducible scenarios.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Synthesize a starting price in the default 100–150 band.
    pub fn anchor_price(&mut self) -> f64 {
        round2(100.0 + self.rng.random_range(0.0..50.0))
    }

    /// Synthesize the very first bar of a stream: all prices collapsed to a
    /// single anchor value, base volume.
    pub fn anchor_bar(&mut self, bucket_start: i64) -> Bar {
        let price = self.anchor_price();
        Bar {
            bucket_start,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: BASE_VOLUME,
        }
    }

    /// Open a new bucket continuing from the previous close.
    pub fn next_bucket(&mut self, prev_close: f64, bucket_start: i64) -> Bar {
        let open = prev_close;
        let volatility = (open.abs() * NEW_BUCKET_VOLATILITY).max(MIN_VOLATILITY);
        let close = open + self.rng.random_range(-volatility..volatility);
        let high = open.max(close) + self.rng.random_range(0.0..volatility * 0.5);
        let low = open.min(close) - self.rng.random_range(0.0..volatility * 0.5);

        Bar {
            bucket_start,
            open: round2(open),
            high: round2(high),
            low: round2(low),
            close: round2(close),
            volume: BASE_VOLUME + self.rng.random_range(0..2_000),
        }
    }

    /// Jitter the current bucket in place: smaller noise, monotonic high/low
    /// widening, volume strictly increasing.
    pub fn same_bucket(&mut self, bar: &Bar) -> Bar {
        let volatility = (bar.close.abs() * SAME_BUCKET_VOLATILITY).max(MIN_VOLATILITY);
        let close = round2(bar.close + self.rng.random_range(-volatility..volatility));

        Bar {
            bucket_start: bar.bucket_start,
            open: bar.open,
            high: bar.high.max(close),
            low: bar.low.min(close),
            close,
            volume: bar.volume + self.rng.random_range(1..=100),
        }
    }

    /// Single-step point walk, clamped to the configured value range.
    pub fn next_point(&mut self, prev_value: f64, timestamp: i64, min: f64, max: f64) -> Point {
        let value = (prev_value + self.rng.random_range(-1.0..1.0)).clamp(min, max);
        Point {
            timestamp,
            value: round2(value),
        }
    }

    // ── History backfill ────────────────────────────────────────────────

    /// Generate `count` historical bars ending at the bucket containing
    /// `now_ms`, oldest first, closes chained into the next open.
    pub fn backfill_bars(&mut self, count: usize, interval_ms: i64, now_ms: i64) -> Vec<Bar> {
        let mut bars = Vec::with_capacity(count);
        let mut price = self.anchor_price();

        for i in (0..count as i64).rev() {
            let bucket_start = (now_ms - i * interval_ms).div_euclid(interval_ms) * interval_ms;
            let volatility = (price.abs() * NEW_BUCKET_VOLATILITY).max(MIN_VOLATILITY);
            let open = price;
            let close = round2(open + self.rng.random_range(-volatility..volatility));
            let high = open.max(close) + self.rng.random_range(0.0..volatility);
            let low = open.min(close) - self.rng.random_range(0.0..volatility);

            bars.push(Bar {
                bucket_start,
                open: round2(open),
                high: round2(high),
                low: round2(low),
                close,
                volume: BASE_VOLUME + self.rng.random_range(0..9_000),
            });

            // Next bar continues from this close.
            price = close;
        }

        bars
    }

    /// Generate `count` historical points ending at `now_ms`, oldest first,
    /// clamped to `[min, max]`.
    pub fn backfill_points(
        &mut self,
        count: usize,
        interval_ms: i64,
        now_ms: i64,
        min: f64,
        max: f64,
    ) -> Vec<Point> {
        let mut points = Vec::with_capacity(count);
        let mut value: f64 = 100.0 + self.rng.random_range(0.0..50.0);

        for i in (0..count as i64).rev() {
            value = (value + self.rng.random_range(-1.0..1.0)).clamp(min, max);
            points.push(Point {
                timestamp: now_ms - i * interval_ms,
                value: round2(value),
            });
        }

        points
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new()
    }
}
