// =============================================================================
// Bar Aggregator — Extend-vs-roll bucketing of a tick stream
// =============================================================================
//
// Maintains the "current" bar for one symbol. Each tick either widens the
// in-progress bucket or, when the tick's floored timestamp crosses the bucket
// boundary, rolls into a new bucket whose open continues from the previous
// close. A bucket is only ever closed implicitly by the first tick of the next
// bucket — if the stream stops first, the last bar simply stays in progress.
//
// Every value returned to the caller is a copy; the aggregator's internal
// `last` is never aliased outward, so a consumer holding a previous emission
// cannot corrupt subsequent aggregation.
// =============================================================================

use tracing::warn;

use crate::engine::tick_source::RandomWalk;
use crate::types::Bar;

/// Time-bucketing state machine for one bar stream.
#[derive(Debug)]
pub struct BarAggregator {
    interval_ms: i64,
    last: Option<Bar>,
}

impl BarAggregator {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            last: None,
        }
    }

    /// Floor a timestamp to the start of its bucket.
    pub fn bucket_start(&self, t: i64) -> i64 {
        t.div_euclid(self.interval_ms) * self.interval_ms
    }

    /// The most recent bar, if any tick has been processed or a seed applied.
    pub fn last(&self) -> Option<Bar> {
        self.last
    }

    /// Seed the aggregator from the final bar of a history slice.
    ///
    /// Bars with NaN/Infinity prices are rejected at this boundary and the
    /// aggregator stays unseeded, falling back to anchor synthesis on the
    /// first tick.
    pub fn seed(&mut self, history: &[Bar]) {
        match history.last() {
            Some(bar) if bar.is_finite() => {
                // Re-floor in case the seed came from an unaligned source.
                self.last = Some(Bar {
                    bucket_start: self.bucket_start(bar.bucket_start),
                    ..*bar
                });
            }
            Some(bar) => {
                warn!(?bar, "rejecting non-finite seed bar");
            }
            None => {}
        }
    }

    /// Process one tick arriving at wall time `now_ms` and return the emitted
    /// bar snapshot.
    pub fn on_tick(&mut self, now_ms: i64, source: &mut RandomWalk) -> Bar {
        let bucket = self.bucket_start(now_ms);

        let bar = match self.last {
            // First tick ever: synthesize the anchor bucket.
            None => source.anchor_bar(bucket),
            // Boundary crossed: roll into a new bucket from the last close.
            Some(last) if bucket > last.bucket_start => source.next_bucket(last.close, bucket),
            // Still inside the current bucket: widen in place.
            Some(last) => source.same_bucket(&last),
        };

        self.last = Some(bar);
        bar
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: i64 = 60_000;
    // Mid-bucket wall time, not aligned.
    const T0: i64 = 1_755_000_012_345;

    fn aggregator() -> (BarAggregator, RandomWalk) {
        (BarAggregator::new(INTERVAL), RandomWalk::with_seed(42))
    }

    #[test]
    fn first_tick_emits_anchor_bar() {
        let (mut agg, mut src) = aggregator();
        let bar = agg.on_tick(T0, &mut src);

        assert_eq!(bar.bucket_start, T0.div_euclid(INTERVAL) * INTERVAL);
        assert_eq!(bar.open, bar.high);
        assert_eq!(bar.open, bar.low);
        assert_eq!(bar.open, bar.close);
        assert_eq!(agg.last(), Some(bar));
    }

    #[test]
    fn tick_before_boundary_widens_same_bucket() {
        let (mut agg, mut src) = aggregator();
        let first = agg.on_tick(T0, &mut src);
        let second = agg.on_tick(T0 + 1_000, &mut src);

        assert_eq!(second.bucket_start, first.bucket_start);
        assert!(second.high >= first.high);
        assert!(second.low <= first.low);
        assert!(second.volume > first.volume);
    }

    #[test]
    fn tick_after_boundary_rolls_and_chains_open() {
        let (mut agg, mut src) = aggregator();
        agg.on_tick(T0, &mut src);
        let second = agg.on_tick(T0 + 1_000, &mut src);
        let third = agg.on_tick(T0 + INTERVAL, &mut src);

        assert!(third.bucket_start > second.bucket_start);
        assert_eq!(third.bucket_start % INTERVAL, 0);
        assert_eq!(third.open, second.close);
    }

    #[test]
    fn emitted_bars_always_satisfy_ohlc_envelope() {
        let (mut agg, mut src) = aggregator();
        let mut t = T0;
        let mut prev_roll_bucket = i64::MIN;

        for i in 0..500 {
            // Irregular cadence, occasionally jumping several buckets.
            t += if i % 7 == 0 { INTERVAL * 2 } else { 900 };
            let bar = agg.on_tick(t, &mut src);

            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.low <= bar.open.min(bar.close));
            assert_eq!(bar.bucket_start % INTERVAL, 0);

            if i % 7 == 0 {
                assert!(bar.bucket_start > prev_roll_bucket);
                prev_roll_bucket = bar.bucket_start;
            }
        }
    }

    #[test]
    fn emission_is_a_copy_not_a_live_reference() {
        let (mut agg, mut src) = aggregator();
        let mut bar = agg.on_tick(T0, &mut src);

        // Mutating the caller's copy must not corrupt aggregation.
        bar.close = -1.0;
        bar.volume = 0;

        // Same-bucket update builds on the internal anchor, not the tampered copy.
        let next = agg.on_tick(T0 + 1_000, &mut src);
        assert!(next.close > 0.0);
        assert!(next.volume > crate::engine::tick_source::BASE_VOLUME);
    }

    #[test]
    fn seed_resumes_from_last_history_bar() {
        let (mut agg, mut src) = aggregator();
        let history = vec![
            Bar {
                bucket_start: 0,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: 1_500,
            },
            Bar {
                bucket_start: INTERVAL,
                open: 100.5,
                high: 102.0,
                low: 100.0,
                close: 101.25,
                volume: 1_800,
            },
        ];
        agg.seed(&history);
        assert_eq!(agg.last().unwrap().close, 101.25);

        // First tick lands in a later bucket: open continues from the seed.
        let bar = agg.on_tick(INTERVAL * 5 + 10, &mut src);
        assert_eq!(bar.open, 101.25);
        assert_eq!(bar.bucket_start, INTERVAL * 5);
    }

    #[test]
    fn seed_rejects_non_finite_bars() {
        let (mut agg, mut src) = aggregator();
        agg.seed(&[Bar {
            bucket_start: 0,
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: f64::NAN,
            volume: 1_000,
        }]);
        assert_eq!(agg.last(), None);

        // Falls back to anchor synthesis.
        let bar = agg.on_tick(T0, &mut src);
        assert_eq!(bar.open, bar.close);
        assert!(bar.open.is_finite());
    }

    #[test]
    fn seed_refloors_unaligned_bucket_start() {
        let (mut agg, _) = aggregator();
        agg.seed(&[Bar {
            bucket_start: T0, // not a multiple of INTERVAL
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume: 1_000,
        }]);
        let last = agg.last().unwrap();
        assert_eq!(last.bucket_start % INTERVAL, 0);
    }

    #[test]
    fn empty_seed_is_a_no_op() {
        let (mut agg, _) = aggregator();
        agg.seed(&[]);
        assert_eq!(agg.last(), None);
    }
}
