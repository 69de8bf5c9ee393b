// =============================================================================
// Series Buffer — Bounded FIFO window of line-series points
// =============================================================================

use std::collections::VecDeque;

use tracing::warn;

use crate::types::Point;

/// Sliding window of the most recent points for one line stream.
///
/// Insertion order is arrival order; once `capacity` is reached the oldest
/// point is evicted on every append. There are no other mutation paths.
#[derive(Debug)]
pub struct SeriesBuffer {
    points: VecDeque<Point>,
    capacity: usize,
}

impl SeriesBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one point, evicting the oldest when the window is full.
    ///
    /// Non-finite values are dropped at this boundary — a NaN in the window
    /// would poison the walk that continues from the last stored value.
    pub fn append(&mut self, point: Point) {
        if !point.is_finite() {
            warn!(?point, "dropping non-finite point");
            return;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Seed the window from a history slice, applying the same eviction rule.
    pub fn extend_from(&mut self, history: &[Point]) {
        for point in history {
            self.append(*point);
        }
    }

    /// The most recent point, if any.
    pub fn back(&self) -> Option<Point> {
        self.points.back().copied()
    }

    /// Owned copy of the current window, oldest first.
    pub fn snapshot(&self) -> Vec<Point> {
        self.points.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
