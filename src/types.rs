// =============================================================================
// Shared types used across the PulseFeed engine
// =============================================================================
//
// Wire types serialise in camelCase because the consumers are the TypeScript
// chart renderers (klinecharts candlestick view + canvas line view).
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single OHLCV bucket emitted by the bar aggregator.
///
/// `bucket_start` is always an exact multiple of the configured bar interval,
/// so consumers can detect a bucket roll by comparing it against the previous
/// emission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub bucket_start: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// True when every price field is a usable finite number.
    ///
    /// A NaN/Infinity seed must never reach aggregator state — a corrupted
    /// `last` would poison every subsequent bar.
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }
}

/// One scalar sample in a line series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub timestamp: i64,
    pub value: f64,
}

impl Point {
    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }
}

/// Which pipeline a stream routes its ticks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Bar,
    Point,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bar => write!(f, "bar"),
            Self::Point => write!(f, "point"),
        }
    }
}

/// Push message delivered to a stream subscriber.
///
/// Tagged by `kind` so the chart side can dispatch on a single field:
/// `{"kind":"bar","symbolId":...,"bar":{...}}` or
/// `{"kind":"point","symbolId":...,"point":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeedMessage {
    Bar {
        #[serde(rename = "symbolId")]
        symbol_id: String,
        bar: Bar,
    },
    Point {
        #[serde(rename = "symbolId")]
        symbol_id: String,
        point: Point,
    },
}

impl FeedMessage {
    pub fn symbol_id(&self) -> &str {
        match self {
            Self::Bar { symbol_id, .. } | Self::Point { symbol_id, .. } => symbol_id,
        }
    }

    /// The emitted bar, when this is a bar message.
    pub fn as_bar(&self) -> Option<&Bar> {
        match self {
            Self::Bar { bar, .. } => Some(bar),
            Self::Point { .. } => None,
        }
    }

    /// The emitted point, when this is a point message.
    pub fn as_point(&self) -> Option<&Point> {
        match self {
            Self::Point { point, .. } => Some(point),
            Self::Bar { .. } => None,
        }
    }
}

/// History handed to `Stream::start` to resume from a known series instead of
/// synthesizing a fresh anchor.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedHistory {
    Bars(Vec<Bar>),
    Points(Vec<Point>),
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_message_wire_format_is_camel_case() {
        let msg = FeedMessage::Bar {
            symbol_id: "AAPL".into(),
            bar: Bar {
                bucket_start: 1_755_000_000_000 / 60_000 * 60_000,
                open: 100.0,
                high: 101.5,
                low: 99.5,
                close: 101.0,
                volume: 1234,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "bar");
        assert_eq!(json["symbolId"], "AAPL");
        assert!(json["bar"]["bucketStart"].is_i64());
        assert_eq!(json["bar"]["volume"], 1234);
        // No snake_case leakage.
        assert!(json["bar"].get("bucket_start").is_none());
        assert!(json.get("symbol_id").is_none());
    }

    #[test]
    fn point_message_roundtrip() {
        let msg = FeedMessage::Point {
            symbol_id: "TSLA".into(),
            point: Point {
                timestamp: 1_755_000_000_000,
                value: 123.45,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: FeedMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.symbol_id(), "TSLA");
        assert!(back.as_point().is_some());
        assert!(back.as_bar().is_none());
    }

    #[test]
    fn stream_kind_parses_lowercase() {
        let kind: StreamKind = serde_json::from_str("\"bar\"").unwrap();
        assert_eq!(kind, StreamKind::Bar);
        let kind: StreamKind = serde_json::from_str("\"point\"").unwrap();
        assert_eq!(kind, StreamKind::Point);
        assert_eq!(StreamKind::Bar.to_string(), "bar");
    }

    #[test]
    fn non_finite_bar_is_detected() {
        let mut bar = Bar {
            bucket_start: 0,
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume: 0,
        };
        assert!(bar.is_finite());
        bar.close = f64::NAN;
        assert!(!bar.is_finite());
        bar.close = f64::INFINITY;
        assert!(!bar.is_finite());
    }
}
