// =============================================================================
// Feed Configuration — Simulator settings with atomic save
// =============================================================================
//
// Every tunable for the synthetic feed lives here: the symbols served, the
// scheduler cadence, the bar bucket width, the line-series window and its
// value clamp range, and the HTTP bind address.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "AAPL".to_string(),
        "TSLA".to_string(),
        "NVDA".to_string(),
    ]
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_bar_interval_ms() -> i64 {
    60_000
}

fn default_point_capacity() -> usize {
    300
}

fn default_history_count() -> usize {
    300
}

fn default_min_value() -> f64 {
    50.0
}

fn default_max_value() -> f64 {
    200.0
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// FeedConfig
// =============================================================================

/// Top-level configuration for the PulseFeed simulator.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Symbols the feed will serve. Identity only — the engine treats them as
    /// opaque strings.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Scheduler cadence: how often each active stream produces a tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Bucket width for bar streams (1-minute candles by default).
    #[serde(default = "default_bar_interval_ms")]
    pub bar_interval_ms: i64,

    /// Sliding-window length for point streams.
    #[serde(default = "default_point_capacity")]
    pub point_capacity: usize,

    /// Number of backfilled samples served to a chart on connect.
    #[serde(default = "default_history_count")]
    pub history_count: usize,

    /// Lower clamp for line-series values.
    #[serde(default = "default_min_value")]
    pub min_value: f64,

    /// Upper clamp for line-series values.
    #[serde(default = "default_max_value")]
    pub max_value: f64,

    /// HTTP bind address for the REST + SSE server.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            tick_interval_ms: default_tick_interval_ms(),
            bar_interval_ms: default_bar_interval_ms(),
            point_capacity: default_point_capacity(),
            history_count: default_history_count(),
            min_value: default_min_value(),
            max_value: default_max_value(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl FeedConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read feed config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse feed config from {}", path.display()))?;

        config.validate()?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            tick_interval_ms = config.tick_interval_ms,
            bar_interval_ms = config.bar_interval_ms,
            "feed config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise feed config to JSON")?;

        // Atomic write: write to a temporary sibling file, then rename.
        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "feed config saved (atomic)");
        Ok(())
    }

    /// Reject configs the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.tick_interval_ms > 0, "tick_interval_ms must be > 0");
        anyhow::ensure!(self.bar_interval_ms > 0, "bar_interval_ms must be > 0");
        anyhow::ensure!(self.point_capacity > 0, "point_capacity must be > 0");
        anyhow::ensure!(
            self.min_value.is_finite() && self.max_value.is_finite(),
            "value clamp range must be finite"
        );
        anyhow::ensure!(
            self.min_value < self.max_value,
            "min_value must be below max_value"
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = FeedConfig::default();
        assert_eq!(cfg.symbols.len(), 3);
        assert_eq!(cfg.symbols[0], "AAPL");
        assert_eq!(cfg.tick_interval_ms, 1_000);
        assert_eq!(cfg.bar_interval_ms, 60_000);
        assert_eq!(cfg.point_capacity, 300);
        assert_eq!(cfg.history_count, 300);
        assert!((cfg.min_value - 50.0).abs() < f64::EPSILON);
        assert!((cfg.max_value - 200.0).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: FeedConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.tick_interval_ms, 1_000);
        assert_eq!(cfg.bar_interval_ms, 60_000);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbols": ["MSFT"], "tick_interval_ms": 250 }"#;
        let cfg: FeedConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["MSFT"]);
        assert_eq!(cfg.tick_interval_ms, 250);
        assert_eq!(cfg.point_capacity, 300);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = FeedConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: FeedConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.symbols, cfg2.symbols);
        assert_eq!(cfg.tick_interval_ms, cfg2.tick_interval_ms);
        assert_eq!(cfg.bind_addr, cfg2.bind_addr);
    }

    #[test]
    fn validate_rejects_inverted_clamp_range() {
        let mut cfg = FeedConfig::default();
        cfg.min_value = 300.0;
        assert!(cfg.validate().is_err());

        cfg.min_value = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn save_then_load_roundtrip_on_disk() {
        let path = std::env::temp_dir().join(format!(
            "pulsefeed_config_test_{}.json",
            std::process::id()
        ));

        let mut cfg = FeedConfig::default();
        cfg.symbols = vec!["MSFT".to_string()];
        cfg.tick_interval_ms = 500;
        cfg.save(&path).unwrap();

        let loaded = FeedConfig::load(&path).unwrap();
        assert_eq!(loaded.symbols, vec!["MSFT"]);
        assert_eq!(loaded.tick_interval_ms, 500);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let mut cfg = FeedConfig::default();
        cfg.tick_interval_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = FeedConfig::default();
        cfg.bar_interval_ms = 0;
        assert!(cfg.validate().is_err());
    }
}
