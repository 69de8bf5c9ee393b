// =============================================================================
// PulseFeed — Main Entry Point
// =============================================================================
//
// Synthetic market-data feed for the chart demo pages: per-connection tick
// streams aggregated into live candlestick bars or a sliding line-series
// window, delivered over SSE.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod config;
mod engine;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::FeedConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("PulseFeed starting up");

    let mut config = match FeedConfig::load("feed_config.json") {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            let defaults = FeedConfig::default();
            // Write a starter file so the tunables are discoverable.
            if !std::path::Path::new("feed_config.json").exists() {
                if let Err(e) = defaults.save("feed_config.json") {
                    warn!(error = %e, "Failed to write default config");
                }
            }
            defaults
        }
    };

    // Override symbols and bind address from env if available.
    if let Ok(syms) = std::env::var("PULSEFEED_SYMBOLS") {
        let symbols: Vec<String> = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if !symbols.is_empty() {
            config.symbols = symbols;
        }
    }
    if let Ok(addr) = std::env::var("PULSEFEED_BIND_ADDR") {
        config.bind_addr = addr;
    }

    config.validate().context("invalid feed configuration")?;

    info!(
        symbols = ?config.symbols,
        tick_interval_ms = config.tick_interval_ms,
        bar_interval_ms = config.bar_interval_ms,
        "Feed configured"
    );

    // ── 2. Build shared state & serve ────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config));
    let app = api::rest::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "PulseFeed listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    info!("PulseFeed stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
