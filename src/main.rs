mod api;
mod cache;
mod config;
mod engine;
mod error;
mod provider;
mod series;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::cache::{CacheSweeper, SeriesCache};
use crate::config::Config;
use crate::engine::EngineConfig;
use crate::error::Result;
use crate::provider::{PriceProvider, YahooChartProvider};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let engine = EngineConfig::from_config(&cfg)?;
    info!(
        "Engine ready: windows={:?} rows, thresholds small=±{:.1}% big=±{:.1}%",
        cfg.lookback_windows,
        cfg.severity_small_move * 100.0,
        cfg.severity_big_move * 100.0,
    );

    // --- Collaborators ---
    let provider: Arc<dyn PriceProvider> = Arc::new(YahooChartProvider::new(&cfg)?);
    let cache = SeriesCache::new(Duration::from_secs(cfg.cache_ttl_secs));
    info!(
        "Series cache ready (ttl={}s, sweep every {}s)",
        cfg.cache_ttl_secs, cfg.cache_sweep_interval_secs
    );

    // Cache sweeper (background)
    let sweeper = CacheSweeper::new(
        Arc::clone(&cache),
        Duration::from_secs(cfg.cache_sweep_interval_secs),
    );
    tokio::spawn(async move { sweeper.run().await });

    // --- HTTP API server ---
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let api_state = ApiState {
        cfg: Arc::new(cfg),
        engine: Arc::new(engine),
        provider,
        cache,
        health: Arc::new(HealthState::new()),
    };
    let app = router(api_state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
