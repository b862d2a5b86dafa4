// =============================================================================
// Scalp Engine — entry point
// =============================================================================
//
// Boot sequence: load env config, restore persisted trading settings if
// present, wire the market/stream/cache/position/publisher/engine stack,
// start the trading loop, mount the API, run until Ctrl-C, persist settings
// and stop cleanly.
// =============================================================================

mod api;
mod cache;
mod config;
mod context;
mod engine;
mod error;
mod indicators;
mod market;
mod persistence;
mod position_manager;
mod rate_limiter;
mod retry;
mod risk;
mod signal;
mod state;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cache::IndicatorCache;
use crate::config::RuntimeConfig;
use crate::context::AppContext;
use crate::engine::TradingEngine;
use crate::market::candle_store::{CandleStore, DEFAULT_MAX_WINDOW};
use crate::market::client::MarketClient;
use crate::market::stream::StreamClient;
use crate::persistence::{NullSink, Sink, SqliteSink};
use crate::position_manager::PositionManager;
use crate::rate_limiter::RateLimiter;
use crate::state::StatePublisher;

const SETTINGS_PATH: &str = "trading_settings.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = RuntimeConfig::from_env()?;

    if let Ok(loaded) = config::TradingSettings::load(SETTINGS_PATH) {
        info!(path = SETTINGS_PATH, "restored trading settings from disk");
        config.settings = loaded;
    }

    info!(
        symbols = ?config.symbols,
        environment = %config.environment,
        port = config.port,
        "scalp engine starting"
    );

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_capacity,
        Duration::from_millis(config.rate_limit_interval_ms),
    ));
    let market = Arc::new(MarketClient::new(
        config.api_base_url.clone(),
        limiter,
        config.retry_attempts,
        Duration::from_millis(config.retry_delay_ms),
    ));
    let stream = Arc::new(StreamClient::new(config.stream_url.clone()));
    let candles = Arc::new(CandleStore::new(DEFAULT_MAX_WINDOW));
    let cache = Arc::new(IndicatorCache::default());

    let sink: Arc<dyn Sink> = match &config.db_url {
        Some(db_url) => match SqliteSink::connect(db_url).await {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                warn!(error = %e, "failed to connect to DB_URL, falling back to no persistence");
                Arc::new(NullSink)
            }
        },
        None => Arc::new(NullSink),
    };

    let positions = Arc::new(PositionManager::new().with_sink(sink.clone()));
    let publisher = Arc::new(
        StatePublisher::new(positions.clone(), config.settings.clone(), config.initial_balance)
            .with_sink(sink),
    );
    publisher.clone().spawn_publish_loop();

    let engine = Arc::new(TradingEngine::new(
        config.symbols.clone(),
        config.indicator_periods,
        candles.clone(),
        cache.clone(),
        market.clone(),
        stream.clone(),
        positions.clone(),
        publisher.clone(),
    ));
    engine.start();

    let ctx = AppContext::new(
        SETTINGS_PATH,
        engine.clone(),
        publisher.clone(),
        positions,
        market,
        candles,
        cache,
    );

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let app = api::rest::router(ctx);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                warn!(error = %e, "API server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    engine.stop();
    if let Err(e) = publisher.settings().save(SETTINGS_PATH) {
        warn!(error = %e, "failed to persist trading settings on shutdown");
    }

    info!("scalp engine stopped");
    Ok(())
}
