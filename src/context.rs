// =============================================================================
// Application Context — wiring shared across the API surface
// =============================================================================
//
// Thin handle bundling the Arc'd subsystems the REST/WS layer needs. Built
// once at startup and cloned cheaply (every field is already an Arc) into
// each axum handler via `State`.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::cache::IndicatorCache;
use crate::config::TradingSettings;
use crate::engine::TradingEngine;
use crate::market::candle_store::CandleStore;
use crate::market::client::MarketClient;
use crate::position_manager::PositionManager;
use crate::state::StatePublisher;

#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<TradingEngine>,
    pub publisher: Arc<StatePublisher>,
    pub positions: Arc<PositionManager>,
    pub market: Arc<MarketClient>,
    pub candles: Arc<CandleStore>,
    pub cache: Arc<IndicatorCache>,
    pub settings_path: String,
    pub start_time: Instant,
}

impl AppContext {
    pub fn new(
        settings_path: impl Into<String>,
        engine: Arc<TradingEngine>,
        publisher: Arc<StatePublisher>,
        positions: Arc<PositionManager>,
        market: Arc<MarketClient>,
        candles: Arc<CandleStore>,
        cache: Arc<IndicatorCache>,
    ) -> Self {
        Self {
            engine,
            publisher,
            positions,
            market,
            candles,
            cache,
            settings_path: settings_path.into(),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn save_settings(&self, settings: &TradingSettings) {
        if let Err(e) = settings.save(&self.settings_path) {
            tracing::warn!(error = %e, "failed to persist trading settings");
        }
    }
}
