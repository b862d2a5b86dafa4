// =============================================================================
// State Publisher (C10) — assembles and broadcasts TradingState snapshots
// =============================================================================
//
// Single source of truth for anything the API surface shows a client.
// `build_snapshot` takes one read pass across the position manager and
// settings, never interleaving with a mutation of either. A background task
// calls it every two seconds and pushes the result to a broadcast channel;
// slow subscribers lag and drop old frames rather than stall the publisher.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info};

use crate::config::TradingSettings;
use crate::persistence::Sink;
use crate::position_manager::PositionManager;
use crate::types::{Position, Trade, WatchlistItem};

const PUBLISH_INTERVAL: Duration = Duration::from_secs(2);
const BROADCAST_CAPACITY: usize = 32;

/// Full, serialisable view of the engine offered to clients.
#[derive(Debug, Clone, Serialize)]
pub struct TradingState {
    pub trades: Vec<Trade>,
    pub positions: Vec<Position>,
    pub total_pnl: f64,
    pub day_pnl: f64,
    pub trading_balance: f64,
    pub available_balance: f64,
    pub settings: TradingSettings,
    pub watchlist: Vec<WatchlistItem>,
}

struct DailyPnl {
    value: f64,
    /// UTC `YYYY-MM-DD` of the day this value accumulates.
    date: String,
}

pub struct StatePublisher {
    position_manager: Arc<PositionManager>,
    settings: RwLock<TradingSettings>,
    watchlist: RwLock<Vec<WatchlistItem>>,
    trading_balance: f64,
    day_pnl: RwLock<DailyPnl>,
    tx: broadcast::Sender<TradingState>,
    sink: Option<Arc<dyn Sink>>,
}

impl StatePublisher {
    pub fn new(position_manager: Arc<PositionManager>, settings: TradingSettings, trading_balance: f64) -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            position_manager,
            settings: RwLock::new(settings),
            watchlist: RwLock::new(Vec::new()),
            trading_balance,
            day_pnl: RwLock::new(DailyPnl {
                value: 0.0,
                date: today_utc(),
            }),
            tx,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradingState> {
        self.tx.subscribe()
    }

    pub fn settings(&self) -> TradingSettings {
        self.settings.read().clone()
    }

    pub fn set_settings(&self, settings: TradingSettings) {
        *self.settings.write() = settings.clone();
        if let Some(sink) = self.sink.clone() {
            tokio::spawn(async move {
                if let Err(e) = sink.save_settings(&settings).await {
                    tracing::warn!(error = %e, "failed to persist trading settings");
                }
            });
        }
    }

    pub fn set_watchlist(&self, watchlist: Vec<WatchlistItem>) {
        *self.watchlist.write() = watchlist.clone();
        if let Some(sink) = self.sink.clone() {
            tokio::spawn(async move {
                if let Err(e) = sink.save_watchlist(&watchlist).await {
                    tracing::warn!(error = %e, "failed to persist watchlist");
                }
            });
        }
    }

    /// Roll `day_pnl` over to zero if the UTC date has changed, then add
    /// `pnl` to the running total. Called by C9 whenever a position closes.
    pub fn record_realized_pnl(&self, pnl: f64) {
        let mut day = self.day_pnl.write();
        let today = today_utc();
        if day.date != today {
            debug!(previous = %day.date, current = %today, "day boundary crossed, resetting day_pnl");
            day.value = 0.0;
            day.date = today;
        }
        day.value += pnl;
    }

    pub fn day_pnl(&self) -> f64 {
        let mut day = self.day_pnl.write();
        let today = today_utc();
        if day.date != today {
            day.value = 0.0;
            day.date = today;
        }
        day.value
    }

    /// Assemble a full snapshot under one logical read pass.
    pub fn build_snapshot(&self) -> TradingState {
        let positions = self.position_manager.positions_snapshot();
        let trades = self.position_manager.trades_snapshot();

        let realized_total: f64 = trades.iter().filter_map(|t| t.pnl).sum();
        let unrealized_total: f64 = positions.iter().map(|p| p.unrealized_pnl).sum();
        let total_pnl = realized_total + unrealized_total;

        let committed = self.position_manager.total_position_cost();
        let available_balance = (self.trading_balance - committed).max(0.0);

        TradingState {
            trades,
            positions,
            total_pnl,
            day_pnl: self.day_pnl(),
            trading_balance: self.trading_balance,
            available_balance,
            settings: self.settings(),
            watchlist: self.watchlist.read().clone(),
        }
    }

    /// Spawn the periodic broadcast task. Returns immediately; the task runs
    /// until the publisher is dropped.
    pub fn spawn_publish_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = interval(PUBLISH_INTERVAL);
            loop {
                ticker.tick().await;
                let snapshot = self.build_snapshot();
                // `send` only errors when there are no receivers; that's fine,
                // it just means nobody's watching right now.
                let _ = self.tx.send(snapshot);
            }
        });
        info!("state publisher loop started");
    }
}

fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
