// =============================================================================
// Trading Loop (C9) — per-symbol decision pipeline plus lifecycle control
// =============================================================================
//
// One task per symbol: preferentially driven by the streaming tick feed
// (C3), falling back to a 10s REST poll (C2) if the stream hasn't produced
// a tick recently. Every tick runs the same pipeline: append candle, compute
// (or reuse cached) indicator snapshot, synthesize a signal, evaluate the
// risk gate, mutate the position manager. A separate 1s ticker checks
// time-based exits independent of price movement.
//
// Lifecycle: Stopped -> Starting -> Running -> Stopping -> Stopped. `start()`
// after a clean stop is idempotent; disabling trading (via settings)
// suspends new entries only, exits keep firing.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::cache::IndicatorCache;
use crate::config::IndicatorPeriods;
use crate::error::EngineError;
use crate::indicators::pipeline::{compute_snapshot, volume_ratio};
use crate::market::candle_store::CandleStore;
use crate::market::client::MarketClient;
use crate::market::stream::{StreamClient, Tick};
use crate::position_manager::PositionManager;
use crate::risk::{entry_allowed, exit_reason, planned_qty, BookState, EntryIntent};
use crate::signal::synthesize;
use crate::state::StatePublisher;
use crate::types::{Candle, EngineState};

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const EXIT_CHECK_INTERVAL: Duration = Duration::from_secs(1);
const KLINE_INTERVAL: &str = "1m";
const KLINE_LIMIT: u32 = 300;
const KLINE_INTERVAL_MS: i64 = 60_000;

/// Bucket a ticker tick into the in-progress minute candle. Re-appending a
/// tick that lands in the same minute as the store's tail replaces it in
/// place (see `CandleStore::append`), so this naturally builds a live candle
/// out of repeated ticks and rolls to a new one once the minute advances.
fn candle_from_tick(tick: &Tick) -> Candle {
    let open_time_ms = (tick.event_time_ms / KLINE_INTERVAL_MS) * KLINE_INTERVAL_MS;
    Candle {
        open_time_ms,
        close_time_ms: open_time_ms + KLINE_INTERVAL_MS - 1,
        open: tick.open,
        high: tick.high,
        low: tick.low,
        close: tick.price,
        volume: tick.data.volume,
    }
}

pub struct TradingEngine {
    state: RwLock<EngineState>,
    running: AtomicBool,
    symbols: Vec<String>,
    periods: IndicatorPeriods,
    candles: Arc<CandleStore>,
    cache: Arc<IndicatorCache>,
    market: Arc<MarketClient>,
    stream: Arc<StreamClient>,
    positions: Arc<PositionManager>,
    publisher: Arc<StatePublisher>,
}

impl TradingEngine {
    pub fn new(
        symbols: Vec<String>,
        periods: IndicatorPeriods,
        candles: Arc<CandleStore>,
        cache: Arc<IndicatorCache>,
        market: Arc<MarketClient>,
        stream: Arc<StreamClient>,
        positions: Arc<PositionManager>,
        publisher: Arc<StatePublisher>,
    ) -> Self {
        Self {
            state: RwLock::new(EngineState::Stopped),
            running: AtomicBool::new(false),
            symbols,
            periods,
            candles,
            cache,
            market,
            stream,
            positions,
            publisher,
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    /// Start the trading loop. Idempotent once `Running`; a clean `stop()`
    /// allows a later `start()` to spin everything back up.
    pub fn start(self: &Arc<Self>) {
        {
            let mut state = self.state.write();
            if *state == EngineState::Running || *state == EngineState::Starting {
                return;
            }
            *state = EngineState::Starting;
        }
        self.running.store(true, Ordering::SeqCst);

        for symbol in self.symbols.clone() {
            let this = self.clone();
            tokio::spawn(async move {
                this.warm_up(&symbol).await;
                this.run_symbol_loop(symbol).await;
            });
        }

        let this = self.clone();
        tokio::spawn(async move {
            this.run_exit_ticker().await;
        });

        *self.state.write() = EngineState::Running;
        info!("trading engine started");
    }

    pub fn stop(&self) {
        *self.state.write() = EngineState::Stopping;
        self.running.store(false, Ordering::SeqCst);
        self.stream.close();
        *self.state.write() = EngineState::Stopped;
        info!("trading engine stopped");
    }

    async fn warm_up(&self, symbol: &str) {
        if self.candles.len(symbol) >= self.periods.ema200 {
            return;
        }
        match self.market.fetch_candles(symbol, KLINE_INTERVAL, KLINE_LIMIT).await {
            Ok(candles) => {
                for candle in candles {
                    if let Err(e) = self.candles.append(symbol, candle) {
                        warn!(symbol, error = %e, "rejected candle during warm-up");
                    }
                }
                info!(symbol, count = self.candles.len(symbol), "warm-up complete");
            }
            Err(e) => error!(symbol, error = %e, "warm-up fetch failed"),
        }
    }

    async fn run_symbol_loop(self: Arc<Self>, symbol: String) {
        let mut rx = self.stream.subscribe(&symbol);
        let mut poll_timer = tokio::time::interval(POLL_INTERVAL);

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                tick = rx.recv() => {
                    match tick {
                        Some(tick) => self.on_candle(&symbol, candle_from_tick(&tick)).await,
                        None => {
                            warn!(symbol, "stream channel closed, relying on polling");
                            tokio::time::sleep(POLL_INTERVAL).await;
                        }
                    }
                }
                _ = poll_timer.tick() => {
                    match self.market.fetch_candles(&symbol, KLINE_INTERVAL, 1).await {
                        Ok(candles) => {
                            if let Some(candle) = candles.into_iter().last() {
                                self.on_candle(&symbol, candle).await;
                            }
                        }
                        Err(e) => warn!(symbol, error = %e, "poll fallback fetch failed"),
                    }
                }
            }
        }
    }

    async fn on_candle(&self, symbol: &str, candle: Candle) {
        if let Err(e) = self.candles.append(symbol, candle) {
            warn!(symbol, error = %e, "rejected candle update");
            return;
        }
        let price = candle.close;
        self.positions.mark(symbol, price);

        let candles = self.candles.snapshot(symbol);
        if candles.len() < self.periods.ema200 {
            return;
        }

        let (snapshot, signal) = match self.cache.lookup(symbol) {
            Some(cached) => cached,
            None => match compute_snapshot(&candles, &self.periods) {
                Ok(snapshot) => {
                    let vr = volume_ratio(&candles);
                    let signal = synthesize(&snapshot, price, vr);
                    self.cache.store(symbol, snapshot, signal);
                    (snapshot, signal)
                }
                Err(EngineError::InsufficientData { .. }) => return,
                Err(e) => {
                    warn!(symbol, error = %e, "indicator pipeline failed");
                    return;
                }
            },
        };

        let now_ms = Utc::now().timestamp_millis();

        if let Some(position) = self.positions.position_for(symbol) {
            let settings = self.publisher.settings();
            if let Some(reason) = exit_reason(&position, price, now_ms, signal, &settings) {
                if let Some(pnl) = self.positions.close(symbol, price, now_ms, reason, signal.kind) {
                    self.publisher.record_realized_pnl(pnl);
                    self.cache.evict(symbol);
                }
            }
            return;
        }

        let settings = self.publisher.settings();
        let snapshot_state = self.publisher.build_snapshot();
        let book = BookState {
            open_position_count: self.positions.position_count(),
            symbol_has_position: false,
            available_balance: snapshot_state.available_balance,
            day_pnl: snapshot_state.day_pnl,
        };
        let intent = EntryIntent {
            symbol,
            signal,
            price,
        };

        if !entry_allowed(&intent, &book, &settings) {
            return;
        }

        let Some(qty) = planned_qty(snapshot_state.available_balance, price, &settings) else {
            return;
        };

        let stop_loss_price = price * (1.0 - settings.stop_loss_pct / 100.0);
        let target_price = price * (1.0 + settings.take_profit_pct / 100.0);

        self.positions.open(
            symbol,
            qty,
            price,
            now_ms,
            Some(stop_loss_price),
            Some(target_price),
            signal,
        );
    }

    async fn run_exit_ticker(&self) {
        let mut ticker = tokio::time::interval(EXIT_CHECK_INTERVAL);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            let settings = self.publisher.settings();
            let now_ms = Utc::now().timestamp_millis();

            for position in self.positions.positions_snapshot() {
                let price = position.current_value / position.qty.max(f64::EPSILON);
                let hold_signal = crate::types::Signal {
                    kind: crate::types::SignalKind::Hold,
                    confidence: 0.0,
                };
                if let Some(reason) = exit_reason(&position, price, now_ms, hold_signal, &settings) {
                    if let Some(pnl) =
                        self.positions.close(&position.symbol, price, now_ms, reason, hold_signal.kind)
                    {
                        self.publisher.record_realized_pnl(pnl);
                        self.cache.evict(&position.symbol);
                    }
                }
            }
        }
    }
}
