// =============================================================================
// Position Manager (C8) — open positions plus the append-only trade ledger
// =============================================================================
//
// One active position per symbol, enforced at `open()`. Closing a position
// appends a SELL Trade that references the opening BUY Trade via
// `entry_trade_id`, finalising `pnl`/`exit_price`/`hold_time_sec` on it.
// Thread-safety: both maps live behind one `parking_lot::RwLock` each so a
// snapshot of one never interleaves with a mutation of the other under the
// same caller.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::persistence::Sink;
use crate::types::{CloseReason, Position, Side, Signal, SignalKind, Trade};

pub struct PositionManager {
    positions: RwLock<HashMap<String, Position>>,
    trades: RwLock<Vec<Trade>>,
    sink: Option<Arc<dyn Sink>>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
            trades: RwLock::new(Vec::new()),
            sink: None,
        }
    }

    /// Attach a write-through persistence sink. Writes after this point are
    /// mirrored to the sink on a background task; the in-memory state
    /// remains the source of truth for every read.
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn persist_trade(&self, trade: Trade) {
        if let Some(sink) = self.sink.clone() {
            tokio::spawn(async move {
                if let Err(e) = sink.record_trade(&trade).await {
                    warn!(error = %e, trade_id = %trade.id, "failed to persist trade");
                }
            });
        }
    }

    fn persist_open(&self, position: Position) {
        if let Some(sink) = self.sink.clone() {
            tokio::spawn(async move {
                if let Err(e) = sink.upsert_position(&position).await {
                    warn!(error = %e, symbol = %position.symbol, "failed to persist position");
                }
            });
        }
    }

    fn persist_close(&self, symbol: String) {
        if let Some(sink) = self.sink.clone() {
            tokio::spawn(async move {
                if let Err(e) = sink.close_position(&symbol).await {
                    warn!(error = %e, symbol, "failed to persist position close");
                }
            });
        }
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.read().contains_key(symbol)
    }

    pub fn position_count(&self) -> usize {
        self.positions.read().len()
    }

    pub fn position_for(&self, symbol: &str) -> Option<Position> {
        self.positions.read().get(symbol).cloned()
    }

    pub fn positions_snapshot(&self) -> Vec<Position> {
        self.positions.read().values().cloned().collect()
    }

    pub fn trades_snapshot(&self) -> Vec<Trade> {
        self.trades.read().clone()
    }

    /// Total cost (`qty * avg_entry_price`) of every open position.
    pub fn total_position_cost(&self) -> f64 {
        self.positions
            .read()
            .values()
            .map(|p| p.qty * p.avg_entry_price)
            .sum()
    }

    /// Open a new position, rejecting symbols that already have one active.
    /// Records the opening BUY trade and returns the new position.
    pub fn open(
        &self,
        symbol: &str,
        qty: f64,
        price: f64,
        now_ms: i64,
        stop_loss_price: Option<f64>,
        target_price: Option<f64>,
        signal: Signal,
    ) -> Option<Position> {
        let mut positions = self.positions.write();
        if positions.contains_key(symbol) {
            warn!(symbol, "refusing to open a second position for the same symbol");
            return None;
        }

        let trade_id = Uuid::new_v4().to_string();
        let position_id = Uuid::new_v4().to_string();

        let trade = Trade {
            id: trade_id.clone(),
            symbol: symbol.to_string(),
            side: Side::Buy,
            price,
            qty,
            ts_ms: now_ms,
            signal_kind: signal.kind,
            confidence: signal.confidence,
            pnl: None,
            exit_price: None,
            hold_time_sec: None,
            entry_trade_id: None,
            close_reason: None,
        };

        let position = Position {
            id: position_id,
            symbol: symbol.to_string(),
            qty,
            avg_entry_price: price,
            entry_time_ms: now_ms,
            target_price,
            stop_loss_price,
            unrealized_pnl: 0.0,
            current_value: qty * price,
            entry_trade_id: trade_id,
        };

        info!(symbol, qty, price, "position opened");
        self.trades.write().push(trade.clone());
        positions.insert(symbol.to_string(), position.clone());
        self.persist_trade(trade);
        self.persist_open(position.clone());
        Some(position)
    }

    /// Recompute `unrealized_pnl`/`current_value` for an open position at the
    /// latest price. No-op if the symbol has no open position.
    pub fn mark(&self, symbol: &str, price: f64) {
        let mut positions = self.positions.write();
        if let Some(pos) = positions.get_mut(symbol) {
            pos.unrealized_pnl = (price - pos.avg_entry_price) * pos.qty;
            pos.current_value = pos.qty * price;
        }
    }

    /// Close the open position for `symbol`, appending the finalising SELL
    /// trade. Returns the realised PnL, or `None` if no position was open.
    pub fn close(
        &self,
        symbol: &str,
        price: f64,
        now_ms: i64,
        reason: CloseReason,
        signal_kind: SignalKind,
    ) -> Option<f64> {
        let mut positions = self.positions.write();
        let position = positions.remove(symbol)?;

        let pnl = (price - position.avg_entry_price) * position.qty;
        let hold_time_sec = (now_ms - position.entry_time_ms) / 1000;

        let exit_trade = Trade {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side: Side::Sell,
            price,
            qty: position.qty,
            ts_ms: now_ms,
            signal_kind,
            confidence: 0.0,
            pnl: Some(pnl),
            exit_price: Some(price),
            hold_time_sec: Some(hold_time_sec),
            entry_trade_id: Some(position.entry_trade_id.clone()),
            close_reason: Some(reason),
        };

        info!(symbol, pnl, ?reason, "position closed");

        let mut trades = self.trades.write();
        if let Some(entry) = trades
            .iter_mut()
            .find(|t| t.id == position.entry_trade_id)
        {
            entry.pnl = Some(pnl);
            entry.exit_price = Some(price);
            entry.hold_time_sec = Some(hold_time_sec);
            entry.close_reason = Some(reason);
        }
        trades.push(exit_trade.clone());
        drop(trades);

        self.persist_trade(exit_trade);
        self.persist_close(symbol.to_string());

        Some(pnl)
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}
