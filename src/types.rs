// =============================================================================
// Core data model for the scalping engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Immutable OHLCV bar for a fixed interval.
///
/// Invariants enforced by constructors/parsers, never re-checked downstream:
/// `low <= open,close <= high`, `volume >= 0`, `close_time_ms > open_time_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time_ms: i64,
    pub close_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

/// Derived, never stored as source of truth. Cached by the indicator cache
/// with `computed_at`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub ema9: f64,
    pub ema21: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub vwap: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub volume: f64,
    pub avg_volume20: f64,
    pub swing_high: f64,
    pub swing_low: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl SignalKind {
    pub fn is_bullish(&self) -> bool {
        matches!(self, SignalKind::Buy | SignalKind::StrongBuy)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, SignalKind::Sell | SignalKind::StrongSell)
    }
}

/// Pure function of an IndicatorSnapshot plus the last close. Immutable value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    Timeout,
    SignalExit,
    Manual,
}

/// Open long exposure to a symbol awaiting exit.
///
/// Invariants: only long, at most one active position per symbol (enforced
/// by `PositionManager`), `qty * avg_entry_price <= settings.max_position_size`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub qty: f64,
    pub avg_entry_price: f64,
    pub entry_time_ms: i64,
    pub target_price: Option<f64>,
    pub stop_loss_price: Option<f64>,
    pub unrealized_pnl: f64,
    pub current_value: f64,
    /// Id of the BUY Trade that opened this position; the matching SELL
    /// Trade references it back via `entry_trade_id`.
    pub entry_trade_id: String,
}

/// Immutable ledger entry. Append-only; a SELL finalizes the sibling BUY's
/// `pnl`/`exit_price`/`hold_time_sec` fields by matching on symbol + entry id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub qty: f64,
    pub ts_ms: i64,
    pub signal_kind: SignalKind,
    pub confidence: f64,
    pub pnl: Option<f64>,
    pub exit_price: Option<f64>,
    pub hold_time_sec: Option<i64>,
    /// For SELL trades: the id of the BUY trade this one closes.
    pub entry_trade_id: Option<String>,
    pub close_reason: Option<CloseReason>,
}

/// `{symbol, name, lastPrice, change24h, changePct24h, volume24h, lastUpdate, isActive}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub symbol: String,
    pub name: String,
    pub last_price: f64,
    pub change24h: f64,
    pub change_pct24h: f64,
    pub volume24h: f64,
    pub last_update_ms: i64,
    pub is_active: bool,
}

/// Per-symbol 24h ticker, as returned by the market client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceData {
    pub last_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub volume: f64,
}

/// Lifecycle state of the trading loop (C9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::Stopped
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_price_is_average_of_hlc() {
        let c = Candle {
            open_time_ms: 0,
            close_time_ms: 1,
            open: 10.0,
            high: 12.0,
            low: 8.0,
            close: 11.0,
            volume: 1.0,
        };
        assert!((c.typical_price() - (12.0 + 8.0 + 11.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn signal_kind_classification() {
        assert!(SignalKind::StrongBuy.is_bullish());
        assert!(SignalKind::Buy.is_bullish());
        assert!(!SignalKind::Hold.is_bullish());
        assert!(SignalKind::Sell.is_bearish());
        assert!(SignalKind::StrongSell.is_bearish());
        assert!(!SignalKind::Hold.is_bearish());
    }

    #[test]
    fn engine_state_defaults_to_stopped() {
        assert_eq!(EngineState::default(), EngineState::Stopped);
    }
}
