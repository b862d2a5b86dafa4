// =============================================================================
// Risk Gate (C7) — pure predicate over (intent, state, settings, price)
// =============================================================================
//
// Two entry points: `entry_allowed` and `exit_reason`. Neither touches shared
// state directly — callers (C9) pass in whatever slice of TradingState the
// predicate needs, so the gate itself stays trivially testable.
// =============================================================================

use crate::config::TradingSettings;
use crate::types::{CloseReason, Position, Signal, SignalKind};

/// Everything the entry predicate needs about the candidate trade.
pub struct EntryIntent<'a> {
    pub symbol: &'a str,
    pub signal: Signal,
    pub price: f64,
}

/// Everything the entry predicate needs about current book state.
pub struct BookState {
    pub open_position_count: usize,
    pub symbol_has_position: bool,
    pub available_balance: f64,
    pub day_pnl: f64,
}

/// `true` iff every entry condition in the specification holds.
pub fn entry_allowed(intent: &EntryIntent, book: &BookState, settings: &TradingSettings) -> bool {
    if !settings.is_enabled {
        return false;
    }
    if !intent.signal.kind.is_bullish() {
        return false;
    }
    if intent.signal.confidence < settings.min_confidence {
        return false;
    }
    if book.open_position_count >= settings.max_positions as usize {
        return false;
    }
    if book.symbol_has_position {
        return false;
    }
    if book.day_pnl <= -settings.max_daily_loss_abs {
        return false;
    }

    match planned_cost(book.available_balance, intent.price, settings) {
        Some(cost) => cost <= book.available_balance && cost <= settings.max_position_size,
        None => false,
    }
}

/// Notional cost of the position this intent would actually open, sized
/// against the caller's real available balance (not an unbounded one).
fn planned_cost(balance: f64, price: f64, settings: &TradingSettings) -> Option<f64> {
    let qty = planned_qty(balance, price, settings)?;
    Some(qty * price)
}

/// `floor((balance * riskPerTradePct/100) / (price * stopLossPct/100))`,
/// capped by `maxPositionSize / price`, `None` if that rounds below 1 unit.
pub fn planned_qty(balance: f64, price: f64, settings: &TradingSettings) -> Option<f64> {
    if price <= 0.0 {
        return None;
    }
    let risk_amount = balance * (settings.risk_per_trade_pct / 100.0);
    let stop_distance = price * (settings.stop_loss_pct / 100.0);
    if stop_distance <= 0.0 {
        return None;
    }
    let raw_qty = (risk_amount / stop_distance).floor();
    let cap_qty = (settings.max_position_size / price).floor();
    let qty = raw_qty.min(cap_qty);

    if qty < 1.0 {
        None
    } else {
        Some(qty)
    }
}

/// `true` iff the position must exit at `price`/`now_ms` given `signal`.
pub fn exit_reason(
    position: &Position,
    price: f64,
    now_ms: i64,
    signal: Signal,
    settings: &TradingSettings,
) -> Option<CloseReason> {
    if let Some(stop) = position.stop_loss_price {
        if price <= stop {
            return Some(CloseReason::StopLoss);
        }
    }
    if let Some(target) = position.target_price {
        if price >= target {
            return Some(CloseReason::TakeProfit);
        }
    }

    let held_sec = (now_ms - position.entry_time_ms) / 1000;
    if held_sec >= settings.max_hold_time_sec {
        return Some(CloseReason::Timeout);
    }

    if signal.kind.is_bearish() && signal.confidence >= settings.min_confidence {
        return Some(CloseReason::SignalExit);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold_signal(kind: SignalKind) -> Signal {
        Signal {
            kind,
            confidence: 0.0,
        }
    }

    fn settings() -> TradingSettings {
        TradingSettings {
            min_confidence: 60.0,
            max_position_size: 10_000.0,
            risk_per_trade_pct: 2.0,
            max_daily_loss_abs: 500.0,
            max_positions: 5,
            stop_loss_pct: 1.0,
            take_profit_pct: 2.0,
            max_hold_time_sec: 3600,
            scaling_factor: 1.0,
            is_enabled: true,
        }
    }

    fn strong_buy(confidence: f64) -> Signal {
        Signal {
            kind: SignalKind::StrongBuy,
            confidence,
        }
    }

    #[test]
    fn oversold_entry_scenario_computes_expected_qty() {
        let settings = settings();
        let price = 100.0;
        let qty = planned_qty(100_000.0, price, &settings).unwrap();
        let expected = ((100_000.0 * 0.02) / (price * 0.01)).floor();
        assert_eq!(qty, expected.min(10_000.0 / price));
    }

    #[test]
    fn entry_rejected_when_trading_disabled() {
        let mut settings = settings();
        settings.is_enabled = false;
        let intent = EntryIntent {
            symbol: "BTCUSDT",
            signal: strong_buy(90.0),
            price: 100.0,
        };
        let book = BookState {
            open_position_count: 0,
            symbol_has_position: false,
            available_balance: 100_000.0,
            day_pnl: 0.0,
        };
        assert!(!entry_allowed(&intent, &book, &settings));
    }

    #[test]
    fn entry_rejected_below_min_confidence() {
        let settings = settings();
        let intent = EntryIntent {
            symbol: "BTCUSDT",
            signal: strong_buy(40.0),
            price: 100.0,
        };
        let book = BookState {
            open_position_count: 0,
            symbol_has_position: false,
            available_balance: 100_000.0,
            day_pnl: 0.0,
        };
        assert!(!entry_allowed(&intent, &book, &settings));
    }

    #[test]
    fn entry_rejected_at_position_cap() {
        let settings = settings();
        let intent = EntryIntent {
            symbol: "BTCUSDT",
            signal: strong_buy(90.0),
            price: 100.0,
        };
        let book = BookState {
            open_position_count: 5,
            symbol_has_position: false,
            available_balance: 100_000.0,
            day_pnl: 0.0,
        };
        assert!(!entry_allowed(&intent, &book, &settings));
    }

    #[test]
    fn entry_rejected_when_symbol_already_has_position() {
        let settings = settings();
        let intent = EntryIntent {
            symbol: "BTCUSDT",
            signal: strong_buy(90.0),
            price: 100.0,
        };
        let book = BookState {
            open_position_count: 1,
            symbol_has_position: true,
            available_balance: 100_000.0,
            day_pnl: 0.0,
        };
        assert!(!entry_allowed(&intent, &book, &settings));
    }

    #[test]
    fn entry_rejected_after_daily_loss_halt() {
        let settings = settings();
        let intent = EntryIntent {
            symbol: "BTCUSDT",
            signal: strong_buy(90.0),
            price: 100.0,
        };
        let book = BookState {
            open_position_count: 0,
            symbol_has_position: false,
            available_balance: 100_000.0,
            day_pnl: -600.0,
        };
        assert!(!entry_allowed(&intent, &book, &settings));
    }

    #[test]
    fn entry_accepted_when_all_conditions_hold() {
        let settings = settings();
        let intent = EntryIntent {
            symbol: "BTCUSDT",
            signal: strong_buy(90.0),
            price: 100.0,
        };
        let book = BookState {
            open_position_count: 0,
            symbol_has_position: false,
            available_balance: 100_000.0,
            day_pnl: 0.0,
        };
        assert!(entry_allowed(&intent, &book, &settings));
    }

    #[test]
    fn exit_on_stop_loss() {
        let settings = settings();
        let position = Position {
            id: "p1".into(),
            symbol: "BTCUSDT".into(),
            qty: 1.0,
            avg_entry_price: 100.0,
            entry_time_ms: 0,
            target_price: Some(102.0),
            stop_loss_price: Some(99.0),
            unrealized_pnl: 0.0,
            current_value: 100.0,
            entry_trade_id: "t1".into(),
        };
        let reason = exit_reason(&position, 98.0, 1_000, hold_signal(SignalKind::Hold), &settings);
        assert_eq!(reason, Some(CloseReason::StopLoss));
    }

    #[test]
    fn exit_on_take_profit() {
        let settings = settings();
        let position = Position {
            id: "p1".into(),
            symbol: "BTCUSDT".into(),
            qty: 1.0,
            avg_entry_price: 100.0,
            entry_time_ms: 0,
            target_price: Some(102.0),
            stop_loss_price: Some(99.0),
            unrealized_pnl: 0.0,
            current_value: 100.0,
            entry_trade_id: "t1".into(),
        };
        let reason = exit_reason(&position, 103.0, 1_000, hold_signal(SignalKind::Hold), &settings);
        assert_eq!(reason, Some(CloseReason::TakeProfit));
    }

    #[test]
    fn exit_on_timeout() {
        let settings = settings();
        let position = Position {
            id: "p1".into(),
            symbol: "BTCUSDT".into(),
            qty: 1.0,
            avg_entry_price: 100.0,
            entry_time_ms: 0,
            target_price: Some(200.0),
            stop_loss_price: Some(1.0),
            unrealized_pnl: 0.0,
            current_value: 100.0,
            entry_trade_id: "t1".into(),
        };
        let reason = exit_reason(
            &position,
            100.0,
            settings.max_hold_time_sec * 1000 + 1,
            hold_signal(SignalKind::Hold),
            &settings,
        );
        assert_eq!(reason, Some(CloseReason::Timeout));
    }

    #[test]
    fn no_exit_when_nothing_triggers() {
        let settings = settings();
        let position = Position {
            id: "p1".into(),
            symbol: "BTCUSDT".into(),
            qty: 1.0,
            avg_entry_price: 100.0,
            entry_time_ms: 0,
            target_price: Some(200.0),
            stop_loss_price: Some(1.0),
            unrealized_pnl: 0.0,
            current_value: 100.0,
            entry_trade_id: "t1".into(),
        };
        let reason = exit_reason(&position, 100.0, 1_000, hold_signal(SignalKind::Hold), &settings);
        assert_eq!(reason, None);
    }

    #[test]
    fn planned_qty_rejects_when_below_one_unit() {
        let settings = settings();
        let qty = planned_qty(1.0, 100_000.0, &settings);
        assert_eq!(qty, None);
    }

    #[test]
    fn entry_accepted_when_sized_cost_is_well_under_max_position_size() {
        let mut settings = settings();
        settings.risk_per_trade_pct = 2.0;
        settings.stop_loss_pct = 10.0;
        settings.max_position_size = 10_000.0;
        let intent = EntryIntent {
            symbol: "BTCUSDT",
            signal: strong_buy(90.0),
            price: 100.0,
        };
        let book = BookState {
            open_position_count: 0,
            symbol_has_position: false,
            available_balance: 3_000.0,
            day_pnl: 0.0,
        };
        // balance=3000, risk=2%, stop=10%, price=100 -> qty=6, cost=600, well
        // under both the 3000 balance and the 10000 max position size.
        assert!(entry_allowed(&intent, &book, &settings));
    }
}
