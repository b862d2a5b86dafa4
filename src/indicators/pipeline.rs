// =============================================================================
// Indicator Pipeline (C5) — assembles the full IndicatorSnapshot
// =============================================================================
//
// Requires `len(window) >= ema200_period`; otherwise returns
// `InsufficientData` rather than a partially-warmed snapshot.
// =============================================================================

use crate::config::IndicatorPeriods;
use crate::error::EngineError;
use crate::types::{Candle, IndicatorSnapshot, Trend};

use super::ema::current_ema;
use super::macd::calculate_macd;
use super::rsi::current_rsi;
use super::swing::{calculate_swing_levels, DEFAULT_LOOKBACK as SWING_LOOKBACK};
use super::volume::{average_volume, calculate_volume_ratio};
use super::vwap::{calculate_vwap, DEFAULT_PERIOD as VWAP_PERIOD};

pub fn compute_snapshot(
    candles: &[Candle],
    periods: &IndicatorPeriods,
) -> Result<IndicatorSnapshot, EngineError> {
    if candles.len() < periods.ema200 {
        return Err(EngineError::InsufficientData {
            needed: periods.ema200,
            have: candles.len(),
        });
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let rsi = current_rsi(&closes, periods.rsi).map(|(v, _)| v).unwrap_or(50.0);
    let ema9 = current_ema(&closes, periods.ema9);
    let ema21 = current_ema(&closes, periods.ema21);
    let ema50 = current_ema(&closes, periods.ema50);
    let ema200 = current_ema(&closes, periods.ema200);
    let vwap = calculate_vwap(candles, VWAP_PERIOD);
    let macd = calculate_macd(&closes);
    let volume = candles.last().map(|c| c.volume).unwrap_or(0.0);
    let avg_volume20 = average_volume(candles, 20);
    let volume_ratio = calculate_volume_ratio(candles, 20);
    let swing = calculate_swing_levels(candles, SWING_LOOKBACK);

    let close = closes.last().copied().unwrap_or(0.0);
    let trend = if close > ema50 && ema50 > ema200 {
        Trend::Up
    } else if close < ema50 && ema50 < ema200 {
        Trend::Down
    } else {
        Trend::Flat
    };

    let _ = volume_ratio; // exposed separately for the synthesizer, not stored on the snapshot

    Ok(IndicatorSnapshot {
        rsi,
        ema9,
        ema21,
        ema50,
        ema200,
        vwap,
        macd: macd.macd,
        macd_signal: macd.signal,
        volume,
        avg_volume20,
        swing_high: swing.swing_high,
        swing_low: swing.swing_low,
        trend,
    })
}

/// Volume ratio is computed alongside the snapshot but kept out of
/// `IndicatorSnapshot` itself (it's a signal-synthesizer input, not a stored
/// market reading); callers needing it for scoring call this directly.
pub fn volume_ratio(candles: &[Candle]) -> f64 {
    calculate_volume_ratio(candles, 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_window(n: usize, trend: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + trend * i as f64;
                Candle {
                    open_time_ms: i as i64 * 60_000,
                    close_time_ms: i as i64 * 60_000 + 59_999,
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn window_shorter_than_ema200_is_insufficient_data() {
        let periods = IndicatorPeriods::default();
        let candles = make_window(199, 1.0);
        let result = compute_snapshot(&candles, &periods);
        assert!(matches!(result, Err(EngineError::InsufficientData { needed: 200, have: 199 })));
    }

    #[test]
    fn window_exactly_two_hundred_succeeds() {
        let periods = IndicatorPeriods::default();
        let candles = make_window(200, 1.0);
        let result = compute_snapshot(&candles, &periods);
        assert!(result.is_ok());
    }

    #[test]
    fn purity_identical_input_yields_identical_snapshot() {
        let periods = IndicatorPeriods::default();
        let candles = make_window(250, -0.5);
        let a = compute_snapshot(&candles, &periods).unwrap();
        let b = compute_snapshot(&candles, &periods).unwrap();
        assert_eq!(a.rsi, b.rsi);
        assert_eq!(a.ema9, b.ema9);
        assert_eq!(a.vwap, b.vwap);
        assert_eq!(a.macd, b.macd);
        assert_eq!(a.trend, b.trend);
    }

    #[test]
    fn uptrend_window_produces_up_trend() {
        let periods = IndicatorPeriods::default();
        let candles = make_window(250, 1.0);
        let snap = compute_snapshot(&candles, &periods).unwrap();
        assert_eq!(snap.trend, Trend::Up);
    }
}
