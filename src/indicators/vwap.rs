// =============================================================================
// Volume Weighted Average Price (VWAP)
// =============================================================================
//
// Over the last `period` candles: `sum(typicalPrice * volume) / sum(volume)`,
// where `typicalPrice = (high + low + close) / 3`. Zero if total volume is
// zero (flat/illiquid window — avoids a division by zero rather than
// propagating NaN downstream).
// =============================================================================

use crate::types::Candle;

pub const DEFAULT_PERIOD: usize = 24;

pub fn calculate_vwap(candles: &[Candle], period: usize) -> f64 {
    if candles.is_empty() || period == 0 {
        return 0.0;
    }
    let window = &candles[candles.len().saturating_sub(period)..];

    let mut weighted_sum = 0.0;
    let mut volume_sum = 0.0;
    for c in window {
        weighted_sum += c.typical_price() * c.volume;
        volume_sum += c.volume;
    }

    if volume_sum <= 0.0 {
        0.0
    } else {
        weighted_sum / volume_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            open_time_ms: 0,
            close_time_ms: 1,
            open: close,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn vwap_of_empty_window_is_zero() {
        assert_eq!(calculate_vwap(&[], 24), 0.0);
    }

    #[test]
    fn vwap_with_all_zero_volume_is_zero() {
        let candles = vec![candle(10.0, 8.0, 9.0, 0.0); 5];
        assert_eq!(calculate_vwap(&candles, 24), 0.0);
    }

    #[test]
    fn vwap_single_candle_equals_typical_price() {
        let candles = vec![candle(12.0, 8.0, 10.0, 5.0)];
        let expected = (12.0 + 8.0 + 10.0) / 3.0;
        assert!((calculate_vwap(&candles, 24) - expected).abs() < 1e-9);
    }

    #[test]
    fn vwap_only_considers_last_period_candles() {
        let mut candles = vec![candle(1000.0, 1000.0, 1000.0, 1.0)];
        candles.extend(vec![candle(10.0, 10.0, 10.0, 1.0); 24]);
        let vwap = calculate_vwap(&candles, 24);
        assert!((vwap - 10.0).abs() < 1e-9);
    }
}
