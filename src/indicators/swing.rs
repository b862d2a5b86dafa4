// =============================================================================
// Swing high / low (lookback = 20)
// =============================================================================
//
// Scans the last `lookback` candles for local extrema: a swing high is a
// high strictly greater than both of its immediate neighbors; a swing low
// is analogous on lows. Reports the most recent swing found, falling back to
// the plain max/min of the window when no strict local extremum exists.
// =============================================================================

use crate::types::Candle;

pub const DEFAULT_LOOKBACK: usize = 20;

pub struct SwingLevels {
    pub swing_high: f64,
    pub swing_low: f64,
}

pub fn calculate_swing_levels(candles: &[Candle], lookback: usize) -> SwingLevels {
    if candles.is_empty() {
        return SwingLevels {
            swing_high: 0.0,
            swing_low: 0.0,
        };
    }

    let window = &candles[candles.len().saturating_sub(lookback)..];

    let mut swing_high = None;
    let mut swing_low = None;

    if window.len() >= 3 {
        for i in 1..window.len() - 1 {
            let (prev, cur, next) = (window[i - 1], window[i], window[i + 1]);
            if cur.high > prev.high && cur.high > next.high {
                swing_high = Some(cur.high);
            }
            if cur.low < prev.low && cur.low < next.low {
                swing_low = Some(cur.low);
            }
        }
    }

    let fallback_high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let fallback_low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    SwingLevels {
        swing_high: swing_high.unwrap_or(fallback_high),
        swing_low: swing_low.unwrap_or(fallback_low),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64) -> Candle {
        Candle {
            open_time_ms: 0,
            close_time_ms: 1,
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 1.0,
        }
    }

    #[test]
    fn empty_window_returns_zeros() {
        let levels = calculate_swing_levels(&[], 20);
        assert_eq!(levels.swing_high, 0.0);
        assert_eq!(levels.swing_low, 0.0);
    }

    #[test]
    fn detects_local_maximum_as_swing_high() {
        let candles = vec![
            candle(10.0, 5.0),
            candle(15.0, 6.0),
            candle(12.0, 4.0),
        ];
        let levels = calculate_swing_levels(&candles, 20);
        assert_eq!(levels.swing_high, 15.0);
    }

    #[test]
    fn detects_local_minimum_as_swing_low() {
        let candles = vec![
            candle(10.0, 8.0),
            candle(11.0, 3.0),
            candle(12.0, 7.0),
        ];
        let levels = calculate_swing_levels(&candles, 20);
        assert_eq!(levels.swing_low, 3.0);
    }

    #[test]
    fn monotonic_series_falls_back_to_window_extremes() {
        let candles: Vec<Candle> = (1..=10).map(|i| candle(i as f64, i as f64 - 1.0)).collect();
        let levels = calculate_swing_levels(&candles, 20);
        assert_eq!(levels.swing_high, 10.0);
        assert_eq!(levels.swing_low, 0.0);
    }
}
