// =============================================================================
// Volume ratio
// =============================================================================
//
// `currentVolume / avg(lastN volumes, N=20)`. Zero if there's no trailing
// average to compare against (avoids propagating infinity/NaN).
// =============================================================================

use crate::types::Candle;

pub const DEFAULT_LOOKBACK: usize = 20;

pub fn calculate_volume_ratio(candles: &[Candle], lookback: usize) -> f64 {
    let Some(current) = candles.last() else {
        return 0.0;
    };

    let history_end = candles.len() - 1;
    let history_start = history_end.saturating_sub(lookback);
    let history = &candles[history_start..history_end];

    if history.is_empty() {
        return 0.0;
    }

    let avg: f64 = history.iter().map(|c| c.volume).sum::<f64>() / history.len() as f64;
    if avg <= 0.0 {
        0.0
    } else {
        current.volume / avg
    }
}

pub fn average_volume(candles: &[Candle], lookback: usize) -> f64 {
    if candles.is_empty() {
        return 0.0;
    }
    let window = &candles[candles.len().saturating_sub(lookback)..];
    window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(volume: f64) -> Candle {
        Candle {
            open_time_ms: 0,
            close_time_ms: 1,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume,
        }
    }

    #[test]
    fn single_candle_has_no_history_ratio_zero() {
        let candles = vec![candle(5.0)];
        assert_eq!(calculate_volume_ratio(&candles, 20), 0.0);
    }

    #[test]
    fn ratio_above_one_when_volume_spikes() {
        let mut candles = vec![candle(1.0); 20];
        candles.push(candle(5.0));
        let ratio = calculate_volume_ratio(&candles, 20);
        assert!((ratio - 5.0).abs() < 1e-9);
    }

    #[test]
    fn ratio_is_one_for_uniform_volume() {
        let candles = vec![candle(3.0); 21];
        let ratio = calculate_volume_ratio(&candles, 20);
        assert!((ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn average_volume_of_empty_is_zero() {
        assert_eq!(average_volume(&[], 20), 0.0);
    }
}
