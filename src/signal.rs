// =============================================================================
// Signal Synthesizer (C6) — weighted-vote composite signal
// =============================================================================
//
// Converts an IndicatorSnapshot plus the current close into a discrete
// Signal by counting weighted bull/bear votes, then derives a confidence
// score from the same inputs. Pure function; no shared state.
// =============================================================================

use crate::types::{IndicatorSnapshot, Signal, SignalKind, Trend};

struct Votes {
    bull: i32,
    bear: i32,
}

fn count_votes(snapshot: &IndicatorSnapshot, close: f64, volume_ratio: f64) -> Votes {
    let mut bull = 0;
    let mut bear = 0;

    if snapshot.rsi < 30.0 || (30.0..=50.0).contains(&snapshot.rsi) {
        bull += 1;
    }
    if snapshot.rsi > 70.0 || (50.0..=70.0).contains(&snapshot.rsi) {
        bear += 1;
    }

    if snapshot.ema9 > snapshot.ema21 && snapshot.ema50 > snapshot.ema200 {
        bull += 2;
    }
    if snapshot.ema9 < snapshot.ema21 && snapshot.ema50 < snapshot.ema200 {
        bear += 2;
    }

    if snapshot.vwap > 0.0 {
        if close < snapshot.vwap * 0.998 {
            bull += 1;
        }
        if close > snapshot.vwap * 1.002 {
            bear += 1;
        }
    }

    if close > snapshot.ema50 && snapshot.ema50 > snapshot.ema200 {
        bull += 2;
    }
    if close < snapshot.ema50 && snapshot.ema50 < snapshot.ema200 {
        bear += 2;
    }

    if volume_ratio > 1.5 {
        bull += 1;
        bear += 1;
    }

    Votes { bull, bear }
}

fn classify(votes: &Votes) -> SignalKind {
    if votes.bull >= 4 {
        SignalKind::StrongBuy
    } else if votes.bull >= 2 {
        SignalKind::Buy
    } else if votes.bear >= 4 {
        SignalKind::StrongSell
    } else if votes.bear >= 2 {
        SignalKind::Sell
    } else {
        SignalKind::Hold
    }
}

fn confidence_for(
    kind: SignalKind,
    snapshot: &IndicatorSnapshot,
    volume_ratio: f64,
    trend_matches: bool,
) -> f64 {
    let mut confidence: f64 = 50.0;

    match kind {
        SignalKind::StrongBuy | SignalKind::StrongSell => confidence += 25.0,
        SignalKind::Buy | SignalKind::Sell => confidence += 15.0,
        SignalKind::Hold => {}
    }

    if snapshot.rsi < 25.0 || snapshot.rsi > 75.0 {
        confidence += 10.0;
    }

    if volume_ratio > 1.5 {
        confidence += 10.0;
    } else if volume_ratio < 0.7 {
        confidence -= 10.0;
    }

    if trend_matches {
        confidence += 5.0;
    }

    confidence.clamp(0.0, 95.0)
}

/// Derive a Signal from an IndicatorSnapshot, the last close, and the
/// current volume ratio (computed alongside the snapshot by the indicator
/// pipeline).
pub fn synthesize(snapshot: &IndicatorSnapshot, close: f64, volume_ratio: f64) -> Signal {
    let votes = count_votes(snapshot, close, volume_ratio);
    let kind = classify(&votes);

    let trend_matches = match (kind, snapshot.trend) {
        (SignalKind::StrongBuy | SignalKind::Buy, Trend::Up) => true,
        (SignalKind::StrongSell | SignalKind::Sell, Trend::Down) => true,
        _ => false,
    };

    let confidence = confidence_for(kind, snapshot, volume_ratio, trend_matches);

    Signal { kind, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: 50.0,
            ema9: 100.0,
            ema21: 100.0,
            ema50: 100.0,
            ema200: 100.0,
            vwap: 100.0,
            macd: 0.0,
            macd_signal: 0.0,
            volume: 10.0,
            avg_volume20: 10.0,
            swing_high: 110.0,
            swing_low: 90.0,
            trend: Trend::Flat,
        }
    }

    #[test]
    fn oversold_bullish_alignment_yields_strong_buy() {
        let snapshot = IndicatorSnapshot {
            rsi: 22.0,
            ema9: 95.0,
            ema21: 96.0,
            ema50: 98.0,
            ema200: 100.0,
            vwap: 100.0,
            trend: Trend::Down,
            ..base_snapshot()
        };
        // note: ema ordering here is bearish on purpose to isolate the RSI +
        // vwap + downtrend-priced-below-vwap combination; use a genuinely
        // bullish-aligned snapshot instead.
        let bullish = IndicatorSnapshot {
            rsi: 22.0,
            ema9: 101.0,
            ema21: 100.0,
            ema50: 99.0,
            ema200: 98.0,
            vwap: 105.0,
            trend: Trend::Up,
            ..base_snapshot()
        };
        let _ = snapshot;
        let signal = synthesize(&bullish, 100.0, 1.0);
        assert_eq!(signal.kind, SignalKind::StrongBuy);
        assert!(signal.confidence >= 60.0);
    }

    #[test]
    fn bearish_alignment_yields_strong_sell() {
        let snapshot = IndicatorSnapshot {
            rsi: 78.0,
            ema9: 95.0,
            ema21: 97.0,
            ema50: 99.0,
            ema200: 101.0,
            vwap: 95.0,
            trend: Trend::Down,
            ..base_snapshot()
        };
        let signal = synthesize(&snapshot, 96.0, 1.0);
        assert_eq!(signal.kind, SignalKind::StrongSell);
    }

    #[test]
    fn neutral_snapshot_yields_hold() {
        let snapshot = base_snapshot();
        let signal = synthesize(&snapshot, 100.0, 1.0);
        assert_eq!(signal.kind, SignalKind::Hold);
    }

    #[test]
    fn confidence_is_always_clamped_to_95() {
        let snapshot = IndicatorSnapshot {
            rsi: 10.0,
            ema9: 101.0,
            ema21: 100.0,
            ema50: 99.0,
            ema200: 98.0,
            vwap: 110.0,
            trend: Trend::Up,
            ..base_snapshot()
        };
        let signal = synthesize(&snapshot, 100.0, 3.0);
        assert!(signal.confidence <= 95.0);
    }

    #[test]
    fn low_volume_ratio_reduces_confidence() {
        let snapshot = IndicatorSnapshot {
            rsi: 22.0,
            ema9: 101.0,
            ema21: 100.0,
            ema50: 99.0,
            ema200: 98.0,
            vwap: 105.0,
            trend: Trend::Up,
            ..base_snapshot()
        };
        let high_vol = synthesize(&snapshot, 100.0, 2.0);
        let low_vol = synthesize(&snapshot, 100.0, 0.5);
        assert!(low_vol.confidence < high_vol.confidence);
    }
}
