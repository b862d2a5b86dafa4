// =============================================================================
// Candle Store (C4) — per-symbol rolling window of OHLCV candles
// =============================================================================
//
// Ring buffer of length `max_window`. `append()` overwrites the tail in place
// when the incoming candle shares the tail's `open_time_ms` (a streaming
// update to the in-progress bar); otherwise it requires strictly increasing
// `open_time_ms`, rejecting anything older with `OutOfOrder`. Readers take a
// `Vec` snapshot rather than holding the lock across computation.
// =============================================================================

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use crate::error::EngineError;
use crate::types::Candle;

pub const DEFAULT_MAX_WINDOW: usize = 500;

pub struct CandleStore {
    windows: RwLock<HashMap<String, VecDeque<Candle>>>,
    max_window: usize,
}

impl CandleStore {
    pub fn new(max_window: usize) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            max_window,
        }
    }

    /// Append a candle for `symbol`, enforcing total ordering by
    /// `open_time_ms`. Equal `open_time_ms` to the current tail replaces it
    /// in place (the in-flight candle is still being streamed).
    pub fn append(&self, symbol: &str, candle: Candle) -> Result<(), EngineError> {
        let mut windows = self.windows.write();
        let window = windows.entry(symbol.to_string()).or_default();

        match window.back() {
            Some(tail) if candle.open_time_ms == tail.open_time_ms => {
                *window.back_mut().unwrap() = candle;
            }
            Some(tail) if candle.open_time_ms < tail.open_time_ms => {
                return Err(EngineError::OutOfOrder {
                    got: candle.open_time_ms,
                    tail: tail.open_time_ms,
                });
            }
            _ => {
                window.push_back(candle);
                while window.len() > self.max_window {
                    window.pop_front();
                }
            }
        }
        Ok(())
    }

    /// Deep-copy snapshot of the window, oldest first. Empty if unknown symbol.
    pub fn snapshot(&self, symbol: &str) -> Vec<Candle> {
        self.windows
            .read()
            .get(symbol)
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.windows.read().get(symbol).map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, symbol: &str) -> bool {
        self.len(symbol) == 0
    }

    pub fn last_close(&self, symbol: &str) -> Option<f64> {
        self.windows
            .read()
            .get(symbol)
            .and_then(|w| w.back())
            .map(|c| c.close)
    }

    pub fn remove(&self, symbol: &str) {
        self.windows.write().remove(symbol);
    }

    pub fn symbols(&self) -> Vec<String> {
        self.windows.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open_time_ms: i64, close: f64) -> Candle {
        Candle {
            open_time_ms,
            close_time_ms: open_time_ms + 60_000,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn append_then_snapshot_preserves_order() {
        let store = CandleStore::new(10);
        store.append("BTCUSDT", candle(1, 1.0)).unwrap();
        store.append("BTCUSDT", candle(2, 2.0)).unwrap();
        let snap = store.snapshot("BTCUSDT");
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].open_time_ms, 1);
        assert_eq!(snap[1].open_time_ms, 2);
    }

    #[test]
    fn equal_open_time_replaces_tail_in_place() {
        let store = CandleStore::new(10);
        store.append("BTCUSDT", candle(1, 1.0)).unwrap();
        store.append("BTCUSDT", candle(1, 99.0)).unwrap();
        let snap = store.snapshot("BTCUSDT");
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].close, 99.0);
    }

    #[test]
    fn strictly_older_open_time_is_rejected() {
        let store = CandleStore::new(10);
        store.append("BTCUSDT", candle(5, 1.0)).unwrap();
        let result = store.append("BTCUSDT", candle(3, 2.0));
        assert!(matches!(result, Err(EngineError::OutOfOrder { .. })));
    }

    #[test]
    fn ring_buffer_evicts_oldest_when_full() {
        let store = CandleStore::new(3);
        for i in 1..=5 {
            store.append("BTCUSDT", candle(i, i as f64)).unwrap();
        }
        let snap = store.snapshot("BTCUSDT");
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].open_time_ms, 3);
        assert_eq!(snap[2].open_time_ms, 5);
    }

    #[test]
    fn unknown_symbol_snapshot_is_empty() {
        let store = CandleStore::new(10);
        assert!(store.snapshot("NOPE").is_empty());
        assert_eq!(store.last_close("NOPE"), None);
    }

    #[test]
    fn separate_symbols_have_independent_windows() {
        let store = CandleStore::new(10);
        store.append("BTCUSDT", candle(1, 1.0)).unwrap();
        store.append("ETHUSDT", candle(1, 2.0)).unwrap();
        assert_eq!(store.len("BTCUSDT"), 1);
        assert_eq!(store.len("ETHUSDT"), 1);
        assert_eq!(store.last_close("BTCUSDT"), Some(1.0));
        assert_eq!(store.last_close("ETHUSDT"), Some(2.0));
    }
}
