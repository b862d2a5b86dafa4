// =============================================================================
// Indicator Cache (C11) — TTL'd snapshot + signal per symbol
// =============================================================================
//
// Recomputing the full indicator pipeline on every tick is wasted work once
// several subscribers share the same symbol; entries expire after `ttl` and
// are recomputed lazily on the next `lookup` miss by the caller (the cache
// itself never recomputes — it only remembers what C9 gave it last).
// =============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::{IndicatorSnapshot, Signal};

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

#[derive(Clone, Copy)]
struct Entry {
    snapshot: IndicatorSnapshot,
    signal: Signal,
    computed_at: Instant,
}

pub struct IndicatorCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl IndicatorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached `(snapshot, signal)` for `symbol` if it hasn't
    /// expired, `None` on a miss or an expired entry.
    pub fn lookup(&self, symbol: &str) -> Option<(IndicatorSnapshot, Signal)> {
        let entries = self.entries.read();
        let entry = entries.get(symbol)?;
        if entry.computed_at.elapsed() >= self.ttl {
            return None;
        }
        Some((entry.snapshot, entry.signal))
    }

    pub fn store(&self, symbol: &str, snapshot: IndicatorSnapshot, signal: Signal) {
        self.entries.write().insert(
            symbol.to_string(),
            Entry {
                snapshot,
                signal,
                computed_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn evict(&self, symbol: &str) {
        self.entries.write().remove(symbol);
    }
}

impl Default for IndicatorCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
