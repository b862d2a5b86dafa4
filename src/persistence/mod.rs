// =============================================================================
// Persistence — optional write-through sink
// =============================================================================
//
// The core never requires a database to function: every read path serves
// from in-memory state (C4/C8/C10) and only falls through to a sink for
// durability. `NullSink` is the default; `SqliteSink` backs it when `DB_URL`
// is configured.
// =============================================================================

mod sqlite;

pub use sqlite::SqliteSink;

use async_trait::async_trait;

use crate::config::TradingSettings;
use crate::types::{Position, Trade, WatchlistItem};

#[async_trait]
pub trait Sink: Send + Sync {
    async fn record_trade(&self, trade: &Trade) -> anyhow::Result<()>;
    async fn upsert_position(&self, position: &Position) -> anyhow::Result<()>;
    async fn close_position(&self, symbol: &str) -> anyhow::Result<()>;
    async fn save_settings(&self, settings: &TradingSettings) -> anyhow::Result<()>;
    async fn save_watchlist(&self, watchlist: &[WatchlistItem]) -> anyhow::Result<()>;
}

/// No-op sink used whenever `DB_URL` is unset. Every write succeeds
/// immediately and is discarded.
pub struct NullSink;

#[async_trait]
impl Sink for NullSink {
    async fn record_trade(&self, _trade: &Trade) -> anyhow::Result<()> {
        Ok(())
    }

    async fn upsert_position(&self, _position: &Position) -> anyhow::Result<()> {
        Ok(())
    }

    async fn close_position(&self, _symbol: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn save_settings(&self, _settings: &TradingSettings) -> anyhow::Result<()> {
        Ok(())
    }

    async fn save_watchlist(&self, _watchlist: &[WatchlistItem]) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, SignalKind};

    fn trade() -> Trade {
        Trade {
            id: "t1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            price: 100.0,
            qty: 1.0,
            ts_ms: 0,
            signal_kind: SignalKind::Buy,
            confidence: 80.0,
            pnl: None,
            exit_price: None,
            hold_time_sec: None,
            entry_trade_id: None,
            close_reason: None,
        }
    }

    #[tokio::test]
    async fn null_sink_accepts_every_write() {
        let sink = NullSink;
        assert!(sink.record_trade(&trade()).await.is_ok());
        assert!(sink.close_position("BTCUSDT").await.is_ok());
        assert!(sink.save_settings(&TradingSettings::default()).await.is_ok());
        assert!(sink.save_watchlist(&[]).await.is_ok());
    }
}
