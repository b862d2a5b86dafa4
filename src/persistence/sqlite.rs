// =============================================================================
// SqliteSink — write-through persistence backed by sqlx
// =============================================================================
//
// Schema covers trades, positions (with an `is_active` flag instead of a
// separate table), trading settings and the watchlist, indexed by
// `(symbol, timestamp)` where a time column exists. Market data and
// technical-analysis snapshots are derived and not persisted here; the core
// never reads through this sink, so a failed write only costs durability.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::Sink;
use crate::config::TradingSettings;
use crate::types::{CloseReason, Position, Side, SignalKind, Trade, WatchlistItem};

pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub async fn connect(db_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(db_url)
            .context("invalid DB_URL")?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to sqlite database")?;

        let sink = Self { pool };
        sink.init().await?;
        info!(db_url, "connected to sqlite persistence sink");
        Ok(sink)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                price REAL NOT NULL,
                qty REAL NOT NULL,
                ts_ms INTEGER NOT NULL,
                signal_kind TEXT NOT NULL,
                confidence REAL NOT NULL,
                pnl REAL,
                exit_price REAL,
                hold_time_sec INTEGER,
                entry_trade_id TEXT,
                close_reason TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_trades_symbol_ts ON trades (symbol, ts_ms);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                symbol TEXT PRIMARY KEY,
                id TEXT NOT NULL,
                qty REAL NOT NULL,
                avg_entry_price REAL NOT NULL,
                entry_time_ms INTEGER NOT NULL,
                target_price REAL,
                stop_loss_price REAL,
                entry_trade_id TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create positions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trading_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                settings_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create trading_settings table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watchlist (
                symbol TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                last_price REAL NOT NULL,
                change24h REAL NOT NULL,
                change_pct24h REAL NOT NULL,
                volume24h REAL NOT NULL,
                last_update_ms INTEGER NOT NULL,
                is_active BOOLEAN NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create watchlist table")?;

        Ok(())
    }
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

fn signal_kind_str(kind: SignalKind) -> &'static str {
    match kind {
        SignalKind::StrongBuy => "STRONG_BUY",
        SignalKind::Buy => "BUY",
        SignalKind::Hold => "HOLD",
        SignalKind::Sell => "SELL",
        SignalKind::StrongSell => "STRONG_SELL",
    }
}

fn close_reason_str(reason: CloseReason) -> &'static str {
    match reason {
        CloseReason::StopLoss => "STOP_LOSS",
        CloseReason::TakeProfit => "TAKE_PROFIT",
        CloseReason::Timeout => "TIMEOUT",
        CloseReason::SignalExit => "SIGNAL_EXIT",
        CloseReason::Manual => "MANUAL",
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn record_trade(&self, trade: &Trade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades (id, symbol, side, price, qty, ts_ms, signal_kind, confidence,
                                 pnl, exit_price, hold_time_sec, entry_trade_id, close_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                pnl = excluded.pnl,
                exit_price = excluded.exit_price,
                hold_time_sec = excluded.hold_time_sec,
                close_reason = excluded.close_reason
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.symbol)
        .bind(side_str(trade.side))
        .bind(trade.price)
        .bind(trade.qty)
        .bind(trade.ts_ms)
        .bind(signal_kind_str(trade.signal_kind))
        .bind(trade.confidence)
        .bind(trade.pnl)
        .bind(trade.exit_price)
        .bind(trade.hold_time_sec)
        .bind(&trade.entry_trade_id)
        .bind(trade.close_reason.map(close_reason_str))
        .execute(&self.pool)
        .await
        .context("failed to persist trade")?;
        Ok(())
    }

    async fn upsert_position(&self, position: &Position) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (symbol, id, qty, avg_entry_price, entry_time_ms,
                                    target_price, stop_loss_price, entry_trade_id, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(symbol) DO UPDATE SET
                qty = excluded.qty,
                avg_entry_price = excluded.avg_entry_price,
                target_price = excluded.target_price,
                stop_loss_price = excluded.stop_loss_price,
                is_active = 1
            "#,
        )
        .bind(&position.symbol)
        .bind(&position.id)
        .bind(position.qty)
        .bind(position.avg_entry_price)
        .bind(position.entry_time_ms)
        .bind(position.target_price)
        .bind(position.stop_loss_price)
        .bind(&position.entry_trade_id)
        .execute(&self.pool)
        .await
        .context("failed to persist position")?;
        Ok(())
    }

    async fn close_position(&self, symbol: &str) -> Result<()> {
        sqlx::query("UPDATE positions SET is_active = 0 WHERE symbol = ?")
            .bind(symbol)
            .execute(&self.pool)
            .await
            .context("failed to mark position inactive")?;
        Ok(())
    }

    async fn save_settings(&self, settings: &TradingSettings) -> Result<()> {
        let json = serde_json::to_string(settings).context("failed to serialise settings")?;
        sqlx::query(
            r#"
            INSERT INTO trading_settings (id, settings_json) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET settings_json = excluded.settings_json
            "#,
        )
        .bind(json)
        .execute(&self.pool)
        .await
        .context("failed to persist trading settings")?;
        Ok(())
    }

    async fn save_watchlist(&self, watchlist: &[WatchlistItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM watchlist").execute(&mut *tx).await?;
        for item in watchlist {
            sqlx::query(
                r#"
                INSERT INTO watchlist (symbol, name, last_price, change24h, change_pct24h,
                                        volume24h, last_update_ms, is_active)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.symbol)
            .bind(&item.name)
            .bind(item.last_price)
            .bind(item.change24h)
            .bind(item.change_pct24h)
            .bind(item.volume24h)
            .bind(item.last_update_ms)
            .bind(item.is_active)
            .execute(&mut *tx)
            .await
            .context("failed to persist watchlist entry")?;
        }
        tx.commit().await.context("failed to commit watchlist update")?;
        Ok(())
    }
}
