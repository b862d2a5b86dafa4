// =============================================================================
// Stream Client (C3) — per-symbol streaming subscription with reconnect
// =============================================================================
//
// One streaming connection per symbol. Subscribers register bounded channels;
// parsed ticks fan out with a non-blocking `try_send` (a slow subscriber
// drops intermediate ticks rather than stalling the reader). On any read
// error the connection is torn down and redialed with exponential backoff
// capped at 60s. `subscribe()` is idempotent: calling it again for a symbol
// that already has a reader task just adds another receiver.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::RwLock;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};

use crate::types::PriceData;

const MAX_BACKOFF_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub data: PriceData,
    pub event_time_ms: i64,
}

struct SymbolState {
    subscribers: Vec<mpsc::Sender<Tick>>,
    shutdown: Arc<Notify>,
}

pub struct StreamClient {
    base_url: String,
    symbols: RwLock<HashMap<String, SymbolState>>,
}

impl StreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            symbols: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to `symbol`'s ticker stream, returning a receiver of ticks.
    /// Idempotent: the first call spawns the reader task; subsequent calls
    /// just register another receiver against the existing connection.
    pub fn subscribe(self: &Arc<Self>, symbol: &str) -> mpsc::Receiver<Tick> {
        let (tx, rx) = mpsc::channel(64);

        let mut symbols = self.symbols.write();
        if let Some(state) = symbols.get_mut(symbol) {
            state.subscribers.push(tx);
            return rx;
        }

        let shutdown = Arc::new(Notify::new());
        symbols.insert(
            symbol.to_string(),
            SymbolState {
                subscribers: vec![tx],
                shutdown: shutdown.clone(),
            },
        );
        drop(symbols);

        let this = self.clone();
        let symbol = symbol.to_string();
        tokio::spawn(async move {
            this.run_with_reconnect(symbol, shutdown).await;
        });

        rx
    }

    pub fn is_subscribed(&self, symbol: &str) -> bool {
        self.symbols.read().contains_key(symbol)
    }

    /// Tear down every connection and clear subscriber maps.
    pub fn close(&self) {
        let mut symbols = self.symbols.write();
        for (_, state) in symbols.drain() {
            state.shutdown.notify_waiters();
        }
    }

    fn fan_out(&self, symbol: &str, tick: Tick) {
        let symbols = self.symbols.read();
        if let Some(state) = symbols.get(symbol) {
            for tx in &state.subscribers {
                if tx.try_send(tick.clone()).is_err() {
                    debug!(symbol, "subscriber channel full or closed, dropping tick");
                }
            }
        }
    }

    async fn run_with_reconnect(&self, symbol: String, shutdown: Arc<Notify>) {
        let mut backoff = Duration::from_secs(1);
        loop {
            let run = self.run_once(&symbol);
            tokio::select! {
                result = run => {
                    match result {
                        Ok(()) => {
                            info!(symbol = %symbol, "stream ended cleanly");
                        }
                        Err(e) => {
                            warn!(symbol = %symbol, error = %e, "stream error, reconnecting");
                        }
                    }
                }
                _ = shutdown.notified() => {
                    info!(symbol = %symbol, "stream shutdown requested");
                    return;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.notified() => return,
            }
            backoff = (backoff * 2).min(Duration::from_secs(MAX_BACKOFF_SECS));
        }
    }

    async fn run_once(&self, symbol: &str) -> Result<(), anyhow::Error> {
        let lower = symbol.to_lowercase();
        let url = format!("{}/ws/{lower}@ticker", self.base_url);
        info!(url = %url, symbol, "connecting to ticker stream");

        let (ws_stream, _) = connect_async(&url).await?;
        let (_write, mut read) = ws_stream.split();
        info!(symbol, "ticker stream connected");

        while let Some(msg) = read.next().await {
            let msg = msg?;
            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_ticker_message(&text) {
                    Ok(tick) => self.fan_out(symbol, tick),
                    Err(e) => warn!(symbol, error = %e, "failed to parse ticker message"),
                }
            }
        }
        Ok(())
    }
}

fn parse_ticker_message(text: &str) -> Result<Tick, anyhow::Error> {
    let root: serde_json::Value = serde_json::from_str(text)?;
    let payload = root.get("data").unwrap_or(&root);

    let symbol = payload
        .get("s")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("missing symbol field"))?
        .to_string();

    let num = |key: &str| -> Result<f64, anyhow::Error> {
        payload
            .get(key)
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_f64()))
            .ok_or_else(|| anyhow::anyhow!("missing or invalid field {key}"))
    };

    let last_price = num("c")?;
    let event_time_ms = payload.get("E").and_then(|v| v.as_i64()).unwrap_or(0);

    // `o`/`h`/`l` are the ticker's rolling-window open/high/low; fall back to
    // the last price when a frame omits them (e.g. a minimal test payload).
    let open = num("o").unwrap_or(last_price);
    let high = num("h").unwrap_or(last_price);
    let low = num("l").unwrap_or(last_price);

    let data = PriceData {
        last_price,
        price_change: num("p").unwrap_or(0.0),
        price_change_percent: num("P").unwrap_or(0.0),
        volume: num("v").unwrap_or(0.0),
    };

    Ok(Tick {
        symbol,
        price: last_price,
        open,
        high,
        low,
        data,
        event_time_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ticker_message_direct_payload() {
        let text = r#"{"E":123,"s":"BTCUSDT","c":"50000.5","o":"49000","h":"51000","l":"48000","v":"10","P":"2.0"}"#;
        let tick = parse_ticker_message(text).unwrap();
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.price, 50000.5);
        assert_eq!(tick.event_time_ms, 123);
        assert_eq!(tick.open, 49000.0);
        assert_eq!(tick.high, 51000.0);
        assert_eq!(tick.low, 48000.0);
    }

    #[test]
    fn parse_ticker_message_combined_stream_envelope() {
        let text = r#"{"stream":"btcusdt@ticker","data":{"E":456,"s":"BTCUSDT","c":"51000","P":"1.0","v":"5"}}"#;
        let tick = parse_ticker_message(text).unwrap();
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.price, 51000.0);
    }

    #[test]
    fn parse_ticker_message_missing_ohl_falls_back_to_last_price() {
        let text = r#"{"E":789,"s":"BTCUSDT","c":"51000"}"#;
        let tick = parse_ticker_message(text).unwrap();
        assert_eq!(tick.open, 51000.0);
        assert_eq!(tick.high, 51000.0);
        assert_eq!(tick.low, 51000.0);
    }

    #[test]
    fn parse_ticker_message_missing_symbol_errors() {
        let text = r#"{"c":"50000"}"#;
        assert!(parse_ticker_message(text).is_err());
    }

    #[tokio::test]
    async fn subscribe_twice_shares_one_connection() {
        let client = Arc::new(StreamClient::new("wss://example.invalid"));
        let _rx1 = client.subscribe("BTCUSDT");
        assert!(client.is_subscribed("BTCUSDT"));
        let _rx2 = client.subscribe("BTCUSDT");
        assert_eq!(client.symbols.read().len(), 1);
        assert_eq!(client.symbols.read().get("BTCUSDT").unwrap().subscribers.len(), 2);
    }
}
