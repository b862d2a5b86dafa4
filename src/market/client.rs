// =============================================================================
// Market Client (C2) — REST polling with rate limiting and retry
// =============================================================================
//
// Exposes `fetch_tickers`, `fetch_candles`, `health_check`. Every call
// acquires a rate-limiter token first; a denial surfaces as `RateLimited`
// without making a request. Requests run through the consolidated retry
// helper: up to `retry_attempts` tries, exponential backoff with jitter,
// aborting immediately on 4xx responses or malformed JSON.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::EngineError;
use crate::rate_limiter::RateLimiter;
use crate::retry::{is_retryable, retry_with_backoff};
use crate::types::{Candle, PriceData};

pub struct MarketClient {
    http: Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl MarketClient {
    pub fn new(
        base_url: impl Into<String>,
        limiter: Arc<RateLimiter>,
        retry_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into(),
            limiter,
            retry_attempts,
            retry_delay,
        }
    }

    fn admit(&self) -> Result<(), EngineError> {
        if self.limiter.allow() {
            Ok(())
        } else {
            Err(EngineError::RateLimited)
        }
    }

    pub async fn fetch_tickers(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, PriceData>, EngineError> {
        self.admit()?;
        let url = format!("{}/ticker/24hr", self.base_url);
        let wanted: std::collections::HashSet<&str> = symbols.iter().map(|s| s.as_str()).collect();

        let body = retry_with_backoff(
            self.retry_attempts,
            self.retry_delay,
            0.1,
            is_retryable,
            || self.get(&url),
        )
        .await?;

        let raw: Vec<Value> = serde_json::from_str(&body)
            .map_err(|e| EngineError::Protocol(format!("invalid ticker payload: {e}")))?;

        let mut out = HashMap::new();
        for entry in raw {
            let symbol = match entry.get("symbol").and_then(Value::as_str) {
                Some(s) => s.to_string(),
                None => continue,
            };
            if !wanted.is_empty() && !wanted.contains(symbol.as_str()) {
                continue;
            }
            let data = PriceData {
                last_price: parse_num(&entry, "lastPrice")?,
                price_change: parse_num(&entry, "priceChange")?,
                price_change_percent: parse_num(&entry, "priceChangePercent")?,
                volume: parse_num(&entry, "volume")?,
            };
            out.insert(symbol, data);
        }
        Ok(out)
    }

    pub async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, EngineError> {
        self.admit()?;
        let url = format!(
            "{}/klines?symbol={symbol}&interval={interval}&limit={limit}",
            self.base_url
        );

        let body = retry_with_backoff(
            self.retry_attempts,
            self.retry_delay,
            0.1,
            is_retryable,
            || self.get(&url),
        )
        .await?;

        let raw: Vec<Vec<Value>> = serde_json::from_str(&body)
            .map_err(|e| EngineError::Protocol(format!("invalid kline payload: {e}")))?;

        let mut candles = Vec::with_capacity(raw.len());
        for row in raw {
            match parse_kline_row(&row) {
                Ok(c) => candles.push(c),
                Err(e) => warn!(error = %e, "skipping malformed kline row"),
            }
        }
        Ok(candles)
    }

    pub async fn health_check(&self) -> Result<(), EngineError> {
        self.admit()?;
        let url = format!("{}/ping", self.base_url);
        self.get(&url).await.map(|_| ())
    }

    async fn get(&self, url: &str) -> Result<String, EngineError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %url, "upstream returned non-2xx");
            return Err(EngineError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        resp.text().await.map_err(|e| EngineError::Network(e.to_string()))
    }
}

fn parse_num(entry: &Value, field: &str) -> Result<f64, EngineError> {
    let v = entry
        .get(field)
        .ok_or_else(|| EngineError::Protocol(format!("missing field {field}")))?;
    match v {
        Value::String(s) => s
            .parse()
            .map_err(|_| EngineError::Protocol(format!("field {field} is not numeric"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EngineError::Protocol(format!("field {field} is not a valid number"))),
        _ => Err(EngineError::Protocol(format!("field {field} has unexpected type"))),
    }
}

/// Parse a single Binance-shaped kline row:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn parse_kline_row(row: &[Value]) -> Result<Candle, EngineError> {
    if row.len() < 7 {
        return Err(EngineError::Protocol("kline row too short".into()));
    }
    let open_time_ms = row[0]
        .as_i64()
        .ok_or_else(|| EngineError::Protocol("kline openTime not an integer".into()))?;
    let close_time_ms = row[6]
        .as_i64()
        .ok_or_else(|| EngineError::Protocol("kline closeTime not an integer".into()))?;

    let f = |v: &Value| -> Result<f64, EngineError> {
        match v {
            Value::String(s) => s.parse().map_err(|_| EngineError::Protocol("kline field not numeric".into())),
            Value::Number(n) => n.as_f64().ok_or_else(|| EngineError::Protocol("kline field not a number".into())),
            _ => Err(EngineError::Protocol("kline field has unexpected type".into())),
        }
    };

    Ok(Candle {
        open_time_ms,
        close_time_ms,
        open: f(&row[1])?,
        high: f(&row[2])?,
        low: f(&row[3])?,
        close: f(&row[4])?,
        volume: f(&row[5])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_kline_row_handles_string_and_number_fields() {
        let row = vec![
            json!(1000),
            json!("10.0"),
            json!("12.0"),
            json!("9.0"),
            json!("11.0"),
            json!("5.0"),
            json!(1060),
        ];
        let c = parse_kline_row(&row).unwrap();
        assert_eq!(c.open_time_ms, 1000);
        assert_eq!(c.close_time_ms, 1060);
        assert_eq!(c.close, 11.0);
    }

    #[test]
    fn parse_kline_row_rejects_short_rows() {
        let row = vec![json!(1000), json!("10.0")];
        assert!(parse_kline_row(&row).is_err());
    }

    #[test]
    fn parse_num_rejects_missing_field() {
        let entry = json!({ "symbol": "BTCUSDT" });
        assert!(parse_num(&entry, "lastPrice").is_err());
    }

    #[test]
    fn parse_num_accepts_string_and_numeric_forms() {
        let entry = json!({ "a": "1.5", "b": 2.5 });
        assert_eq!(parse_num(&entry, "a").unwrap(), 1.5);
        assert_eq!(parse_num(&entry, "b").unwrap(), 2.5);
    }
}
