// =============================================================================
// Configuration — environment-driven settings with atomic persistence
// =============================================================================
//
// `RuntimeConfig` is read once at startup from the process environment, with
// a typed default for every tunable knob. The mutable subset that can be
// changed at runtime through `POST /api/settings` lives in `TradingSettings`
// and is persisted to a JSON file using an atomic write-to-temp-then-rename,
// the same pattern used for every other durable write in this engine.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EngineError;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "XRPUSDT".to_string(),
        "SOLUSDT".to_string(),
    ]
}

fn default_min_confidence() -> f64 {
    60.0
}
fn default_max_position_size() -> f64 {
    10_000.0
}
fn default_risk_per_trade_pct() -> f64 {
    2.0
}
fn default_max_daily_loss_abs() -> f64 {
    500.0
}
fn default_max_positions() -> u32 {
    5
}
fn default_stop_loss_pct() -> f64 {
    1.0
}
fn default_take_profit_pct() -> f64 {
    2.0
}
fn default_max_hold_time_sec() -> i64 {
    3600
}
fn default_scaling_factor() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}

/// Mutable risk/strategy knobs exposed through the control surface.
///
/// Invariant: `take_profit_pct > stop_loss_pct`; enforced by `validate()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSettings {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,
    #[serde(default = "default_risk_per_trade_pct")]
    pub risk_per_trade_pct: f64,
    #[serde(default = "default_max_daily_loss_abs")]
    pub max_daily_loss_abs: f64,
    #[serde(default = "default_max_positions")]
    pub max_positions: u32,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,
    #[serde(default = "default_max_hold_time_sec")]
    pub max_hold_time_sec: i64,
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_position_size: default_max_position_size(),
            risk_per_trade_pct: default_risk_per_trade_pct(),
            max_daily_loss_abs: default_max_daily_loss_abs(),
            max_positions: default_max_positions(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_hold_time_sec: default_max_hold_time_sec(),
            scaling_factor: default_scaling_factor(),
            is_enabled: true,
        }
    }
}

impl TradingSettings {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.take_profit_pct <= self.stop_loss_pct {
            return Err(EngineError::Config(
                "take_profit_pct must exceed stop_loss_pct".to_string(),
            ));
        }
        if self.min_confidence < 0.0 || self.min_confidence > 100.0 {
            return Err(EngineError::Config(
                "min_confidence must be in [0,100]".to_string(),
            ));
        }
        if self.max_positions < 1 {
            return Err(EngineError::Config("max_positions must be >= 1".to_string()));
        }
        if self.stop_loss_pct <= 0.0 || self.stop_loss_pct > 50.0 {
            return Err(EngineError::Config(
                "stop_loss_pct must be in (0,50]".to_string(),
            ));
        }
        if self.scaling_factor < 1.0 {
            return Err(EngineError::Config("scaling_factor must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Persist to `path` using an atomic write (write `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).context("failed to serialise trading settings")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp settings to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp settings to {}", path.display()))?;
        info!(path = %path.display(), "trading settings saved (atomic)");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read trading settings from {}", path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse trading settings from {}", path.display()))?;
        Ok(settings)
    }
}

/// Indicator period tuning, read once at startup from `RSI_PERIOD` /
/// `EMA{9,21,50,200}_PERIOD`.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorPeriods {
    pub rsi: usize,
    pub ema9: usize,
    pub ema21: usize,
    pub ema50: usize,
    pub ema200: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            rsi: 14,
            ema9: 9,
            ema21: 21,
            ema50: 50,
            ema200: 200,
        }
    }
}

/// Top-level runtime configuration, assembled once at startup from the
/// process environment. Everything here is read-only for the lifetime of
/// the process; only `TradingSettings` mutates at runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub port: u16,
    pub environment: String,
    pub api_base_url: String,
    pub stream_url: String,
    pub rate_limit_capacity: u32,
    pub rate_limit_interval_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub position_timeout_minutes: u64,
    pub indicator_periods: IndicatorPeriods,
    pub db_url: Option<String>,
    pub redis_url: Option<String>,
    pub binance_api_key: String,
    pub binance_api_secret: String,
    pub admin_token: Option<String>,
    pub symbols: Vec<String>,
    pub initial_balance: f64,
    pub settings: TradingSettings,
}

impl RuntimeConfig {
    /// Build configuration from the process environment.
    ///
    /// Missing exchange credentials are fatal outside `development`; every
    /// other knob falls back to the documented default.
    pub fn from_env() -> Result<Self, EngineError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let binance_api_key = std::env::var("BINANCE_API_KEY").unwrap_or_default();
        let binance_api_secret = std::env::var("BINANCE_API_SECRET").unwrap_or_default();

        if environment != "development" && (binance_api_key.is_empty() || binance_api_secret.is_empty())
        {
            return Err(EngineError::Config(
                "BINANCE_API_KEY and BINANCE_API_SECRET are required outside development"
                    .to_string(),
            ));
        }

        let mut settings = TradingSettings {
            max_positions: env_or("MAX_POSITIONS", default_max_positions()),
            risk_per_trade_pct: env_or("DEFAULT_RISK_PCT", default_risk_per_trade_pct()),
            max_daily_loss_abs: env_or("MAX_DAILY_LOSS", default_max_daily_loss_abs()),
            ..TradingSettings::default()
        };
        let timeout_minutes: u64 = env_or("POSITION_TIMEOUT_MINUTES", 60);
        settings.max_hold_time_sec = (timeout_minutes * 60) as i64;
        settings.validate()?;

        let config = Self {
            port: env_or("PORT", 3001),
            environment,
            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| "https://api.binance.com".to_string()),
            stream_url: std::env::var("STREAM_URL")
                .unwrap_or_else(|_| "wss://stream.binance.com:9443".to_string()),
            rate_limit_capacity: env_or("RATE_LIMIT", 10),
            rate_limit_interval_ms: 1000,
            retry_attempts: env_or("RETRY_ATTEMPTS", 3),
            retry_delay_ms: env_or("RETRY_DELAY", 500),
            position_timeout_minutes: timeout_minutes,
            indicator_periods: IndicatorPeriods {
                rsi: env_or("RSI_PERIOD", 14),
                ema9: env_or("EMA9_PERIOD", 9),
                ema21: env_or("EMA21_PERIOD", 21),
                ema50: env_or("EMA50_PERIOD", 50),
                ema200: env_or("EMA200_PERIOD", 200),
            },
            db_url: std::env::var("DB_URL").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            binance_api_key,
            binance_api_secret,
            admin_token: std::env::var("ADMIN_TOKEN").ok().filter(|s| !s.is_empty()),
            symbols: default_symbols(),
            initial_balance: env_or("INITIAL_BALANCE", 100_000.0),
            settings,
        };

        if config.redis_url.is_some() {
            warn!("REDIS_URL is set but no cache sink is implemented; ignoring");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_trading_settings_are_internally_consistent() {
        let s = TradingSettings::default();
        assert!(s.validate().is_ok());
        assert!(s.take_profit_pct > s.stop_loss_pct);
    }

    #[test]
    fn validate_rejects_inverted_sl_tp() {
        let mut s = TradingSettings::default();
        s.stop_loss_pct = 3.0;
        s.take_profit_pct = 2.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_max_positions() {
        let mut s = TradingSettings::default();
        s.max_positions = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "min_confidence": 70.0 }"#;
        let s: TradingSettings = serde_json::from_str(json).unwrap();
        assert!((s.min_confidence - 70.0).abs() < f64::EPSILON);
        assert_eq!(s.max_positions, 5);
        assert!(s.is_enabled);
    }

    #[test]
    fn roundtrip_serialisation() {
        let s = TradingSettings::default();
        let json = serde_json::to_string(&s).unwrap();
        let s2: TradingSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(s.max_positions, s2.max_positions);
        assert!((s.min_confidence - s2.min_confidence).abs() < f64::EPSILON);
    }

    #[test]
    fn indicator_periods_default_matches_spec() {
        let p = IndicatorPeriods::default();
        assert_eq!(p.rsi, 14);
        assert_eq!(p.ema9, 9);
        assert_eq!(p.ema21, 21);
        assert_eq!(p.ema50, 50);
        assert_eq!(p.ema200, 200);
    }
}
