// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Read endpoints are public; endpoints that mutate trading state or settings
// require the `AuthBearer` extractor (a no-op when `ADMIN_TOKEN` isn't set).
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::config::TradingSettings;
use crate::context::AppContext;
use crate::types::{CloseReason, SignalKind};

pub fn router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/trading-state", get(trading_state))
        .route("/api/trading/status", get(trading_status))
        .route("/api/trading/enable", post(trading_enable))
        .route("/api/trading/disable", post(trading_disable))
        .route("/api/positions", get(positions))
        .route("/api/positions/:symbol/close", post(close_position))
        .route("/api/trades", get(trades))
        .route("/api/settings", get(get_settings))
        .route("/api/settings", post(set_settings))
        .route("/api/market-data", get(market_data_all))
        .route("/api/market-data/:symbol", get(market_data_one))
        .route("/api/performance", get(performance))
        .route("/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(ctx)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    engine_state: String,
    server_time: i64,
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: ctx.uptime_secs(),
        engine_state: ctx.engine.state().to_string(),
        server_time: Utc::now().timestamp_millis(),
    })
}

async fn trading_state(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.publisher.build_snapshot())
}

#[derive(Serialize)]
struct TradingStatusResponse {
    engine_state: String,
    is_enabled: bool,
    open_positions: usize,
}

async fn trading_status(State(ctx): State<AppContext>) -> impl IntoResponse {
    let settings = ctx.publisher.settings();
    Json(TradingStatusResponse {
        engine_state: ctx.engine.state().to_string(),
        is_enabled: settings.is_enabled,
        open_positions: ctx.positions.position_count(),
    })
}

async fn trading_enable(_auth: AuthBearer, State(ctx): State<AppContext>) -> impl IntoResponse {
    let mut settings = ctx.publisher.settings();
    settings.is_enabled = true;
    ctx.publisher.set_settings(settings.clone());
    ctx.save_settings(&settings);
    info!("trading enabled via API");
    Json(settings)
}

async fn trading_disable(_auth: AuthBearer, State(ctx): State<AppContext>) -> impl IntoResponse {
    let mut settings = ctx.publisher.settings();
    settings.is_enabled = false;
    ctx.publisher.set_settings(settings.clone());
    ctx.save_settings(&settings);
    warn!("trading disabled via API");
    Json(settings)
}

async fn positions(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.positions.positions_snapshot())
}

async fn close_position(
    _auth: AuthBearer,
    State(ctx): State<AppContext>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let Some(position) = ctx.positions.position_for(&symbol) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no open position for {symbol}") })),
        )
            .into_response();
    };

    let price = ctx
        .candles
        .last_close(&symbol)
        .unwrap_or(position.current_value / position.qty.max(f64::EPSILON));
    let now_ms = Utc::now().timestamp_millis();

    match ctx
        .positions
        .close(&symbol, price, now_ms, CloseReason::Manual, SignalKind::Hold)
    {
        Some(pnl) => {
            ctx.publisher.record_realized_pnl(pnl);
            ctx.cache.evict(&symbol);
            info!(symbol, pnl, "position closed manually via API");
            Json(serde_json::json!({ "symbol": symbol, "pnl": pnl })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no open position for {symbol}") })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct TradesQuery {
    symbol: Option<String>,
}

async fn trades(State(ctx): State<AppContext>, Query(query): Query<TradesQuery>) -> impl IntoResponse {
    let mut trades = ctx.positions.trades_snapshot();
    if let Some(symbol) = query.symbol {
        trades.retain(|t| t.symbol == symbol);
    }
    Json(trades)
}

async fn get_settings(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.publisher.settings())
}

async fn set_settings(
    _auth: AuthBearer,
    State(ctx): State<AppContext>,
    Json(settings): Json<TradingSettings>,
) -> impl IntoResponse {
    if let Err(e) = settings.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }
    ctx.publisher.set_settings(settings.clone());
    ctx.save_settings(&settings);
    info!("trading settings updated via API");
    Json(settings).into_response()
}

async fn market_data_all(State(ctx): State<AppContext>) -> impl IntoResponse {
    let symbols = ctx.candles.symbols();
    match ctx.market.fetch_tickers(&symbols).await {
        Ok(tickers) => Json(tickers).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn market_data_one(State(ctx): State<AppContext>, Path(symbol): Path<String>) -> impl IntoResponse {
    match ctx.market.fetch_tickers(std::slice::from_ref(&symbol)).await {
        Ok(mut tickers) => match tickers.remove(&symbol) {
            Some(data) => Json(data).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": format!("no market data for {symbol}") })),
            )
                .into_response(),
        },
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
struct PerformanceResponse {
    total_trades: usize,
    win_rate: f64,
    total_net_pnl: f64,
    profit_factor: f64,
    day_pnl: f64,
}

async fn performance(State(ctx): State<AppContext>) -> impl IntoResponse {
    let trades = ctx.positions.trades_snapshot();
    let closed: Vec<f64> = trades.iter().filter_map(|t| t.pnl).collect();

    if closed.is_empty() {
        return Json(PerformanceResponse {
            total_trades: 0,
            win_rate: 0.0,
            total_net_pnl: 0.0,
            profit_factor: 0.0,
            day_pnl: ctx.publisher.day_pnl(),
        });
    }

    let wins = closed.iter().filter(|&&pnl| pnl > 0.0).count();
    let win_rate = wins as f64 / closed.len() as f64;
    let total_net_pnl: f64 = closed.iter().sum();
    let gross_profit: f64 = closed.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = closed.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    Json(PerformanceResponse {
        total_trades: closed.len(),
        win_rate,
        total_net_pnl,
        profit_factor,
        day_pnl: ctx.publisher.day_pnl(),
    })
}
