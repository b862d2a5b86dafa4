// =============================================================================
// WebSocket Handler — push-based trading state updates
// =============================================================================
//
// On connect: one `{type:"trading-state", data:...}` frame. Thereafter, the
// client is attached to the publisher's broadcast channel and receives a
// `{type:"update", data:..., timestamp}` frame roughly every two seconds.
// `{type:"ping"}` text frames get an immediate `{type:"pong", timestamp}`.
// =============================================================================

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::context::AppContext;

pub async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, ctx))
}

#[derive(Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    kind: String,
}

async fn handle_connection(socket: WebSocket, ctx: AppContext) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = ctx.publisher.subscribe();

    let initial = serde_json::json!({
        "type": "trading-state",
        "data": ctx.publisher.build_snapshot(),
    });
    if sender.send(Message::Text(initial.to_string().into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Ok(state) => {
                        let frame = serde_json::json!({
                            "type": "update",
                            "data": state,
                            "timestamp": Utc::now().timestamp_millis(),
                        });
                        if sender.send(Message::Text(frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "websocket subscriber lagged behind publisher");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) {
                            if frame.kind == "ping" {
                                let pong = serde_json::json!({
                                    "type": "pong",
                                    "timestamp": Utc::now().timestamp_millis(),
                                });
                                if sender.send(Message::Text(pong.to_string().into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("websocket close frame received");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket receive error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}
