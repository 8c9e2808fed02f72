//! WebSocket connection handler

use crate::api::server::AppState;
use crate::services::BotEvent;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, error, info, warn};

/// Control messages from server to client; bot events are sent as-is
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsServerMessage {
    #[serde(rename = "connected")]
    Connected { message: String },
    #[serde(rename = "pong")]
    Pong,
}

/// WebSocket message from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum WsClientMessage {
    #[serde(rename = "ping")]
    Ping,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before greeting so nothing published after the greeting is missed
    let mut event_rx = state.notifier.subscribe();

    info!("WebSocket client connected");

    let connected_msg = WsServerMessage::Connected {
        message: "Connected to Pool Sell Bot".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    let (pong_tx, mut pong_rx) = mpsc::channel::<()>(8);

    let send_task = tokio::spawn(async move {
        loop {
            let json = tokio::select! {
                result = event_rx.recv() => {
                    match result {
                        Ok(event) => serde_json::to_string::<BotEvent>(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("WebSocket client lagged, skipped {} events", skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                Some(()) = pong_rx.recv() => serde_json::to_string(&WsServerMessage::Pong),
            };

            match json {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => error!("Failed to encode WebSocket message: {}", e),
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => match serde_json::from_str::<WsClientMessage>(&text) {
                    Ok(WsClientMessage::Ping) => {
                        debug!("Received ping");
                        if pong_tx.send(()).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => debug!("Ignoring unknown client message: {}", text),
                },
                Ok(Message::Close(_)) => {
                    info!("WebSocket client sent close");
                    break;
                }
                Err(e) => {
                    error!("WebSocket receive error: {}", e);
                    break;
                }
                // Protocol pings are answered by axum
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::create_app;
    use crate::services::chain::testing::ScriptedChain;
    use crate::{Config, Database};
    use alloy::primitives::Address;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    async fn next_text<S>(stream: &mut S) -> serde_json::Value
    where
        S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("timed out waiting for message")
                .expect("stream ended")
                .expect("websocket error");
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[test]
    fn test_server_message_format() {
        let json = serde_json::to_string(&WsServerMessage::Connected {
            message: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"connected","data":{"message":"hi"}}"#);
        assert_eq!(serde_json::to_string(&WsServerMessage::Pong).unwrap(), r#"{"type":"pong"}"#);
    }

    #[tokio::test]
    async fn test_websocket_round_trip() {
        let config = Config::from_vars(|key| match key {
            "RPC_URL" => Some("http://localhost:8545".to_string()),
            _ => None,
        })
        .unwrap();
        let db = Arc::new(Database::in_memory().await.unwrap());
        let state = AppState::from_parts(
            config,
            db,
            Arc::new(ScriptedChain::fixed(1000, 2000)),
            Address::repeat_byte(4),
        );
        let notifier = state.notifier.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_app(state)).await.unwrap();
        });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();

        let hello = next_text(&mut ws).await;
        assert_eq!(hello["type"], "connected");

        notifier.message("The bot has been stopped.");
        notifier.price(0.5);
        assert_eq!(
            next_text(&mut ws).await,
            serde_json::json!({ "type": "botMessage", "data": "The bot has been stopped." })
        );
        assert_eq!(
            next_text(&mut ws).await,
            serde_json::json!({ "type": "priceUpdate", "data": 0.5 })
        );

        ws.send(WsMessage::Text(r#"{"type":"ping"}"#.to_string()))
            .await
            .unwrap();
        assert_eq!(next_text(&mut ws).await, serde_json::json!({ "type": "pong" }));
    }
}
