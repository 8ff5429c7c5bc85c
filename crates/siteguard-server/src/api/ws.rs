//! WebSocket streaming of alert flags.
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

/// Handler for WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsQuery>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.entity_id))
        .into_response()
}

#[derive(Debug, Deserialize, Default)]
pub struct WsQuery {
    entity_id: Option<String>,
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, entity_filter: Option<String>) {
    let mut rx = state.bus().feed();

    // Current flags first so a new observer does not wait a full cycle.
    for alert in state.bus().snapshot() {
        if entity_filter.as_deref().is_some_and(|id| id != alert.entity_id) {
            continue;
        }
        let Ok(text) = serde_json::to_string(&alert) else {
            continue;
        };
        if socket.send(Message::Text(text)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(alert) => {
                        if entity_filter.as_deref().is_some_and(|id| id != alert.entity_id) {
                            continue;
                        }
                        let text = match serde_json::to_string(&alert) {
                            Ok(text) => text,
                            Err(err) => {
                                tracing::warn!("Failed to encode alert: {}", err);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        // The next cycle republishes every flag.
                        tracing::debug!("WebSocket observer lagged by {} alerts", skipped);
                        continue;
                    }
                    Err(_) => break,
                }
            }
        }
    }
}
