//! WebSocket Endpoint
//!
//! Authenticates the handshake, then runs one reader loop and one writer
//! task per connection. The writer drains the connection's bounded outbox;
//! the reader dispatches client frames to the broker in arrival order.
//! The connection is removed from the broker before the handler returns.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::AppState;
use crate::application::services::{ClientMessage, ServerEvent};
use crate::domain::asset::AccountId;
use crate::domain::registry::ConnectionId;
use crate::infrastructure::auth::handshake_token;
use crate::infrastructure::metrics;

/// Grace period for the writer to flush after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Sent for frames that are not a known client message.
const INVALID_MESSAGE: &str = "invalid message";

#[derive(Debug, Deserialize)]
pub(super) struct HandshakeQuery {
    token: Option<String>,
}

pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
) -> Response {
    let account = handshake_token(query.token.as_deref(), &headers)
        .ok_or(())
        .and_then(|token| state.auth.authenticate(token).map_err(|_| ()));

    let Ok(account) = account else {
        metrics::record_auth_failure("websocket");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "message": "Authentication error: invalid token" })),
        )
            .into_response();
    };

    ws.on_upgrade(move |socket| serve_connection(socket, state, account))
}

async fn serve_connection(socket: WebSocket, state: Arc<AppState>, account: AccountId) {
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<ServerEvent>(state.outbox_capacity);
    let id = state.broker.connect(account.clone(), outbox_tx);
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbox_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(connection_id = %id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    state.broker.auto_join(id, &account).await;

    loop {
        let frame = tokio::select! {
            () = state.shutdown.cancelled() => break,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => dispatch(&state, id, text.as_str()).await,
            Some(Ok(Message::Binary(_))) => state.broker.send_error(id, INVALID_MESSAGE),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                debug!(connection_id = %id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    // Dropping the broker's sender lets the writer finish.
    state.broker.disconnect(id);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
}

async fn dispatch(state: &AppState, id: ConnectionId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { asset_id }) => {
            if let Err(e) = state.broker.subscribe(id, asset_id).await {
                debug!(connection_id = %id, reason = %e, "Subscribe refused");
            }
        }
        Ok(ClientMessage::Unsubscribe { asset_id }) => {
            state.broker.unsubscribe(id, asset_id);
        }
        Ok(ClientMessage::Whoami { ack }) => {
            state.broker.whoami(id, ack).await;
        }
        Err(e) => {
            debug!(connection_id = %id, error = %e, "Unparseable client frame");
            state.broker.send_error(id, INVALID_MESSAGE);
        }
    }
}
