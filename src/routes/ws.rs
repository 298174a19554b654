use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};

use crate::AppState;

/// Upgrade to the push channel. Clients receive reminder payloads as JSON
/// text frames; nothing is sent on connect and there is no replay of
/// reminders missed while disconnected.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: Arc<AppState>, socket: WebSocket) {
    let (session_id, mut reminders) = state.hub.register().await;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            reminder = reminders.recv() => {
                match reminder {
                    Some(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // Hub pruned this session.
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    // The channel is push-only; inbound frames other than
                    // close are ignored (axum answers pings itself).
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.unregister(session_id).await;
}
