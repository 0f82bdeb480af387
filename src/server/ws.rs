//! WebSocket endpoint bridging subscriber sockets to the session hub.
//!
//! Each connection gets a hub subscription: a reader task parses client
//! JSON into hub commands, a writer task drains the subscriber buffer to
//! the socket. Either side ending tears the connection down and
//! unregisters the subscriber.

use crate::server::protocol::{ClientMessage, ServerMessage};
use crate::server::routes::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let Some((id, buffer)) = state.hub.subscribe().await else {
        tracing::warn!("rejecting socket: session hub is gone");
        return;
    };
    let (mut sink, mut stream) = socket.split();

    let write_buffer = buffer.clone();
    let mut outgoing = tokio::spawn(async move {
        while let Some(message) = write_buffer.next().await {
            match message.to_json() {
                Ok(json) => {
                    if sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!("failed to serialize server message: {e}"),
            }
        }
        let _ = sink.close().await;
    });

    let hub = state.hub.clone();
    let read_buffer = buffer.clone();
    let mut incoming = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => match ClientMessage::from_json(&text) {
                    Ok(command) => hub.client_message(id, command).await,
                    Err(e) => {
                        // Bad input keeps the connection open.
                        read_buffer.push(ServerMessage::Error {
                            kind: "invalid_command".to_string(),
                            message: e.to_string(),
                        });
                    }
                },
                Message::Close(_) => break,
                // Pings are answered by axum; binary frames are ignored.
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut outgoing => incoming.abort(),
        _ = &mut incoming => {}
    }

    state.hub.unsubscribe(id).await;
    buffer.close();
    tracing::debug!(%id, "websocket connection closed");
}
