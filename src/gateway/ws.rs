//! WebSocket transport for the gateway

use crate::gateway::connection::ConnectionHandle;
use crate::gateway::handler::Gateway;
use crate::gateway::protocol::{ServerMessage, INVALID_MESSAGE_FORMAT};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Upgrade handler mounted at `/ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(gateway): State<Arc<Gateway>>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, gateway))
}

/// Pump one socket until it closes
///
/// Outbound messages come from rooms and the queue through the connection
/// handle; a dedicated writer task drains them so a slow client never blocks
/// a room.
pub async fn serve_socket(socket: WebSocket, gateway: Arc<Gateway>) {
    let (mut sink, mut stream) = socket.split();
    let (connection, mut outbound) = ConnectionHandle::channel();
    gateway.connect(&connection);

    let connection_id = connection.id();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode message for {}: {}", connection_id, e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => gateway.handle_text(&connection, text.as_str()).await,
            Ok(Message::Binary(_)) => {
                connection.send(ServerMessage::error(INVALID_MESSAGE_FORMAT));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Socket {} errored: {}", connection.id(), e);
                break;
            }
        }
    }

    gateway.disconnect(&connection).await;
    // Rooms may still hold clones of the handle; stopping the writer drops
    // the receiver so those clones report the connection as gone
    writer.abort();
}
