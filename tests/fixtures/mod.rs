//! Test fixtures for driving the arena end to end

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;
use trivia_arena::config::AppConfig;
use trivia_arena::gateway::{ConnectionHandle, ServerMessage};
use trivia_arena::service::ArenaState;

/// Service state tuned for fast, deterministic tests
pub fn arena() -> ArenaState {
    let mut config = AppConfig::default();
    config.matchmaking.questions_per_match = 1;
    ArenaState::new(config).expect("Failed to build arena state")
}

/// A fake WebSocket client: a connection handle plus its outbound queue
pub struct TestClient {
    pub connection: ConnectionHandle,
    rx: UnboundedReceiver<ServerMessage>,
}

impl TestClient {
    pub fn connect(state: &ArenaState) -> Self {
        let (connection, rx) = ConnectionHandle::channel();
        state.gateway().connect(&connection);
        Self { connection, rx }
    }

    /// Send one text frame through the gateway
    pub async fn send(&self, state: &ArenaState, frame: Value) {
        state
            .gateway()
            .handle_text(&self.connection, &frame.to_string())
            .await;
    }

    /// Next message, failing the test if nothing arrives
    pub async fn next(&mut self) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(120), self.rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("connection closed")
    }

    /// Skip messages until one matches
    pub async fn expect<F>(&mut self, mut pred: F) -> ServerMessage
    where
        F: FnMut(&ServerMessage) -> bool,
    {
        loop {
            let message = self.next().await;
            if pred(&message) {
                return message;
            }
        }
    }

    /// Everything already queued for this client
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

pub fn join_frame(room_id: &str, name: &str) -> Value {
    json!({"type": "join_room", "roomId": room_id, "playerName": name})
}

pub fn raw_question(prompt: &str, options: &[&str], correct: &str) -> Value {
    json!({"question": prompt, "options": options, "correct": correct})
}

/// Issue one REST request against the full router
pub async fn rest(
    state: &ArenaState,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request");

    let response = state.router().oneshot(request).await.expect("router failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    (
        status,
        serde_json::from_slice(&bytes).unwrap_or(Value::Null),
    )
}
