//! Inbound message dispatch
//!
//! Parses client frames, resolves the connection's session and forwards the
//! request to the right room actor or the matchmaking queue. Failures are
//! reported to the originating connection only.

use crate::error::{ArenaError, ArenaResult};
use crate::gateway::connection::ConnectionHandle;
use crate::gateway::protocol::{ClientMessage, ServerMessage, INVALID_MESSAGE_FORMAT};
use crate::gateway::session::{Session, SessionTable};
use crate::matchmaking::MatchmakingQueue;
use crate::metrics::MetricsCollector;
use crate::room::{RoomHandle, RoomRegistry};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Connection gateway shared by every socket
pub struct Gateway {
    registry: Arc<RoomRegistry>,
    queue: Arc<MatchmakingQueue>,
    sessions: Arc<SessionTable>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Gateway {
    pub fn new(
        registry: Arc<RoomRegistry>,
        queue: Arc<MatchmakingQueue>,
        sessions: Arc<SessionTable>,
    ) -> Self {
        Self {
            registry,
            queue,
            sessions,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    /// A socket was accepted
    pub fn connect(&self, connection: &ConnectionHandle) {
        debug!("Connection {} opened", connection.id());
        if let Some(metrics) = &self.metrics {
            metrics.record_connection(true);
        }
    }

    /// A socket went away: leave its room and its queue slot
    pub async fn disconnect(&self, connection: &ConnectionHandle) {
        if let Some(session) = self.sessions.clear(connection.id()) {
            self.leave_session(connection, session).await;
        }
        if self.queue.dequeue_connection(connection.id()) {
            debug!("Removed connection {} from the ranked queue", connection.id());
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_connection(false);
        }
        debug!("Connection {} closed", connection.id());
    }

    /// Handle one raw text frame
    pub async fn handle_text(&self, connection: &ConnectionHandle, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(connection, message).await,
            Err(e) => {
                debug!("Unparseable frame from {}: {}", connection.id(), e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_error("invalid_message");
                }
                connection.send(ServerMessage::error(INVALID_MESSAGE_FORMAT));
            }
        }
    }

    /// Handle one parsed message
    pub async fn handle(&self, connection: &ConnectionHandle, message: ClientMessage) {
        let started = Instant::now();
        let kind = message.kind();

        if let Err(e) = self.dispatch(connection, message).await {
            debug!("{} from {} failed: {}", kind, connection.id(), e);
            if let Some(metrics) = &self.metrics {
                metrics.record_error(e.kind());
            }
            connection.send(ServerMessage::error(e.client_message()));
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_message(kind, started.elapsed());
        }
    }

    async fn dispatch(&self, connection: &ConnectionHandle, message: ClientMessage) -> ArenaResult<()> {
        match message {
            ClientMessage::JoinRoom {
                room_id,
                player_name,
                password,
            } => self.join_room(connection, &room_id, player_name, password).await,
            ClientMessage::LeaveRoom => {
                if let Some(session) = self.sessions.clear(connection.id()) {
                    self.leave_session(connection, session).await;
                }
                Ok(())
            }
            ClientMessage::PlayerReady { ready } => {
                let (session, room) = self.current(connection)?;
                let result = room.set_ready(session.player_id.clone(), ready).await;
                self.settle_session(connection, &session, result)
            }
            ClientMessage::StartGame { questions } => {
                let (session, room) = self.current(connection)?;
                let result = room.start_game(session.player_id.clone(), questions).await;
                self.settle_session(connection, &session, result)
            }
            ClientMessage::ChatMessage { message } => {
                let (session, room) = self.current(connection)?;
                let result = room.chat(session.player_id.clone(), message).await;
                self.settle_session(connection, &session, result)
            }
            ClientMessage::UpdateSettings {
                max_players,
                settings,
            } => {
                let (session, room) = self.current(connection)?;
                let result = room
                    .update_settings(session.player_id.clone(), max_players, settings)
                    .await;
                self.settle_session(connection, &session, result)
            }
            ClientMessage::Answer { answer, player_id } => {
                let (session, room) = self.current(connection)?;
                if let Some(claimed) = player_id.filter(|id| *id != session.player_id) {
                    debug!(
                        "Connection {} answered as {} but is bound to {}",
                        connection.id(),
                        claimed,
                        session.player_id
                    );
                }
                let result = room.answer(session.player_id.clone(), answer).await;
                self.settle_session(connection, &session, result)
            }
            ClientMessage::JoinRankedQueue { user_id, username } => {
                if let Some(session) = self.sessions.clear(connection.id()) {
                    self.leave_session(connection, session).await;
                }
                let ticket = self.queue.enqueue(&user_id, &username, connection.clone())?;
                connection.send(ServerMessage::RankedQueueJoined {
                    position: ticket.position,
                    queue_size: ticket.queue_size,
                });
                Ok(())
            }
            ClientMessage::LeaveRankedQueue { .. } => {
                // Only the connection that queued can take itself out
                self.queue.dequeue_connection(connection.id());
                connection.send(ServerMessage::RankedQueueLeft);
                Ok(())
            }
        }
    }

    async fn join_room(
        &self,
        connection: &ConnectionHandle,
        room_id: &str,
        player_name: String,
        password: Option<String>,
    ) -> ArenaResult<()> {
        let room_id = Uuid::parse_str(room_id.trim()).map_err(|_| ArenaError::RoomNotFound)?;
        let room = self
            .registry
            .get(room_id)
            .ok_or(ArenaError::RoomNotFound)?;

        if let Some(current) = self.sessions.get(connection.id()) {
            if current.room_id != room_id {
                self.sessions.clear(connection.id());
                self.leave_session(connection, current).await;
            }
        }
        self.queue.dequeue_connection(connection.id());

        let outcome = room.join(player_name, password, connection.clone()).await?;
        self.sessions
            .bind(connection.id(), room_id, outcome.player_id);
        Ok(())
    }

    async fn leave_session(&self, connection: &ConnectionHandle, session: Session) {
        if let Some(room) = self.registry.get(session.room_id) {
            let outcome = room.leave(session.player_id, Some(connection.id())).await;
            info!(
                "Connection {} left room {} ({:?})",
                connection.id(),
                session.room_id,
                outcome
            );
        }
    }

    fn current(&self, connection: &ConnectionHandle) -> ArenaResult<(Session, RoomHandle)> {
        let session = self
            .sessions
            .get(connection.id())
            .ok_or(ArenaError::RoomNotFound)?;
        match self.registry.get(session.room_id) {
            Some(room) => Ok((session, room)),
            None => {
                self.sessions.clear_if_room(connection.id(), session.room_id);
                Err(ArenaError::RoomNotFound)
            }
        }
    }

    /// Drop a binding the room no longer recognizes
    fn settle_session(
        &self,
        connection: &ConnectionHandle,
        session: &Session,
        result: ArenaResult<()>,
    ) -> ArenaResult<()> {
        if result == Err(ArenaError::RoomNotFound) {
            self.sessions.clear_if_room(connection.id(), session.room_id);
        }
        result
    }
}
