//! Connection sessions
//!
//! Remembers which player and room a connection is currently bound to. The
//! room stays the authority: a stale binding is only ever cleared, never
//! trusted over the room's own membership.

use crate::types::{ConnectionId, PlayerId, RoomId};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Binding of one connection to a room seat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

/// Connection id to session table
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<ConnectionId, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection, returning whatever it was bound to before
    pub fn bind(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> Option<Session> {
        debug!(
            "Binding connection {} to player {} in room {}",
            connection_id, player_id, room_id
        );
        self.sessions.write().ok().and_then(|mut sessions| {
            sessions.insert(connection_id, Session { room_id, player_id })
        })
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<Session> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(&connection_id).cloned())
    }

    pub fn clear(&self, connection_id: ConnectionId) -> Option<Session> {
        self.sessions
            .write()
            .ok()
            .and_then(|mut sessions| sessions.remove(&connection_id))
    }

    /// Clear the binding only if it still points at `room_id`
    pub fn clear_if_room(&self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        let Ok(mut sessions) = self.sessions.write() else {
            return false;
        };
        match sessions.get(&connection_id) {
            Some(session) if session.room_id == room_id => {
                sessions.remove(&connection_id);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
