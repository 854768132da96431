//! Room registry
//!
//! Maps room ids to the handles of running room actors. Actors remove
//! themselves once their room closes, so every handle in the map points at a
//! live room.

use crate::error::{ArenaError, ArenaResult};
use crate::questions::Question;
use crate::room::actor::{RoomActor, RoomHandle, RoomServices};
use crate::room::model::{NewRoom, RankedSeat, Room, RoomTimings};
use crate::types::{
    clamp_capacity, PlayerId, RoomFilter, RoomId, RoomSettings, RoomView, MAX_QUESTION_COUNT,
};
use crate::utils::{generate_player_id, generate_room_id};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Default number of seats when a request leaves it out
pub const DEFAULT_CAPACITY: usize = 4;

/// Parameters for a room created through the lobby
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: String,
    pub host_name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub max_players: Option<usize>,
    #[serde(default)]
    pub settings: Option<RoomSettings>,
}

/// Ids handed back to the creator
///
/// `player_id` is a placeholder; the host player record is created when the
/// creator sends `join_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

/// In-memory map of live rooms
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    services: RoomServices,
    timings: RoomTimings,
    default_capacity: usize,
}

impl RoomRegistry {
    pub fn new(services: RoomServices, timings: RoomTimings, default_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            services,
            timings,
            default_capacity,
        }
    }

    /// Validate and allocate a room in `waiting` status with no players
    pub fn create(self: &Arc<Self>, request: CreateRoomRequest) -> ArenaResult<CreatedRoom> {
        let name = validation::validate_room_name(&request.name)?;
        validation::validate_player_name(&request.host_name)?;
        let password = match request.password.as_deref() {
            Some(password) if !password.is_empty() => {
                Some(validation::validate_password(password)?)
            }
            _ => None,
        };
        let settings = match request.settings {
            Some(settings) => validate_settings(settings)?,
            None => RoomSettings::default(),
        };

        let room_id = generate_room_id();
        let player_id = generate_player_id();
        let room = Room::new(
            room_id,
            NewRoom {
                name,
                is_private: request.is_private,
                password,
                capacity: clamp_capacity(request.max_players, self.default_capacity),
                settings,
            },
            self.timings,
        )
        .with_reserved_host(player_id.clone());

        info!(
            "Created room {} ({}) with {} seats",
            room_id,
            room.name(),
            room.capacity()
        );
        self.launch(room, false)?;
        Ok(CreatedRoom { room_id, player_id })
    }

    /// Start a ranked 1v1 room for a matched pair
    ///
    /// Returns the handle plus the player ids assigned to the seats, in seat
    /// order.
    pub fn create_ranked(
        self: &Arc<Self>,
        seats: [RankedSeat; 2],
        questions: Vec<Question>,
        settings: RoomSettings,
    ) -> ArenaResult<(RoomHandle, [PlayerId; 2])> {
        let room = Room::ranked(generate_room_id(), seats, questions, settings, self.timings);
        let player_ids = [room.players()[0].id.clone(), room.players()[1].id.clone()];
        info!("Created ranked room {} ({})", room.id(), room.name());
        let handle = self.launch(room, true)?;
        Ok((handle, player_ids))
    }

    fn launch(self: &Arc<Self>, room: Room, ranked: bool) -> ArenaResult<RoomHandle> {
        let room_id = room.id();
        let (handle, actor) = RoomActor::new(room, self.services.clone());

        self.rooms
            .write()
            .map_err(|_| ArenaError::Internal {
                message: "Failed to acquire room registry lock".to_string(),
            })?
            .insert(room_id, handle.clone());

        if let Some(metrics) = &self.services.metrics {
            metrics.record_room_created(ranked);
        }

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            actor.run().await;
            registry.remove(room_id);
        });

        Ok(handle)
    }

    pub fn get(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms
            .read()
            .ok()
            .and_then(|rooms| rooms.get(&room_id).cloned())
    }

    /// Handles of every registered room
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms
            .read()
            .map(|rooms| rooms.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshots of the rooms a lobby browser should show
    pub fn list(&self, filter: &RoomFilter) -> Vec<RoomView> {
        let Ok(rooms) = self.rooms.read() else {
            return Vec::new();
        };
        let mut views: Vec<RoomView> = rooms
            .values()
            .map(RoomHandle::view)
            .filter(|view| filter.matches(view))
            .collect();
        views.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        views
    }

    /// Close a room, telling anyone still inside
    pub async fn delete(&self, room_id: RoomId) -> bool {
        let Some(handle) = self.remove(room_id) else {
            return false;
        };
        handle.shutdown().await;
        info!("Deleted room {}", room_id);
        true
    }

    /// Drop a room from the map without notifying it
    pub fn remove(&self, room_id: RoomId) -> Option<RoomHandle> {
        let removed = self
            .rooms
            .write()
            .ok()
            .and_then(|mut rooms| rooms.remove(&room_id));
        if removed.is_some() {
            debug!("Room {} removed from registry", room_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask every room to close; used on shutdown
    pub async fn close_all(&self) {
        let handles: Vec<RoomHandle> = match self.rooms.write() {
            Ok(mut rooms) => rooms.drain().map(|(_, handle)| handle).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

fn validate_settings(mut settings: RoomSettings) -> ArenaResult<RoomSettings> {
    settings.category = validation::validate_room_name(&settings.category)?;
    if !(1..=MAX_QUESTION_COUNT).contains(&settings.question_count) {
        return Err(ArenaError::InvalidInput);
    }
    Ok(settings)
}
