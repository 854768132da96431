//! Common types used throughout the trivia arena

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for rooms
pub type RoomId = Uuid;

/// Unique identifier for a player's membership in a room
pub type PlayerId = String;

/// External account identifier used for ranked play
pub type UserId = String;

/// Unique identifier for a live connection
pub type ConnectionId = Uuid;

/// Minimum number of seats in a room
pub const MIN_CAPACITY: usize = 2;

/// Maximum number of seats in a room
pub const MAX_CAPACITY: usize = 8;

/// Upper bound on questions per game
pub const MAX_QUESTION_COUNT: usize = 50;

/// Question difficulty requested from the question source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// Game settings chosen by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub difficulty: Difficulty,
    pub category: String,
    pub question_count: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            category: "general".to_string(),
            question_count: 10,
        }
    }
}

/// Lifecycle status of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Starting,
    Countdown,
    Playing,
    Finished,
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomStatus::Waiting => write!(f, "waiting"),
            RoomStatus::Starting => write!(f, "starting"),
            RoomStatus::Countdown => write!(f, "countdown"),
            RoomStatus::Playing => write!(f, "playing"),
            RoomStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Phase of a running game
///
/// `Playing` and `Reveal` alternate once per question; `Final` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Starting,
    Countdown,
    Playing,
    Reveal,
    Final,
}

/// Named rating band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Master,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
            Tier::Diamond => "Diamond",
            Tier::Master => "Master",
        };
        write!(f, "{}", name)
    }
}

/// Public view of a player inside a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub score: u32,
}

/// Public view of a room, as served to lobby browsers and joiners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: RoomId,
    pub name: String,
    pub host_id: Option<PlayerId>,
    pub players: Vec<PlayerView>,
    pub player_count: usize,
    pub max_players: usize,
    pub is_private: bool,
    pub has_password: bool,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub ranked: bool,
    pub created_at: DateTime<Utc>,
}

impl RoomView {
    /// Whether the room has no free seat left
    pub fn is_full(&self) -> bool {
        self.player_count >= self.max_players
    }
}

/// Predicate used when listing rooms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomFilter {
    /// Only rooms with exactly two seats (the 1v1 browser)
    pub one_vs_one_only: bool,
    /// Hide rooms that require a password
    pub public_only: bool,
}

impl RoomFilter {
    /// Check whether a room should be listed
    pub fn matches(&self, room: &RoomView) -> bool {
        if room.status != RoomStatus::Waiting || room.is_full() {
            return false;
        }
        if self.one_vs_one_only && room.max_players != MIN_CAPACITY {
            return false;
        }
        if self.public_only && room.is_private {
            return false;
        }
        true
    }
}

/// Clamp a requested capacity into the allowed range
pub fn clamp_capacity(requested: Option<usize>, default: usize) -> usize {
    requested
        .unwrap_or(default)
        .clamp(MIN_CAPACITY, MAX_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(max_players: usize, player_count: usize, status: RoomStatus) -> RoomView {
        RoomView {
            id: Uuid::new_v4(),
            name: "Room".to_string(),
            host_id: None,
            players: Vec::new(),
            player_count,
            max_players,
            is_private: false,
            has_password: false,
            status,
            settings: RoomSettings::default(),
            ranked: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_clamp_capacity() {
        assert_eq!(clamp_capacity(None, 4), 4);
        assert_eq!(clamp_capacity(Some(1), 4), 2);
        assert_eq!(clamp_capacity(Some(20), 4), 8);
        assert_eq!(clamp_capacity(Some(6), 4), 6);
    }

    #[test]
    fn test_filter_skips_started_and_full_rooms() {
        let filter = RoomFilter::default();
        assert!(filter.matches(&view(4, 1, RoomStatus::Waiting)));
        assert!(!filter.matches(&view(4, 4, RoomStatus::Waiting)));
        assert!(!filter.matches(&view(4, 1, RoomStatus::Playing)));
    }

    #[test]
    fn test_one_vs_one_filter() {
        let filter = RoomFilter {
            one_vs_one_only: true,
            public_only: false,
        };
        assert!(filter.matches(&view(2, 1, RoomStatus::Waiting)));
        assert!(!filter.matches(&view(4, 1, RoomStatus::Waiting)));
    }

    #[test]
    fn test_public_only_filter() {
        let filter = RoomFilter {
            one_vs_one_only: false,
            public_only: true,
        };
        let mut private = view(4, 1, RoomStatus::Waiting);
        private.is_private = true;
        assert!(!filter.matches(&private));
        assert!(filter.matches(&view(4, 1, RoomStatus::Waiting)));
    }

    #[test]
    fn test_settings_wire_format() {
        let json = serde_json::to_value(RoomSettings::default()).unwrap();
        assert_eq!(json["questionCount"], 10);
        assert_eq!(json["difficulty"], "medium");
    }
}
