//! Wire protocol
//!
//! JSON messages multiplexed over one duplex connection by an in-band `type`
//! discriminator. Field names are camelCase on the wire.

use crate::questions::RawQuestion;
use crate::rating::MatchResult;
use crate::types::{Difficulty, GamePhase, PlayerId, PlayerView, RoomId, RoomSettings, RoomView, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text sent back when an inbound frame cannot be parsed
pub const INVALID_MESSAGE_FORMAT: &str = "Invalid message format";

/// Partial settings update sent by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub question_count: Option<usize>,
}

/// Messages sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        player_name: String,
        #[serde(default)]
        password: Option<String>,
    },
    LeaveRoom,
    PlayerReady {
        ready: bool,
    },
    StartGame {
        #[serde(default)]
        questions: Option<Vec<RawQuestion>>,
    },
    ChatMessage {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    UpdateSettings {
        #[serde(default)]
        max_players: Option<usize>,
        #[serde(default)]
        settings: Option<SettingsPatch>,
    },
    #[serde(rename_all = "camelCase")]
    Answer {
        answer: String,
        #[serde(default)]
        player_id: Option<PlayerId>,
    },
    #[serde(rename_all = "camelCase")]
    JoinRankedQueue {
        user_id: String,
        username: String,
    },
    #[serde(rename_all = "camelCase")]
    LeaveRankedQueue {
        #[serde(default)]
        user_id: Option<String>,
    },
}

impl ClientMessage {
    /// Label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::LeaveRoom => "leave_room",
            ClientMessage::PlayerReady { .. } => "player_ready",
            ClientMessage::StartGame { .. } => "start_game",
            ClientMessage::ChatMessage { .. } => "chat_message",
            ClientMessage::UpdateSettings { .. } => "update_settings",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::JoinRankedQueue { .. } => "join_ranked_queue",
            ClientMessage::LeaveRankedQueue { .. } => "leave_ranked_queue",
        }
    }
}

/// Question as shown to players while it is open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

/// Snapshot of a running game
///
/// Submitted answers and the correct answer are only filled in once the
/// question has been revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub phase: GamePhase,
    pub question_index: usize,
    pub total_questions: usize,
    pub question: Option<QuestionView>,
    pub question_time_remaining: u32,
    pub scores: BTreeMap<PlayerId, u32>,
    pub answered_player_ids: Vec<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<BTreeMap<PlayerId, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// One line of the final standings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLine {
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: u32,
}

/// Public profile of a matched opponent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentProfile {
    pub name: String,
    pub rating: i32,
    pub tier: Tier,
}

/// Messages sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room: RoomView,
        player_id: PlayerId,
        player: PlayerView,
        #[serde(default)]
        game_state: Option<GameStateView>,
    },
    PlayerJoined {
        player: PlayerView,
        players: Vec<PlayerView>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player_id: PlayerId,
        player_name: String,
        #[serde(default)]
        new_host_id: Option<PlayerId>,
        players: Vec<PlayerView>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerReadyChanged {
        player_id: PlayerId,
        ready: bool,
        players: Vec<PlayerView>,
    },
    #[serde(rename_all = "camelCase")]
    AllPlayersReady {
        can_start: bool,
    },
    CountdownStarted {
        countdown: u32,
        players: Vec<PlayerView>,
    },
    CountdownTick {
        countdown: u32,
    },
    GameStarted {
        settings: RoomSettings,
        players: Vec<PlayerView>,
    },
    #[serde(rename_all = "camelCase")]
    GameState {
        game_state: GameStateView,
    },
    #[serde(rename_all = "camelCase")]
    PlayerAnswered {
        player_id: PlayerId,
        player_name: String,
    },
    #[serde(rename_all = "camelCase")]
    GameEnd {
        final_scores: Vec<ScoreLine>,
        winner_ids: Vec<PlayerId>,
        players: Vec<PlayerView>,
    },
    RankedResult {
        rating: i32,
        delta: i32,
        tier: Tier,
        result: MatchResult,
    },
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        player_id: PlayerId,
        player_name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    SettingsUpdated {
        max_players: usize,
        settings: RoomSettings,
    },
    RoomDisbanded {
        reason: String,
    },
    Error {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    MatchFound {
        room_id: RoomId,
        player_id: PlayerId,
        opponent: OpponentProfile,
    },
    #[serde(rename_all = "camelCase")]
    RankedQueueJoined {
        position: usize,
        queue_size: usize,
    },
    RankedQueueLeft,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join_room() {
        let message: ClientMessage = serde_json::from_str(
            r#"{"type":"join_room","roomId":"abc","playerName":"Alice","password":"pw12"}"#,
        )
        .unwrap();
        assert_eq!(
            message,
            ClientMessage::JoinRoom {
                room_id: "abc".to_string(),
                player_name: "Alice".to_string(),
                password: Some("pw12".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_bare_leave_room() {
        let message: ClientMessage = serde_json::from_str(r#"{"type":"leave_room"}"#).unwrap();
        assert_eq!(message, ClientMessage::LeaveRoom);
        assert_eq!(message.kind(), "leave_room");
    }

    #[test]
    fn test_parse_start_game_with_questions() {
        let message: ClientMessage = serde_json::from_str(
            r#"{"type":"start_game","questions":[{"question":"Capital of France?","options":["Paris","London"],"correct":"Paris"}]}"#,
        )
        .unwrap();
        match message {
            ClientMessage::StartGame { questions } => assert_eq!(questions.unwrap().len(), 1),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"launch_missiles"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }

    #[test]
    fn test_server_message_shape() {
        let json = serde_json::to_value(ServerMessage::AllPlayersReady { can_start: true }).unwrap();
        assert_eq!(json["type"], "all_players_ready");
        assert_eq!(json["canStart"], true);

        let json = serde_json::to_value(ServerMessage::RankedQueueJoined {
            position: 1,
            queue_size: 3,
        })
        .unwrap();
        assert_eq!(json["type"], "ranked_queue_joined");
        assert_eq!(json["queueSize"], 3);
    }
}
