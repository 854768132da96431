//! Error types for the trivia arena
//!
//! Room and matchmaking operations fail with [`ArenaError`]; those failures are
//! recoverable and only ever reported back to the originating connection.
//! Service plumbing uses anyhow for consistent propagation.

/// Result type alias for service-level code
pub type Result<T> = anyhow::Result<T>;

/// Result type for room, gateway and validation operations
pub type ArenaResult<T> = std::result::Result<T, ArenaError>;

/// Generic text returned for every validation failure
pub const INVALID_INPUT_MESSAGE: &str = "Invalid input";

/// Domain errors raised by room, matchmaking and validation code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Incorrect room password")]
    Unauthorized,

    #[error("Room is full")]
    RoomFull,

    #[error("Game already in progress")]
    GameInProgress,

    #[error("Already playing in this room under another name")]
    AlreadySeated,

    #[error("Only the host can do that")]
    NotHost,

    #[error("At least 2 players are required to start")]
    InsufficientPlayers,

    #[error("Not all players are ready")]
    PlayersNotReady,

    #[error("No questions supplied")]
    NoQuestions,

    #[error("Invalid input")]
    InvalidInput,

    #[error("Settings can only be changed before the game starts")]
    SettingsLocked,

    #[error("Capacity cannot be lower than the current number of players")]
    CapacityConflict,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ArenaError {
    /// Message sent to the client in an `error` event.
    ///
    /// Internal details never leave the process.
    pub fn client_message(&self) -> String {
        match self {
            ArenaError::InvalidInput => INVALID_INPUT_MESSAGE.to_string(),
            ArenaError::Configuration { .. } | ArenaError::Internal { .. } => {
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ArenaError::RoomNotFound => "room_not_found",
            ArenaError::Unauthorized => "unauthorized",
            ArenaError::RoomFull => "room_full",
            ArenaError::GameInProgress => "game_in_progress",
            ArenaError::AlreadySeated => "already_seated",
            ArenaError::NotHost => "not_host",
            ArenaError::InsufficientPlayers => "insufficient_players",
            ArenaError::PlayersNotReady => "players_not_ready",
            ArenaError::NoQuestions => "no_questions",
            ArenaError::InvalidInput => "invalid_input",
            ArenaError::SettingsLocked => "settings_locked",
            ArenaError::CapacityConflict => "capacity_conflict",
            ArenaError::Configuration { .. } => "configuration",
            ArenaError::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ArenaError::Internal {
            message: "lock poisoned in registry".to_string(),
        };
        assert!(!err.client_message().contains("lock"));
    }

    #[test]
    fn test_invalid_input_is_generic() {
        assert_eq!(ArenaError::InvalidInput.client_message(), INVALID_INPUT_MESSAGE);
    }
}
