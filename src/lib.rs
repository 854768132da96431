//! Trivia Arena - real-time multiplayer trivia service
//!
//! Players gather in rooms over WebSocket and answer timed multiple-choice
//! questions. A ranked queue pairs players of similar ELO rating into
//! head-to-head matches whose results are settled into persistent profiles.

pub mod config;
pub mod error;
pub mod gateway;
pub mod matchmaking;
pub mod metrics;
pub mod questions;
pub mod rating;
pub mod room;
pub mod service;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used types and traits
pub use error::{ArenaError, ArenaResult, Result};
pub use types::*;

// Re-export key components
pub use gateway::Gateway;
pub use matchmaking::MatchmakingQueue;
pub use room::{RoomHandle, RoomRegistry};
pub use service::{AppState, ArenaState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
