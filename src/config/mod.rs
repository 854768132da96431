//! Configuration management for the trivia arena
//!
//! Loading from environment variables or a TOML file, validation, and
//! default values.

pub mod app;
pub mod game;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, QuestionSettings, ServiceSettings};
pub use game::{GameSettings, MatchmakingSettings};
pub use rating::RatingSettings;
