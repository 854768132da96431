//! Game timing and matchmaking configuration

use crate::matchmaking::QueuePolicy;
use crate::room::RoomTimings;
use crate::types::{MAX_CAPACITY, MIN_CAPACITY};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of a single game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub countdown_seconds: u32,
    pub question_seconds: u32,
    pub reveal_seconds: u64,
    /// Remaining time once one of two duellists has answered
    pub pressure_threshold_seconds: u32,
    /// Seats in a room when the creator does not ask for a number
    pub default_capacity: usize,
    /// Pause between `match_found` and the countdown of a ranked room
    pub match_intro_millis: u64,
    pub max_chat_length: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            countdown_seconds: 3,
            question_seconds: 20,
            reveal_seconds: 2,
            pressure_threshold_seconds: 5,
            default_capacity: 4,
            match_intro_millis: 2000,
            max_chat_length: 500,
        }
    }
}

impl GameSettings {
    pub fn timings(&self) -> RoomTimings {
        RoomTimings {
            countdown_seconds: self.countdown_seconds,
            question_seconds: self.question_seconds,
            reveal: Duration::from_secs(self.reveal_seconds),
            pressure_threshold_seconds: self.pressure_threshold_seconds,
            match_intro: Duration::from_millis(self.match_intro_millis),
            tick: Duration::from_secs(1),
            max_chat_length: self.max_chat_length,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.countdown_seconds == 0 || self.question_seconds == 0 || self.reveal_seconds == 0 {
            return Err(anyhow!("Game durations must be greater than 0"));
        }
        if self.pressure_threshold_seconds == 0 {
            return Err(anyhow!("Pressure threshold must be greater than 0"));
        }
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&self.default_capacity) {
            return Err(anyhow!(
                "Default capacity must be between {} and {}",
                MIN_CAPACITY,
                MAX_CAPACITY
            ));
        }
        if self.max_chat_length == 0 {
            return Err(anyhow!("Max chat length must be greater than 0"));
        }
        Ok(())
    }
}

/// Ranked queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    pub tick_interval_seconds: u64,
    pub base_tolerance: f64,
    pub tolerance_per_second: f64,
    pub questions_per_match: usize,
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            tick_interval_seconds: 5,
            base_tolerance: 50.0,
            tolerance_per_second: 2.0,
            questions_per_match: 10,
        }
    }
}

impl MatchmakingSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn policy(&self, initial_rating: i32) -> QueuePolicy {
        QueuePolicy {
            base_tolerance: self.base_tolerance,
            tolerance_per_second: self.tolerance_per_second,
            questions_per_match: self.questions_per_match,
            initial_rating,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.tick_interval_seconds == 0 {
            return Err(anyhow!("Matchmaking tick interval must be greater than 0"));
        }
        if self.base_tolerance < 0.0 || self.tolerance_per_second < 0.0 {
            return Err(anyhow!("Matchmaking tolerances cannot be negative"));
        }
        if self.questions_per_match == 0 {
            return Err(anyhow!("Questions per match must be greater than 0"));
        }
        Ok(())
    }
}
