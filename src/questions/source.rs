//! Question source interface
//!
//! The room engine never talks to a question backend itself. Callers fetch a
//! batch up front (the host through the REST surface, the matchmaking queue
//! before synthesizing a ranked room) and hand it to the room.

use crate::error::Result;
use crate::questions::model::Question;
use crate::types::{Difficulty, RoomSettings};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What to fetch from a question source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    pub difficulty: Difficulty,
    pub category: String,
    pub count: usize,
}

impl QuestionRequest {
    pub fn new(difficulty: Difficulty, category: impl Into<String>, count: usize) -> Self {
        Self {
            difficulty,
            category: category.into(),
            count,
        }
    }
}

impl From<&RoomSettings> for QuestionRequest {
    fn from(settings: &RoomSettings) -> Self {
        Self::new(
            settings.difficulty,
            settings.category.clone(),
            settings.question_count,
        )
    }
}

/// Trait for anything that can produce a batch of normalized questions
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch up to `request.count` questions
    async fn fetch(&self, request: &QuestionRequest) -> Result<Vec<Question>>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}
