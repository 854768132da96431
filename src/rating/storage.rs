//! Player profile storage interface and implementations
//!
//! Ranked results are persisted through a small key-value style interface so
//! that the settlement path does not care where profiles actually live.

use crate::error::{ArenaError, Result};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Ranked profile of an external account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub user_id: UserId,
    pub username: String,
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub last_played: Option<DateTime<Utc>>,
}

impl PlayerProfile {
    /// Create a fresh profile for an account that has never played ranked
    pub fn new(user_id: impl Into<UserId>, username: impl Into<String>, rating: i32) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            rating,
            wins: 0,
            losses: 0,
            draws: 0,
            last_played: None,
        }
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}

/// Result of a match from one player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Win,
    Loss,
    Draw,
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchResult::Win => write!(f, "win"),
            MatchResult::Loss => write!(f, "loss"),
            MatchResult::Draw => write!(f, "draw"),
        }
    }
}

/// One row of a player's ranked match history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub match_id: Uuid,
    pub user_id: UserId,
    pub opponent_id: UserId,
    pub opponent_name: String,
    pub result: MatchResult,
    pub score: u32,
    pub opponent_score: u32,
    pub rating_before: i32,
    pub rating_after: i32,
    pub delta: i32,
    pub played_at: DateTime<Utc>,
}

/// A page of match history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPage {
    pub items: Vec<MatchRecord>,
    pub page: usize,
    pub page_size: usize,
    pub has_next: bool,
}

/// Trait for profile storage operations
#[cfg_attr(test, mockall::automock)]
pub trait ProfileStore: Send + Sync {
    /// Get a profile by account id
    fn get_profile(&self, user_id: &str) -> Result<Option<PlayerProfile>>;

    /// Store or replace a profile
    fn put_profile(&self, profile: PlayerProfile) -> Result<()>;

    /// Append a match record to a player's history
    fn append_match(&self, record: MatchRecord) -> Result<()>;

    /// Top `limit` profiles by rating
    fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerProfile>>;

    /// Newest-first match history, `page` starting at 1
    fn match_history(&self, user_id: &str, page: usize, page_size: usize) -> Result<MatchPage>;

    /// Number of stored profiles
    fn profile_count(&self) -> Result<usize>;
}

/// In-memory profile storage
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<UserId, PlayerProfile>>,
    matches: RwLock<Vec<MatchRecord>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error(what: &str) -> ArenaError {
        ArenaError::Internal {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn get_profile(&self, user_id: &str) -> Result<Option<PlayerProfile>> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| Self::lock_error("profiles read"))?;

        Ok(profiles.get(user_id).cloned())
    }

    fn put_profile(&self, profile: PlayerProfile) -> Result<()> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| Self::lock_error("profiles write"))?;

        profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    fn append_match(&self, record: MatchRecord) -> Result<()> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| Self::lock_error("matches write"))?;

        matches.push(record);
        Ok(())
    }

    fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerProfile>> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| Self::lock_error("profiles read"))?;

        let mut ranked: Vec<PlayerProfile> = profiles.values().cloned().collect();
        // Highest rating first, ties broken by wins then name for a stable order
        ranked.sort_by(|a, b| {
            b.rating
                .cmp(&a.rating)
                .then(b.wins.cmp(&a.wins))
                .then(a.username.cmp(&b.username))
        });
        ranked.truncate(limit);

        Ok(ranked)
    }

    fn match_history(&self, user_id: &str, page: usize, page_size: usize) -> Result<MatchPage> {
        let matches = self
            .matches
            .read()
            .map_err(|_| Self::lock_error("matches read"))?;

        let page = page.max(1);
        let page_size = page_size.max(1);

        let mut history: Vec<&MatchRecord> =
            matches.iter().filter(|m| m.user_id == user_id).collect();
        history.sort_by(|a, b| b.played_at.cmp(&a.played_at));

        let skip = (page - 1) * page_size;
        let items: Vec<MatchRecord> = history
            .iter()
            .skip(skip)
            .take(page_size)
            .map(|m| (*m).clone())
            .collect();
        let has_next = history.len() > skip + items.len();

        Ok(MatchPage {
            items,
            page,
            page_size,
            has_next,
        })
    }

    fn profile_count(&self) -> Result<usize> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| Self::lock_error("profiles read"))?;

        Ok(profiles.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(user_id: &str, minutes_ago: i64) -> MatchRecord {
        MatchRecord {
            match_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            opponent_id: "opponent".to_string(),
            opponent_name: "Opponent".to_string(),
            result: MatchResult::Win,
            score: 3,
            opponent_score: 1,
            rating_before: 1000,
            rating_after: 1016,
            delta: 16,
            played_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_profile_roundtrip() {
        let store = InMemoryProfileStore::new();
        assert!(store.get_profile("u1").unwrap().is_none());

        store
            .put_profile(PlayerProfile::new("u1", "Alice", 1000))
            .unwrap();

        let profile = store.get_profile("u1").unwrap().unwrap();
        assert_eq!(profile.username, "Alice");
        assert_eq!(profile.games_played(), 0);
        assert_eq!(store.profile_count().unwrap(), 1);
    }

    #[test]
    fn test_leaderboard_ordering() {
        let store = InMemoryProfileStore::new();
        store.put_profile(PlayerProfile::new("a", "A", 1200)).unwrap();
        store.put_profile(PlayerProfile::new("b", "B", 1500)).unwrap();
        store.put_profile(PlayerProfile::new("c", "C", 900)).unwrap();

        let top = store.leaderboard(2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, "b");
        assert_eq!(top[1].user_id, "a");
    }

    #[test]
    fn test_match_history_is_newest_first_and_paginated() {
        let store = InMemoryProfileStore::new();
        for minutes_ago in [30, 10, 20] {
            store.append_match(record("u1", minutes_ago)).unwrap();
        }
        store.append_match(record("u2", 5)).unwrap();

        let first = store.match_history("u1", 1, 2).unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_next);
        assert!(first.items[0].played_at > first.items[1].played_at);

        let second = store.match_history("u1", 2, 2).unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(!second.has_next);
        assert!(second.items[0].played_at < first.items[1].played_at);
    }

    #[test]
    fn test_profile_wire_format() {
        let json = serde_json::to_value(PlayerProfile::new("u1", "Alice", 1000)).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["rating"], 1000);
        assert!(json["lastPlayed"].is_null());
    }
}
