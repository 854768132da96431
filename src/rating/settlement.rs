//! Ranked settlement
//!
//! Runs after a ranked room reaches its final phase. Reads both profiles,
//! applies the ELO update (or records a draw) and writes profiles and match
//! records back, retrying failed storage calls with a linear backoff.

use crate::error::Result;
use crate::rating::elo::{tier_for, EloCalculator};
use crate::rating::storage::{MatchRecord, MatchResult, PlayerProfile, ProfileStore};
use crate::types::{PlayerId, Tier, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One side of a finished ranked match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntrant {
    pub player_id: PlayerId,
    pub user_id: UserId,
    pub username: String,
    pub score: u32,
}

/// Final scores of a ranked match, handed off by the room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub match_id: Uuid,
    pub entrants: [RankedEntrant; 2],
}

/// Settlement result for a single player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSettlement {
    pub player_id: PlayerId,
    pub user_id: UserId,
    pub rating: i32,
    pub delta: i32,
    pub tier: Tier,
    pub result: MatchResult,
}

/// Settlement result for the whole match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    pub match_id: Uuid,
    pub players: Vec<PlayerSettlement>,
}

/// Retry behaviour for storage calls
#[derive(Debug, Clone, Copy)]
pub struct SettlementPolicy {
    pub attempts: u32,
    pub retry_delay: Duration,
    pub initial_rating: i32,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_millis(500),
            initial_rating: crate::rating::elo::DEFAULT_INITIAL_RATING,
        }
    }
}

/// Applies ranked results to stored profiles
pub struct RatingSettlement {
    store: Arc<dyn ProfileStore>,
    calculator: EloCalculator,
    policy: SettlementPolicy,
}

impl RatingSettlement {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        calculator: EloCalculator,
        policy: SettlementPolicy,
    ) -> Self {
        Self {
            store,
            calculator,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Load a profile, creating it at the initial rating when missing
    pub async fn load_or_create(&self, user_id: &str, username: &str) -> Result<PlayerProfile> {
        let existing = self
            .with_retry("load profile", || self.store.get_profile(user_id))
            .await?;

        Ok(existing.unwrap_or_else(|| {
            PlayerProfile::new(user_id, username, self.policy.initial_rating)
        }))
    }

    /// Settle a finished ranked match
    pub async fn settle(&self, outcome: &MatchOutcome) -> Result<SettlementReport> {
        let [first, second] = &outcome.entrants;

        let mut first_profile = self.load_or_create(&first.user_id, &first.username).await?;
        let mut second_profile = self
            .load_or_create(&second.user_id, &second.username)
            .await?;

        let before = (first_profile.rating, second_profile.rating);
        let now = Utc::now();

        let (first_result, second_result) = if first.score > second.score {
            let elo = self.calculator.calculate(before.0, before.1);
            first_profile.rating = elo.winner_new;
            second_profile.rating = elo.loser_new;
            first_profile.wins += 1;
            second_profile.losses += 1;
            (MatchResult::Win, MatchResult::Loss)
        } else if second.score > first.score {
            let elo = self.calculator.calculate(before.1, before.0);
            second_profile.rating = elo.winner_new;
            first_profile.rating = elo.loser_new;
            second_profile.wins += 1;
            first_profile.losses += 1;
            (MatchResult::Loss, MatchResult::Win)
        } else {
            first_profile.draws += 1;
            second_profile.draws += 1;
            (MatchResult::Draw, MatchResult::Draw)
        };

        first_profile.username = first.username.clone();
        second_profile.username = second.username.clone();
        first_profile.last_played = Some(now);
        second_profile.last_played = Some(now);

        let records = [
            self.record(outcome.match_id, first, second, first_result, before.0, &first_profile),
            self.record(outcome.match_id, second, first, second_result, before.1, &second_profile),
        ];

        for profile in [&first_profile, &second_profile] {
            self.with_retry("store profile", || self.store.put_profile(profile.clone()))
                .await?;
        }
        for record in &records {
            self.with_retry("store match record", || {
                self.store.append_match(record.clone())
            })
            .await?;
        }

        info!(
            "Settled ranked match {}: {} {} ({:+}) vs {} {} ({:+})",
            outcome.match_id,
            first.username,
            first_result,
            records[0].delta,
            second.username,
            second_result,
            records[1].delta
        );

        Ok(SettlementReport {
            match_id: outcome.match_id,
            players: vec![
                Self::player_settlement(first, &first_profile, &records[0]),
                Self::player_settlement(second, &second_profile, &records[1]),
            ],
        })
    }

    fn record(
        &self,
        match_id: Uuid,
        me: &RankedEntrant,
        opponent: &RankedEntrant,
        result: MatchResult,
        rating_before: i32,
        profile: &PlayerProfile,
    ) -> MatchRecord {
        MatchRecord {
            match_id,
            user_id: me.user_id.clone(),
            opponent_id: opponent.user_id.clone(),
            opponent_name: opponent.username.clone(),
            result,
            score: me.score,
            opponent_score: opponent.score,
            rating_before,
            rating_after: profile.rating,
            delta: profile.rating - rating_before,
            played_at: profile.last_played.unwrap_or_else(Utc::now),
        }
    }

    fn player_settlement(
        entrant: &RankedEntrant,
        profile: &PlayerProfile,
        record: &MatchRecord,
    ) -> PlayerSettlement {
        PlayerSettlement {
            player_id: entrant.player_id.clone(),
            user_id: entrant.user_id.clone(),
            rating: profile.rating,
            delta: record.delta,
            tier: tier_for(profile.rating),
            result: record.result,
        }
    }

    /// Run a storage call, retrying with a linearly growing delay
    async fn with_retry<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => {
                    error!("Failed to {} after {} attempts: {}", what, attempts, e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.policy.retry_delay * attempt;
                    warn!(
                        "Attempt {} to {} failed: {}. Retrying in {:?}",
                        attempt, what, e, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
