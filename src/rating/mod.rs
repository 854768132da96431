//! Ranked rating system
//!
//! ELO calculation, profile storage and the post-match settlement that ties
//! them together.

pub mod elo;
pub mod settlement;
pub mod storage;

// Re-export commonly used types
pub use elo::{calculate, tier_for, EloCalculator, EloConfig, EloOutcome};
pub use settlement::{
    MatchOutcome, PlayerSettlement, RankedEntrant, RatingSettlement, SettlementPolicy,
    SettlementReport,
};
pub use storage::{
    InMemoryProfileStore, MatchPage, MatchRecord, MatchResult, PlayerProfile, ProfileStore,
};
