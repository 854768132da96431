//! Ranked 1v1 matchmaking

pub mod queue;

pub use queue::{pair_first_match, MatchmakingQueue, QueuePolicy, QueueTicket, QueuedPlayer};
