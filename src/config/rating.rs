//! Rating system configuration

use crate::rating::elo::{DEFAULT_INITIAL_RATING, DEFAULT_K_FACTOR, DEFAULT_MIN_DELTA};
use crate::rating::{EloConfig, SettlementPolicy};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingSettings {
    pub initial_rating: i32,
    pub k_factor: f64,
    pub min_delta: i32,
    /// Attempts per storage call during settlement
    pub settlement_attempts: u32,
    pub settlement_retry_delay_ms: u64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            initial_rating: DEFAULT_INITIAL_RATING,
            k_factor: DEFAULT_K_FACTOR,
            min_delta: DEFAULT_MIN_DELTA,
            settlement_attempts: 3,
            settlement_retry_delay_ms: 500,
        }
    }
}

impl RatingSettings {
    pub fn elo(&self) -> EloConfig {
        EloConfig {
            k_factor: self.k_factor,
            min_delta: self.min_delta,
        }
    }

    pub fn settlement(&self) -> SettlementPolicy {
        SettlementPolicy {
            attempts: self.settlement_attempts,
            retry_delay: Duration::from_millis(self.settlement_retry_delay_ms),
            initial_rating: self.initial_rating,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.initial_rating < 0 {
            return Err(anyhow!("Initial rating cannot be negative"));
        }
        if self.k_factor <= 0.0 {
            return Err(anyhow!("K-factor must be positive"));
        }
        if self.min_delta < 0 {
            return Err(anyhow!("Minimum delta cannot be negative"));
        }
        if self.settlement_attempts == 0 {
            return Err(anyhow!("Settlement attempts must be at least 1"));
        }
        Ok(())
    }
}
