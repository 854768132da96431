//! ELO rating calculator
//!
//! Pure functions only: the expected score comes from the skillratings crate,
//! the delta rules (minimum swing, rating floor) are applied on top.

use crate::types::Tier;
use serde::{Deserialize, Serialize};
use skillratings::elo::{expected_score, EloRating};

/// Default K factor
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Smallest rating swing a decisive match can produce
pub const DEFAULT_MIN_DELTA: i32 = 10;

/// Rating assigned to accounts that have never played ranked
pub const DEFAULT_INITIAL_RATING: i32 = 1000;

/// Tunable parameters for the calculator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloConfig {
    pub k_factor: f64,
    pub min_delta: i32,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
            min_delta: DEFAULT_MIN_DELTA,
        }
    }
}

/// Outcome of a decisive match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EloOutcome {
    pub winner_new: i32,
    pub loser_new: i32,
    pub delta: i32,
}

/// ELO calculator with a configurable K factor and minimum swing
#[derive(Debug, Clone, Copy, Default)]
pub struct EloCalculator {
    config: EloConfig,
}

impl EloCalculator {
    pub fn new(config: EloConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> EloConfig {
        self.config
    }

    /// Probability that `rating` beats `opponent`
    pub fn expected(&self, rating: i32, opponent: i32) -> f64 {
        let (expected, _) = expected_score(
            &EloRating {
                rating: rating as f64,
            },
            &EloRating {
                rating: opponent as f64,
            },
        );
        expected
    }

    /// Compute new ratings after `winner` beat `loser`
    pub fn calculate(&self, winner: i32, loser: i32) -> EloOutcome {
        let expected = self.expected(winner, loser);
        let raw = (self.config.k_factor * (1.0 - expected)).round() as i32;
        let delta = raw.max(self.config.min_delta);

        EloOutcome {
            winner_new: winner + delta,
            loser_new: (loser - delta).max(0),
            delta,
        }
    }
}

/// Convenience wrapper using the default K factor and minimum swing
pub fn calculate(winner: i32, loser: i32) -> EloOutcome {
    EloCalculator::default().calculate(winner, loser)
}

/// Map a rating onto its tier
pub fn tier_for(rating: i32) -> Tier {
    match rating {
        r if r < 1100 => Tier::Bronze,
        r if r < 1300 => Tier::Silver,
        r if r < 1500 => Tier::Gold,
        r if r < 1700 => Tier::Platinum,
        r if r < 1900 => Tier::Diamond,
        _ => Tier::Master,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_match_is_symmetric() {
        let outcome = calculate(1000, 1000);
        assert_eq!(outcome.delta, 16);
        assert_eq!(outcome.winner_new - 1000, 1000 - outcome.loser_new);
    }

    #[test]
    fn test_expected_win_is_worth_less() {
        let even = calculate(1000, 1000);
        let favourite = calculate(2000, 1000);
        assert!(favourite.delta < even.delta);
    }

    #[test]
    fn test_upset_is_worth_more() {
        let even = calculate(1000, 1000);
        let upset = calculate(1000, 1400);
        assert!(upset.delta > even.delta);
        assert!(upset.delta <= DEFAULT_K_FACTOR as i32);
    }

    #[test]
    fn test_minimum_delta() {
        assert_eq!(calculate(2400, 800).delta, DEFAULT_MIN_DELTA);
    }

    #[test]
    fn test_loser_floored_at_zero() {
        let outcome = calculate(10, 5);
        assert_eq!(outcome.loser_new, 0);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(tier_for(0), Tier::Bronze);
        assert_eq!(tier_for(1000), Tier::Bronze);
        assert_eq!(tier_for(1100), Tier::Silver);
        assert_eq!(tier_for(1450), Tier::Gold);
        assert_eq!(tier_for(1500), Tier::Platinum);
        assert_eq!(tier_for(1899), Tier::Diamond);
        assert_eq!(tier_for(2500), Tier::Master);
    }

    #[test]
    fn test_custom_k_factor() {
        let calculator = EloCalculator::new(EloConfig {
            k_factor: 64.0,
            min_delta: 10,
        });
        assert_eq!(calculator.calculate(1000, 1000).delta, 32);
    }
}
