//! Betting strategies as a closed set of variants, checked once when a run is
//! configured and shipped to the engine inside the request document.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BettingStrategy {
    Flat {
        unit: f64,
    },
    /// Bet `min_bet * bet_multiplier` for the highest tier whose threshold the
    /// true count reaches; `min_bet` below every tier.
    Ramp {
        min_bet: f64,
        #[serde(default)]
        bet_ramp: Vec<RampTier>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RampTier {
    pub count_threshold: f64,
    pub bet_multiplier: f64,
}

impl BettingStrategy {
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let strategy: BettingStrategy = serde_json::from_slice(raw)
            .map_err(|e| Error::Config(format!("betting strategy: {e}")))?;
        strategy.validate()?;
        Ok(strategy.normalized())
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            BettingStrategy::Flat { unit } => {
                if !(unit.is_finite() && *unit > 0.0) {
                    return Err(Error::Config(format!("flat bet unit must be positive, got {unit}")));
                }
            }
            BettingStrategy::Ramp { min_bet, bet_ramp } => {
                if !(min_bet.is_finite() && *min_bet > 0.0) {
                    return Err(Error::Config(format!("ramp min_bet must be positive, got {min_bet}")));
                }
                for tier in bet_ramp {
                    if !tier.count_threshold.is_finite() {
                        return Err(Error::Config("ramp count_threshold must be finite".into()));
                    }
                    if !(tier.bet_multiplier.is_finite() && tier.bet_multiplier > 0.0) {
                        return Err(Error::Config(format!(
                            "ramp bet_multiplier must be positive, got {}",
                            tier.bet_multiplier
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Ramp tiers sorted by threshold, highest first.
    pub fn normalized(mut self) -> Self {
        if let BettingStrategy::Ramp { bet_ramp, .. } = &mut self {
            bet_ramp.sort_by(|a, b| b.count_threshold.total_cmp(&a.count_threshold));
        }
        self
    }

    /// The wager the engine is expected to place at `true_count`; `betting
    /// show` prints it as a table.
    pub fn bet_for_true_count(&self, true_count: f64) -> f64 {
        match self {
            BettingStrategy::Flat { unit } => *unit,
            BettingStrategy::Ramp { min_bet, bet_ramp } => bet_ramp
                .iter()
                .filter(|t| true_count >= t.count_threshold)
                .max_by(|a, b| a.count_threshold.total_cmp(&b.count_threshold))
                .map(|t| min_bet * t.bet_multiplier)
                .unwrap_or(*min_bet),
        }
    }
}
