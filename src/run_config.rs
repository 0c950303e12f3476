use crate::{
    betting::BettingStrategy,
    codec::{self, RangeChart},
    config::{Defaults, Limits},
    engine::{EngineRequest, PlayerSpec},
    error::{Error, Result},
    library::Library,
    util::{sha256_hex, validate_name},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const MAX_PLAYER_NAME_LEN: usize = 80;

/// One simulation run as submitted: who plays, where, with which strategies,
/// for how many hands. Profile names are stored without `.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub player_name: String,
    pub bankroll: u64,
    pub num_hands: u64,
    pub casino: String,
    pub playing_strategy: String,
    pub betting_strategy: String,
}

/// Submission payload; absent fields fall back to `[defaults]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub player_name: Option<String>,
    pub bankroll: Option<u64>,
    #[serde(alias = "iterations")]
    pub num_hands: Option<u64>,
    #[serde(alias = "casino_profile")]
    pub casino: Option<String>,
    pub playing_strategy: Option<String>,
    pub betting_strategy: Option<String>,
}

impl RunRequest {
    pub fn into_config(self, defaults: &Defaults) -> RunConfig {
        RunConfig {
            player_name: self.player_name.unwrap_or_else(|| defaults.player_name.clone()),
            bankroll: self.bankroll.unwrap_or(defaults.bankroll),
            num_hands: self.num_hands.unwrap_or(defaults.num_hands),
            casino: self.casino.unwrap_or_else(|| defaults.casino.clone()),
            playing_strategy: self
                .playing_strategy
                .unwrap_or_else(|| defaults.playing_strategy.clone()),
            betting_strategy: self
                .betting_strategy
                .unwrap_or_else(|| defaults.betting_strategy.clone()),
        }
    }
}

/// A run whose profiles have been loaded and checked.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub config: RunConfig,
    pub casino: serde_json::Value,
    pub playing: RangeChart,
    pub betting: BettingStrategy,
}

impl RunConfig {
    /// Check names before anything touches the file system, then numbers.
    /// Returns the normalised config.
    pub fn validate(&self, limits: &Limits) -> Result<RunConfig> {
        let casino = validate_name(&self.casino)?;
        let playing_strategy = validate_name(&self.playing_strategy)?;
        let betting_strategy = validate_name(&self.betting_strategy)?;

        let player_name = self.player_name.trim().to_string();
        if player_name.is_empty() {
            return Err(Error::Config("player_name is required".into()));
        }
        if player_name.chars().count() > MAX_PLAYER_NAME_LEN {
            return Err(Error::Config(format!(
                "player_name longer than {MAX_PLAYER_NAME_LEN} characters"
            )));
        }
        if self.bankroll == 0 || self.bankroll > limits.max_bankroll {
            return Err(Error::Config(format!(
                "bankroll must be in 1..={}, got {}",
                limits.max_bankroll, self.bankroll
            )));
        }
        if self.num_hands == 0 || self.num_hands > limits.max_num_hands {
            return Err(Error::Config(format!(
                "num_hands must be in 1..={}, got {}",
                limits.max_num_hands, self.num_hands
            )));
        }

        Ok(RunConfig {
            player_name,
            bankroll: self.bankroll,
            num_hands: self.num_hands,
            casino,
            playing_strategy,
            betting_strategy,
        })
    }

    pub fn resolve(&self, library: &Library, limits: &Limits) -> Result<ResolvedRun> {
        let config = self.validate(limits)?;
        let casino = library.load_casino(&config.casino)?;
        let playing = codec::canonicalize(&library.load_playing_range(&config.playing_strategy)?)?;
        if playing.is_empty() {
            return Err(Error::Config(format!(
                "playing strategy {} has no hands",
                config.playing_strategy
            )));
        }
        let betting = library.load_betting(&config.betting_strategy)?;
        Ok(ResolvedRun {
            config,
            casino,
            playing,
            betting,
        })
    }

    /// Stable digest of the submitted parameters.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        sha256_hex(&canonical)
    }
}

impl ResolvedRun {
    pub fn engine_request(&self, job_id: &str, results_path: PathBuf) -> EngineRequest {
        EngineRequest {
            job_id: job_id.to_string(),
            player: PlayerSpec {
                name: self.config.player_name.clone(),
                bankroll: self.config.bankroll,
            },
            num_hands: self.config.num_hands,
            casino: self.casino.clone(),
            playing_strategy: self.playing.clone(),
            betting_strategy: self.betting.clone(),
            results_path,
        }
    }
}
