use crate::{
    betting::BettingStrategy,
    codec::RangeChart,
    error::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything the engine needs for one run, fully resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRequest {
    pub job_id: String,
    pub player: PlayerSpec,
    pub num_hands: u64,
    pub casino: serde_json::Value,
    pub playing_strategy: RangeChart,
    pub betting_strategy: BettingStrategy,
    pub results_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSpec {
    pub name: String,
    pub bankroll: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineExit {
    pub success: bool,
    pub code: Option<i32>,
    /// Captured stderr (or the in-process equivalent).
    pub diagnostics: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDiag {
    pub program: String,
    pub resolved: Option<String>,
    pub args: Vec<String>,
    pub timeout_seconds: u64,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Minimum shape of the engine's result document. Unknown fields ride along
/// in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub players: BTreeMap<String, PlayerStats>,
    pub hand_history: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    #[serde(rename = "Final Bankroll", alias = "final_bankroll")]
    pub final_bankroll: f64,
    #[serde(rename = "Net Gain/Loss", alias = "net_gain_loss")]
    pub net_gain_loss: f64,
    #[serde(rename = "Hands Played", alias = "hands_played")]
    pub hands_played: u64,
    #[serde(rename = "Average Bet", alias = "average_bet")]
    pub average_bet: f64,
}

impl ResultDocument {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Read and check the document the engine left behind. Returns the raw
    /// bytes alongside so they can be archived verbatim.
    pub fn read(path: &Path) -> Result<(Vec<u8>, Self)> {
        let raw = std::fs::read(path).map_err(|e| {
            Error::EngineFailure(format!(
                "result not produced: {} ({e})",
                path.display()
            ))
        })?;
        let doc = Self::parse(&raw).map_err(|e| {
            Error::EngineFailure(format!(
                "result not produced: {} is not a valid result document ({e})",
                path.display()
            ))
        })?;
        Ok((raw, doc))
    }
}
