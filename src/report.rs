use crate::{archive::RunMetadata, engine::ResultDocument};
use serde::{Deserialize, Serialize};

/// One row of the run history: the stored metadata plus whatever could be
/// read back out of the result blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub metadata: RunMetadata,
    pub summary: BlobSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BlobSummary {
    Available {
        final_bankroll: f64,
        net_gain_loss: f64,
        outcome: Outcome,
    },
    Unavailable {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Push,
}

impl BlobSummary {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        BlobSummary::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn from_document(doc: &ResultDocument, player_name: &str) -> Self {
        let Some(stats) = doc.players.get(player_name) else {
            return Self::unavailable(format!("player {player_name:?} not in results"));
        };
        let outcome = if stats.net_gain_loss > 0.0 {
            Outcome::Win
        } else if stats.net_gain_loss < 0.0 {
            Outcome::Loss
        } else {
            Outcome::Push
        };
        BlobSummary::Available {
            final_bankroll: stats.final_bankroll,
            net_gain_loss: stats.net_gain_loss,
            outcome,
        }
    }
}
