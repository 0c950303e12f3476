#![allow(dead_code)]

use simdeck::{config::Config, run_config::RunConfig};
use std::path::Path;
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub cfg: Config,
}

/// A config rooted in a fresh temp dir, seeded with the shipped profiles.
pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let path = |rel: &str| root.join(rel).display().to_string();

    let mut cfg = Config::default();
    cfg.paths.playing_strategies_dir = path("strategies");
    cfg.paths.custom_playing_dir = path("custom/playing");
    cfg.paths.betting_strategies_dir = path("betting");
    cfg.paths.custom_betting_dir = path("custom/betting");
    cfg.paths.casinos_dir = path("casinos");
    cfg.paths.results_dir = path("results");
    cfg.paths.work_dir = path("work");
    cfg.engine.timeout_seconds = 30;

    write(
        root,
        "strategies/s17_basic_strategy.json",
        include_str!("../../data/strategies/s17_basic_strategy.json"),
    );
    write(
        root,
        "betting/flat_bet.json",
        include_str!("../../data/betting_strategies/flat_bet.json"),
    );
    write(
        root,
        "betting/hilo_ramp.json",
        include_str!("../../data/betting_strategies/hilo_ramp.json"),
    );
    write(
        root,
        "casinos/default_casino.json",
        include_str!("../../data/casinos/default_casino.json"),
    );

    Fixture { dir, cfg }
}

pub fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

pub fn run_config(player: &str) -> RunConfig {
    RunConfig {
        player_name: player.to_string(),
        bankroll: 1000,
        num_hands: 100,
        casino: "default_casino".into(),
        playing_strategy: "s17_basic_strategy".into(),
        betting_strategy: "flat_bet".into(),
    }
}

pub fn result_doc(player: &str, net: f64) -> String {
    serde_json::json!({
        "simulation_timestamp": "2026-01-01T00:00:00",
        "players": {
            player: {
                "Final Bankroll": 1000.0 + net,
                "Net Gain/Loss": net,
                "Hands Played": 100,
                "Average Bet": 10.0
            }
        },
        "hand_history": [
            {"round": 1, "bet": 10, "outcome": "win"},
            {"round": 2, "bet": 10, "outcome": "loss"}
        ]
    })
    .to_string()
}
