use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub workers: Workers,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub print_summary: bool,
    /// How often `run`/`batch` poll job status.
    pub poll_interval_ms: u64,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
            poll_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub playing_strategies_dir: String,
    pub custom_playing_dir: String,
    pub betting_strategies_dir: String,
    pub custom_betting_dir: String,
    pub casinos_dir: String,
    pub results_dir: String,
    pub work_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            playing_strategies_dir: "data/strategies".into(),
            custom_playing_dir: "data/custom/playing".into(),
            betting_strategies_dir: "data/betting_strategies".into(),
            custom_betting_dir: "data/custom/betting".into(),
            casinos_dir: "data/casinos".into(),
            results_dir: "simulation_results".into(),
            work_dir: ".simdeck-work".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Wall-clock limit per run; 0 disables it.
    pub timeout_seconds: u64,
    pub keep_stderr: bool,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            program: "python3".into(),
            args: vec!["engine/run_engine.py".into()],
            env: Default::default(),
            timeout_seconds: 3600,
            keep_stderr: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Workers {
    pub max_concurrent_jobs: usize,
    pub queue_capacity: usize,
}
impl Default for Workers {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            queue_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_num_hands: u64,
    pub max_bankroll: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_num_hands: 10_000_000,
            max_bankroll: 1_000_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub player_name: String,
    pub bankroll: u64,
    pub num_hands: u64,
    pub casino: String,
    pub playing_strategy: String,
    pub betting_strategy: String,
}
impl Default for Defaults {
    fn default() -> Self {
        Self {
            player_name: "DefaultPlayer".into(),
            bankroll: 1000,
            num_hands: 100,
            casino: "default_casino".into(),
            playing_strategy: "s17_basic_strategy".into(),
            betting_strategy: "flat_bet".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    /// Leave each job's engine request document in the work dir.
    pub keep_requests: bool,
}
