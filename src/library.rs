//! Profile files on disk: playing strategies (default + custom), betting
//! strategies (default + custom) and casino rule sets.
//!
//! Every name passes through [`validate_name`] before a path is built from it.

use crate::{
    betting::BettingStrategy,
    codec::{self, ExpandedChart, RangeChart},
    config::Config,
    error::{Error, Result},
    util::{ensure_dir, validate_name},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// File name, including `.json`.
    pub name: String,
    pub is_custom: bool,
}

#[derive(Debug, Clone)]
pub struct Library {
    playing_dir: PathBuf,
    custom_playing_dir: PathBuf,
    betting_dir: PathBuf,
    custom_betting_dir: PathBuf,
    casinos_dir: PathBuf,
}

impl Library {
    pub fn new(cfg: &Config) -> Self {
        Self {
            playing_dir: PathBuf::from(&cfg.paths.playing_strategies_dir),
            custom_playing_dir: PathBuf::from(&cfg.paths.custom_playing_dir),
            betting_dir: PathBuf::from(&cfg.paths.betting_strategies_dir),
            custom_betting_dir: PathBuf::from(&cfg.paths.custom_betting_dir),
            casinos_dir: PathBuf::from(&cfg.paths.casinos_dir),
        }
    }

    pub fn list_playing(&self) -> Result<Vec<ProfileEntry>> {
        list_profiles(&self.playing_dir, &self.custom_playing_dir)
    }

    pub fn load_playing_range(&self, name: &str) -> Result<RangeChart> {
        let path = find_profile(name, &[&self.custom_playing_dir, &self.playing_dir])?;
        let raw = std::fs::read(&path)?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::Config(format!("playing strategy {}: {e}", path.display())))
    }

    pub fn load_playing_expanded(&self, name: &str) -> Result<ExpandedChart> {
        codec::expand(&self.load_playing_range(name)?)
    }

    /// Compact an editor chart and store it as a custom playing strategy.
    pub fn save_playing(&self, name: &str, chart: &ExpandedChart) -> Result<PathBuf> {
        let stem = validate_name(name)?;
        let range = codec::compact(chart);
        let path = write_profile(&self.custom_playing_dir, &stem, &range)?;
        info!("saved playing strategy {} ({} hands)", path.display(), chart.len());
        Ok(path)
    }

    /// Only custom strategies can be deleted.
    pub fn delete_playing(&self, name: &str) -> Result<()> {
        let stem = validate_name(name)?;
        let path = self.custom_playing_dir.join(format!("{stem}.json"));
        if !path.is_file() {
            return Err(Error::NotFound(format!("custom playing strategy {stem}")));
        }
        std::fs::remove_file(&path)?;
        info!("deleted playing strategy {}", path.display());
        Ok(())
    }

    pub fn list_betting(&self) -> Result<Vec<ProfileEntry>> {
        list_profiles(&self.betting_dir, &self.custom_betting_dir)
    }

    pub fn load_betting(&self, name: &str) -> Result<BettingStrategy> {
        let path = find_profile(name, &[&self.custom_betting_dir, &self.betting_dir])?;
        BettingStrategy::from_json(&std::fs::read(&path)?)
    }

    pub fn save_betting(&self, name: &str, strategy: &BettingStrategy) -> Result<PathBuf> {
        let stem = validate_name(name)?;
        strategy.validate()?;
        let path = write_profile(&self.custom_betting_dir, &stem, strategy)?;
        info!("saved betting strategy {}", path.display());
        Ok(path)
    }

    pub fn list_casinos(&self) -> Result<Vec<String>> {
        Ok(json_files(&self.casinos_dir)?.into_iter().collect())
    }

    /// Casino rules are handed to the engine untouched.
    pub fn load_casino(&self, name: &str) -> Result<serde_json::Value> {
        let path = find_profile(name, &[&self.casinos_dir])?;
        let rules: serde_json::Value = serde_json::from_slice(&std::fs::read(&path)?)
            .map_err(|e| Error::Config(format!("casino profile {}: {e}", path.display())))?;
        if !rules.is_object() {
            return Err(Error::Config(format!(
                "casino profile {} is not a JSON object",
                path.display()
            )));
        }
        Ok(rules)
    }
}

fn find_profile(name: &str, dirs: &[&Path]) -> Result<PathBuf> {
    let stem = validate_name(name)?;
    let file = format!("{stem}.json");
    for dir in dirs {
        let candidate = dir.join(&file);
        if candidate.is_file() {
            debug!("resolved profile {stem} -> {}", candidate.display());
            return Ok(candidate);
        }
    }
    Err(Error::NotFound(format!("profile {file}")))
}

fn write_profile<T: Serialize>(dir: &Path, stem: &str, value: &T) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(format!("{stem}.json"));
    std::fs::write(&path, serde_json::to_vec_pretty(value)?)?;
    Ok(path)
}

fn list_profiles(default_dir: &Path, custom_dir: &Path) -> Result<Vec<ProfileEntry>> {
    let defaults = json_files(default_dir)?;
    let custom = json_files(custom_dir)?;
    Ok(defaults
        .union(&custom)
        .map(|name| ProfileEntry {
            name: name.clone(),
            is_custom: custom.contains(name),
        })
        .collect())
}

fn json_files(dir: &Path) -> Result<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(".json") {
                out.insert(name.to_string());
            }
        }
    }
    Ok(out)
}
