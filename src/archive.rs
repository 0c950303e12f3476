//! Durable store for finished runs.
//!
//! Layout under the results directory:
//!
//! ```text
//! results_<run_id>.json   result blob, written once
//! runs/<run_id>.json      metadata record
//! ```
//!
//! The blob is always written before its metadata record and removed before
//! it on delete, so a crash can leave an orphaned blob but never a record
//! pointing at nothing.

use crate::{
    engine::ResultDocument,
    error::{Error, Result},
    report::{BlobSummary, HistoryEntry},
    run_config::RunConfig,
    util::{ensure_dir, write_atomic},
};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub job_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub player_name: String,
    pub config: ConfigSummary,
    pub results_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub bankroll: u64,
    pub num_hands: u64,
    pub casino: String,
    pub playing_strategy: String,
    pub betting_strategy: String,
    pub config_sha256: String,
}

/// Metadata supplied by the caller of [`ResultArchive::archive`].
#[derive(Debug, Clone)]
pub struct NewRun {
    pub player_name: String,
    pub config: ConfigSummary,
}

impl NewRun {
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            player_name: cfg.player_name.clone(),
            config: ConfigSummary {
                bankroll: cfg.bankroll,
                num_hands: cfg.num_hands,
                casino: cfg.casino.clone(),
                playing_strategy: cfg.playing_strategy.clone(),
                betting_strategy: cfg.betting_strategy.clone(),
                config_sha256: cfg.fingerprint(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultArchive {
    root: PathBuf,
}

impl ResultArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn metadata_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(format!("{run_id}.json"))
    }

    fn blob_name(run_id: &str) -> String {
        format!("results_{run_id}.json")
    }

    /// Store a result blob under a fresh run id, then record its metadata.
    ///
    /// If the metadata write fails the blob stays where it is and the error
    /// names it.
    pub fn archive(&self, job_id: &str, blob: &[u8], run: NewRun) -> Result<String> {
        let run_id = Uuid::new_v4().to_string();
        let results_file = Self::blob_name(&run_id);
        let blob_path = self.root.join(&results_file);

        ensure_dir(&self.root)?;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&blob_path)?;
        file.write_all(blob)?;
        file.sync_all()?;

        let record = RunMetadata {
            run_id: run_id.clone(),
            job_id: job_id.to_string(),
            timestamp: OffsetDateTime::now_utc(),
            player_name: run.player_name,
            config: run.config,
            results_file,
        };
        if let Err(err) = self.write_metadata(&record) {
            warn!(
                "run {run_id}: metadata write failed, keeping blob {}: {err}",
                blob_path.display()
            );
            return Err(Error::Persistence {
                run_id,
                blob: blob_path,
                message: format!("writing metadata: {err}"),
            });
        }

        info!("archived run {run_id} for job {job_id} ({} bytes)", blob.len());
        Ok(run_id)
    }

    fn write_metadata(&self, record: &RunMetadata) -> Result<()> {
        ensure_dir(&self.runs_dir())?;
        write_atomic(
            &self.metadata_path(&record.run_id),
            &serde_json::to_vec_pretty(record)?,
        )
    }

    /// All runs, most recent first. Records that cannot be read are skipped.
    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        let mut records = Vec::new();
        for run_id in self.run_ids()? {
            match self.get(&run_id) {
                Ok(meta) => records.push(meta),
                Err(err) => warn!("skipping unreadable run record {run_id}: {err}"),
            }
        }
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.run_id.cmp(&a.run_id))
        });
        Ok(records
            .into_iter()
            .map(|metadata| {
                let summary = self.summarize(&metadata);
                HistoryEntry { metadata, summary }
            })
            .collect())
    }

    fn summarize(&self, meta: &RunMetadata) -> BlobSummary {
        let path = self.root.join(&meta.results_file);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(err) => return BlobSummary::unavailable(format!("results file: {err}")),
        };
        match ResultDocument::parse(&raw) {
            Ok(doc) => BlobSummary::from_document(&doc, &meta.player_name),
            Err(err) => BlobSummary::unavailable(format!("results file: {err}")),
        }
    }

    pub fn get(&self, run_id: &str) -> Result<RunMetadata> {
        let run_id = check_run_id(run_id)?;
        let path = self.metadata_path(&run_id);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("run {run_id}")));
            }
            Err(err) => return Err(err.into()),
        };
        let meta: RunMetadata = serde_json::from_slice(&raw)?;
        // The record names its own blob; anything else could point outside the archive.
        if meta.results_file != Self::blob_name(&run_id) {
            return Err(Error::InvalidName(meta.results_file));
        }
        Ok(meta)
    }

    /// The archived result document, as stored.
    pub fn load_result(&self, run_id: &str) -> Result<serde_json::Value> {
        let meta = self.get(run_id)?;
        let path = self.root.join(&meta.results_file);
        match std::fs::read(&path) {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(Error::NotFound(format!(
                "results file for run {}",
                meta.run_id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove a run's blob, then its metadata record. A missing blob is fine;
    /// a missing record is `NotFound`.
    pub fn delete(&self, run_id: &str) -> Result<()> {
        let run_id = check_run_id(run_id)?;
        let meta_path = self.metadata_path(&run_id);
        let blob_path = self.root.join(Self::blob_name(&run_id));

        match std::fs::remove_file(&blob_path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(Error::Persistence {
                    run_id,
                    blob: blob_path,
                    message: format!("removing blob: {err}"),
                });
            }
        }

        match std::fs::remove_file(&meta_path) {
            Ok(()) => {
                info!("deleted run {run_id}");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("run {run_id}")))
            }
            Err(err) => Err(Error::Persistence {
                run_id,
                blob: blob_path,
                message: format!("blob removed but metadata record remains: {err}"),
            }),
        }
    }

    /// Delete every run. All runs are attempted; the first failure is returned.
    pub fn clear(&self) -> Result<usize> {
        let mut deleted = 0;
        let mut first_err = None;
        for run_id in self.run_ids()? {
            match self.delete(&run_id) {
                Ok(()) => deleted += 1,
                Err(err) => {
                    warn!("clear: run {run_id}: {err}");
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(deleted),
        }
    }

    fn run_ids(&self) -> Result<Vec<String>> {
        let dir = self.runs_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".json") {
                if Uuid::parse_str(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

/// Run ids are uuids; anything else could name a path outside the archive.
fn check_run_id(raw: &str) -> Result<String> {
    Uuid::parse_str(raw.trim())
        .map(|u| u.to_string())
        .map_err(|_| Error::InvalidName(raw.to_string()))
}
