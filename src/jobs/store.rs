use crate::{
    engine::ResultDocument,
    error::{Error, Result},
    run_config::RunConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(JobId)
            .map_err(|_| Error::NotFound(format!("job {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    fn can_become(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Complete)
                | (JobStatus::Running, JobStatus::Error)
        )
    }
}

/// What a completed job hands back to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct ResultHandle {
    pub document: Arc<ResultDocument>,
    /// Archive run id, when archiving succeeded at least as far as the blob.
    pub run_id: Option<String>,
    /// Set when the engine succeeded but the archive could not record the run.
    pub archive_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub result: Option<ResultHandle>,
    pub error: Option<String>,
    pub config: RunConfig,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
}

/// Engine-reported progress stays below this until the job completes.
pub const MAX_RUNNING_PROGRESS: u8 = 99;

/// All jobs of this process, keyed by id. Lookups of unknown ids fail with
/// `NotFound`; records are never fabricated or reused.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    inner: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config: RunConfig) -> JobId {
        let id = JobId::new();
        let record = JobRecord {
            id,
            status: JobStatus::Queued,
            progress: 0,
            result: None,
            error: None,
            config,
            created_at: OffsetDateTime::now_utc(),
            started_at: None,
            finished_at: None,
        };
        self.write().insert(id, record);
        id
    }

    /// Withdraw a record that was never handed to a worker.
    pub(crate) fn withdraw(&self, id: JobId) {
        let mut jobs = self.write();
        if matches!(jobs.get(&id), Some(r) if r.status == JobStatus::Queued) {
            jobs.remove(&id);
        }
    }

    pub fn get(&self, id: JobId) -> Result<JobRecord> {
        self.read()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("job {id}")))
    }

    pub fn get_result(&self, id: JobId) -> Result<ResultHandle> {
        let jobs = self.read();
        let record = jobs
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("job {id}")))?;
        match (&record.status, &record.result) {
            (JobStatus::Complete, Some(result)) => Ok(result.clone()),
            _ => Err(Error::NotReady(id.to_string())),
        }
    }

    /// Newest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut all: Vec<JobRecord> = self.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn mark_running(&self, id: JobId) -> bool {
        self.transition(id, JobStatus::Running, |r| {
            r.started_at = Some(OffsetDateTime::now_utc());
        })
    }

    /// Record engine progress. Only strictly increasing values are kept, and
    /// only while the job is running.
    pub fn record_progress(&self, id: JobId, reported: u8) -> bool {
        let value = reported.min(MAX_RUNNING_PROGRESS);
        let mut jobs = self.write();
        match jobs.get_mut(&id) {
            Some(r) if r.status == JobStatus::Running && value > r.progress => {
                r.progress = value;
                true
            }
            _ => false,
        }
    }

    pub fn complete(&self, id: JobId, result: ResultHandle) -> bool {
        self.transition(id, JobStatus::Complete, |r| {
            r.progress = 100;
            r.result = Some(result);
            r.finished_at = Some(OffsetDateTime::now_utc());
        })
    }

    pub fn fail(&self, id: JobId, message: impl Into<String>) -> bool {
        let message = message.into();
        self.transition(id, JobStatus::Error, |r| {
            r.error = Some(message);
            r.finished_at = Some(OffsetDateTime::now_utc());
        })
    }

    fn transition(&self, id: JobId, next: JobStatus, apply: impl FnOnce(&mut JobRecord)) -> bool {
        let mut jobs = self.write();
        let Some(record) = jobs.get_mut(&id) else {
            warn!("job {id}: transition to {next:?} for unknown job");
            return false;
        };
        if !record.status.can_become(next) {
            warn!("job {id}: refusing transition {:?} -> {next:?}", record.status);
            return false;
        }
        record.status = next;
        apply(record);
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, JobRecord>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, JobRecord>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
