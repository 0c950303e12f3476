use super::{
    pool::WorkerPool,
    store::{JobId, JobRecord, JobStore, ResultHandle},
};
use crate::{
    archive::{NewRun, ResultArchive},
    config::{Config, Limits},
    engine::{Engine, ResultDocument},
    error::{Error, Result},
    library::Library,
    run_config::{ResolvedRun, RunConfig},
    util::ensure_dir,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

struct RunContext {
    engine: Arc<dyn Engine>,
    archive: ResultArchive,
    work_dir: PathBuf,
    keep_requests: bool,
}

/// Accepts run submissions, executes them on a bounded worker pool and
/// tracks their state in a [`JobStore`].
pub struct JobRunner {
    store: JobStore,
    pool: WorkerPool,
    library: Library,
    limits: Limits,
    ctx: Arc<RunContext>,
}

impl JobRunner {
    pub fn new(cfg: &Config, engine: Arc<dyn Engine>) -> Result<Self> {
        let work_dir = PathBuf::from(&cfg.paths.work_dir);
        ensure_dir(&work_dir)?;
        let pool = WorkerPool::new(cfg.workers.max_concurrent_jobs, cfg.workers.queue_capacity)?;
        Ok(Self {
            store: JobStore::new(),
            pool,
            library: Library::new(cfg),
            limits: cfg.limits.clone(),
            ctx: Arc::new(RunContext {
                engine,
                archive: ResultArchive::new(&cfg.paths.results_dir),
                work_dir,
                keep_requests: cfg.debug.keep_requests,
            }),
        })
    }

    /// A handle for readers; shares state with the runner.
    pub fn store(&self) -> JobStore {
        self.store.clone()
    }

    pub fn archive(&self) -> &ResultArchive {
        &self.ctx.archive
    }

    /// Validate and resolve `config`, then queue it. Never waits for the engine.
    pub fn submit(&self, config: RunConfig) -> Result<JobId> {
        let resolved = config.resolve(&self.library, &self.limits)?;
        let id = self.store.insert(resolved.config.clone());

        let ctx = Arc::clone(&self.ctx);
        let store = self.store.clone();
        if let Err(err) = self
            .pool
            .try_execute(move || execute(&ctx, &store, id, resolved))
        {
            self.store.withdraw(id);
            warn!("job {id} not admitted: {err}");
            return Err(err);
        }

        info!(
            "job {id} queued: player={} hands={} casino={} playing={} betting={}",
            config.player_name,
            config.num_hands,
            config.casino,
            config.playing_strategy,
            config.betting_strategy
        );
        Ok(id)
    }

    /// Submit each config independently; one refusal does not stop the rest.
    pub fn submit_batch(&self, configs: impl IntoIterator<Item = RunConfig>) -> Vec<Result<JobId>> {
        configs.into_iter().map(|cfg| self.submit(cfg)).collect()
    }

    pub fn get_status(&self, id: JobId) -> Result<JobRecord> {
        self.store.get(id)
    }

    pub fn get_result(&self, id: JobId) -> Result<ResultHandle> {
        self.store.get_result(id)
    }

    pub fn list(&self) -> Vec<JobRecord> {
        self.store.list()
    }

    /// Poll until the job is terminal, showing every snapshot to `observe`.
    pub fn wait(
        &self,
        id: JobId,
        poll: Duration,
        mut observe: impl FnMut(&JobRecord),
    ) -> Result<JobRecord> {
        loop {
            let record = self.store.get(id)?;
            observe(&record);
            if record.status.is_terminal() {
                return Ok(record);
            }
            std::thread::sleep(poll);
        }
    }

    /// Stop taking submissions and wait for queued jobs to finish.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

fn execute(ctx: &RunContext, store: &JobStore, id: JobId, resolved: ResolvedRun) {
    if !store.mark_running(id) {
        return;
    }
    info!("job {id} running");

    let outcome = catch_unwind(AssertUnwindSafe(|| run_job(ctx, store, id, &resolved)));
    match outcome {
        Ok(Ok(handle)) => {
            if let Some(err) = &handle.archive_error {
                warn!("job {id} complete but not fully archived: {err}");
            }
            store.complete(id, handle);
            info!("job {id} complete");
        }
        Ok(Err(err)) => {
            let message = match err {
                Error::EngineFailure(msg) => msg,
                other => other.to_string(),
            };
            warn!("job {id} failed: {message}");
            store.fail(id, message);
        }
        Err(_) => {
            warn!("job {id} failed: runner panicked");
            store.fail(id, "internal error: job runner panicked");
        }
    }
}

fn run_job(ctx: &RunContext, store: &JobStore, id: JobId, resolved: &ResolvedRun) -> Result<ResultHandle> {
    let job_dir = ctx.work_dir.join(id.to_string());
    ensure_dir(&job_dir)?;
    let results_path = job_dir.join("results.json");
    let request = resolved.engine_request(&id.to_string(), results_path.clone());
    if ctx.keep_requests {
        std::fs::write(job_dir.join("request.json"), serde_json::to_vec_pretty(&request)?)?;
    }

    let exit = ctx.engine.run(&request, &mut |p| {
        if store.record_progress(id, p) {
            debug!("job {id} progress {p}");
        }
    });
    let outcome = exit.and_then(|exit| {
        if !exit.success {
            let message = if exit.diagnostics.is_empty() {
                match exit.code {
                    Some(code) => format!("engine exited with code {code}"),
                    None => "engine terminated by signal".to_string(),
                }
            } else {
                exit.diagnostics
            };
            return Err(Error::EngineFailure(message));
        }
        ResultDocument::read(&results_path)
    });

    let finished = outcome.map(|(raw, doc)| {
        let archived = ctx
            .archive
            .archive(&id.to_string(), &raw, NewRun::from_config(&resolved.config));
        let (run_id, archive_error) = match archived {
            Ok(run_id) => (Some(run_id), None),
            Err(Error::Persistence { run_id, blob, message }) => (
                Some(run_id),
                Some(format!("{message} (blob kept at {})", blob.display())),
            ),
            Err(err) => (None, Some(err.to_string())),
        };
        ResultHandle {
            document: Arc::new(doc),
            run_id,
            archive_error,
        }
    });

    if !ctx.keep_requests {
        if let Err(err) = std::fs::remove_dir_all(&job_dir) {
            debug!("job {id}: leaving work dir {}: {err}", job_dir.display());
        }
    }
    finished
}
