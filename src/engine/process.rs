use super::{Engine, types::*};
use crate::{
    config::Config,
    error::{Error, Result},
};
use regex::Regex;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{LazyLock, mpsc};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PROGRESS:\s*(\d{1,3})\s*$").expect("progress pattern compiles")
});

/// Parse one stdout line of the progress protocol. Anything that is not a
/// well-formed `PROGRESS:<0-100>` line yields `None`.
pub fn parse_progress_line(line: &str) -> Option<u8> {
    let caps = PROGRESS_LINE.captures(line)?;
    let value: u8 = caps[1].parse().ok()?;
    (value <= 100).then_some(value)
}

/// Runs the engine as a child process: request JSON on stdin, progress lines
/// on stdout, diagnostics on stderr, result document at `results_path`.
pub struct ProcessEngine {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    timeout: Option<Duration>,
    keep_stderr: bool,
}

impl ProcessEngine {
    pub fn new(cfg: &Config) -> Self {
        let timeout = (cfg.engine.timeout_seconds > 0)
            .then(|| Duration::from_secs(cfg.engine.timeout_seconds));
        Self {
            program: expand_tilde(cfg.engine.program.trim()),
            args: cfg.engine.args.clone(),
            env: cfg
                .engine
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            timeout,
            keep_stderr: cfg.engine.keep_stderr,
        }
    }

    pub fn doctor(&self) -> EngineDiag {
        let resolved = resolve_on_path(&self.program);
        let error = match &resolved {
            Some(_) => None,
            None => Some(format!("engine program not found: {}", self.program.display())),
        };
        EngineDiag {
            program: self.program.display().to_string(),
            resolved: resolved.map(|p| p.display().to_string()),
            args: self.args.clone(),
            timeout_seconds: self.timeout.map(|t| t.as_secs()).unwrap_or(0),
            ok: error.is_none(),
            error,
        }
    }
}

impl Engine for ProcessEngine {
    fn run(&self, request: &EngineRequest, progress: &mut dyn FnMut(u8)) -> Result<EngineExit> {
        debug!(
            "engine spawn {} {:?} timeout={:?}",
            self.program.display(),
            self.args,
            self.timeout
        );
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.env("SIMDECK_JOB_ID", &request.job_id);
        cmd.env("SIMDECK_RESULTS_PATH", &request.results_path);

        let request_bytes = serde_json::to_vec(request)?;
        let mut child = cmd.spawn().map_err(|e| {
            Error::EngineFailure(format!("spawning {}: {e}", self.program.display()))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::EngineFailure("engine stdout not captured".into()))?;
        let stderr = child.stderr.take();

        let (line_tx, line_rx) = mpsc::channel::<String>();
        let stdout_thread = std::thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        // Non-UTF-8 output is still drained; only the line is lossy.
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });
        let stderr_thread = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr {
                let _ = err.read_to_end(&mut buf);
            }
            buf
        });

        // Written from its own thread so a large request cannot block the
        // deadline loop below.
        if let Some(mut stdin) = child.stdin.take() {
            std::thread::spawn(move || {
                // An engine that takes its parameters elsewhere may exit
                // without reading stdin.
                if let Err(err) = stdin.write_all(&request_bytes).and_then(|_| stdin.flush()) {
                    debug!("engine stdin closed early: {err}");
                }
            });
        }

        let deadline = self.timeout.map(|t| Instant::now() + t);
        loop {
            let next = match deadline {
                Some(d) => line_rx.recv_timeout(d.saturating_duration_since(Instant::now())),
                None => line_rx
                    .recv()
                    .map_err(|_| mpsc::RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(line) => match parse_progress_line(&line) {
                    Some(p) => progress(p),
                    None => debug!("engine stdout: {}", line.trim_end()),
                },
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => return Err(self.kill(&mut child)),
            }
        }

        let status = match wait_until(&mut child, deadline)? {
            Some(status) => status,
            None => return Err(self.kill(&mut child)),
        };

        let _ = stdout_thread.join();
        let stderr = stderr_thread
            .join()
            .map_err(|_| Error::EngineFailure("stderr reader thread panicked".into()))?;
        let diagnostics = String::from_utf8_lossy(&stderr).trim().to_string();
        if self.keep_stderr && !diagnostics.is_empty() {
            debug!("engine stderr {}: {}", request.job_id, diagnostics);
        }

        Ok(EngineExit {
            success: status.success(),
            code: status.code(),
            diagnostics,
        })
    }
}

impl ProcessEngine {
    /// Reader threads are left detached: a grandchild may still hold the pipes.
    fn kill(&self, child: &mut Child) -> Error {
        let limit = self.timeout.unwrap_or_default();
        warn!("engine process timed out after {:?}; killing", limit);
        let _ = child.kill();
        let _ = child.wait();
        Error::EngineFailure(format!("engine timed out after {limit:?}"))
    }
}

fn wait_until(child: &mut Child, deadline: Option<Instant>) -> Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return Ok(Some(child.wait()?));
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn resolve_on_path(program: &std::path::Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
