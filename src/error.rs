use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid submission parameters. Raised before a job exists.
    #[error("invalid run configuration: {0}")]
    Config(String),

    /// Engine exited non-zero, timed out, or left no usable result document.
    #[error("engine failure: {0}")]
    EngineFailure(String),

    /// Metadata could not be written (or removed) around an archived blob.
    /// `blob` is left on disk for manual recovery.
    #[error("archive persistence failed for run {run_id} (blob {}): {message}", blob.display())]
    Persistence {
        run_id: String,
        blob: PathBuf,
        message: String,
    },

    #[error("job {0} has not completed")]
    NotReady(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("malformed range token {token:?}: {reason}")]
    MalformedRange { token: String, reason: String },

    /// Worker pool admission queue is full or shut down.
    #[error("job rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(token: &str, reason: impl Into<String>) -> Self {
        Error::MalformedRange {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}
