//! Error types used by this lib.
use std::path::PathBuf;
use thiserror::Error;

/// Errors in the raw sample stream itself.
#[derive(Debug, Error)]
pub enum SpectralError {
    #[error("raw block of {len} bytes is not a whole number of I/Q pairs (4 bytes each)")]
    MalformedInput { len: usize },
}

/// Errors from invoking an external collaborator process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` did not finish within {timeout_s}s and was killed")]
    Timeout { program: String, timeout_s: u64 },
    #[error("`{program}` exited with code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },
    #[error("error while waiting on `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors in artifact file persistence.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("error in writing parquet file: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("error building record batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("IO error in file persistence: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact is missing required field `{field}`")]
    CorruptArtifact { field: String },
}

/// Errors that end a single capture-and-reduce run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("capture tool failed: {0}")]
    Capture(#[source] ProcessError),
    #[error(transparent)]
    MalformedInput(#[from] SpectralError),
    #[error("failed to persist artifact, raw capture retained: {0}")]
    Persist(#[source] PersistenceError),
    #[error("IO error reading raw capture: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the batch upload collaborator. Artifacts are never deleted
/// when one of these is raised.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("batch upload failed, local artifacts retained: {0}")]
    Process(#[source] ProcessError),
}

/// Errors that end the whole observation campaign.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("insufficient disk space: {free_mb} MB free, critical threshold {critical_mb} MB")]
    InsufficientResources { free_mb: u64, critical_mb: u64 },
    #[error("failed to query disk space: {0}")]
    Disk(#[source] std::io::Error),
    #[error("run {run}/{total} failed: {source}")]
    Run {
        run: u32,
        total: u32,
        #[source]
        source: RunError,
        /// Artifacts produced before the failure, retained on disk.
        retained: Vec<PathBuf>,
    },
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Heartbeat delivery failure. Strictly advisory: callers log and move on.
#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("heartbeat request failed: {0}")]
    Http(#[source] Box<ureq::Error>),
}
