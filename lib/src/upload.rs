//! Batch upload of artifacts to remote storage.
//!
//! The collaborator is invoked exactly once per batch and must exit zero
//! only if every file transferred. Deleting local files is never its job;
//! the orchestrator does that, gated on this exit status.

use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::ARTIFACT_EXTENSION;
use crate::errors::UploadError;
use crate::process::ProcessRunner;

pub trait Uploader {
    /// Transfers every artifact in the configured directory to the remote.
    fn upload_batch(&self, timeout: Duration) -> Result<(), UploadError>;
}

/// Production uploader: one `rclone copy` of the output directory,
/// filtered to artifact files.
pub struct RcloneUploader<R: ProcessRunner> {
    runner: R,
    local_dir: PathBuf,
    remote: String,
}

impl<R: ProcessRunner> RcloneUploader<R> {
    pub fn new(runner: R, local_dir: PathBuf, remote: String) -> Self {
        Self {
            runner,
            local_dir,
            remote,
        }
    }
}

impl<R: ProcessRunner> Uploader for RcloneUploader<R> {
    fn upload_batch(&self, timeout: Duration) -> Result<(), UploadError> {
        log::info!(
            "uploading artifacts from {} to {}",
            self.local_dir.display(),
            self.remote
        );
        let args = vec![
            "copy".to_owned(),
            self.local_dir.to_string_lossy().into_owned(),
            self.remote.clone(),
            "--include".to_owned(),
            format!("*.{}", ARTIFACT_EXTENSION),
        ];
        self.runner
            .run_checked("rclone", &args, timeout)
            .map(|_| ())
            .map_err(UploadError::Process)
    }
}
