//! Multi-run campaign orchestration
//!
//! Sequences N capture sessions with a disk-space preflight, radio silence
//! around each capture, advisory heartbeats, a single batch upload at the
//! end, and cleanup that deletes local artifacts only after the uploader
//! confirmed success. A capture failure aborts the remaining runs but
//! first attempts an emergency upload of whatever was already produced.
//! Every exit path ends with one more best-effort network restore.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::Mode;
use crate::errors::{CampaignError, RunError};
use crate::heartbeat::HeartbeatClient;
use crate::network::NetworkControl;
use crate::resources::DiskUsage;
use crate::session::{run_capture_session, CaptureTool, ObservationParams};
use crate::upload::Uploader;

/// Free-space level below which a warning is logged.
pub const DEFAULT_LOW_SPACE_MB: u64 = 1000;
/// Free-space level below which the campaign aborts before any capture.
pub const DEFAULT_CRITICAL_SPACE_MB: u64 = 500;
/// Per-run capture budget; the enforced timeout scales with the run count.
const CAPTURE_MINUTES_PER_RUN: u64 = 10;
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 20);
const NETWORK_WAIT: Duration = Duration::from_secs(45);

/// Everything the orchestrator needs to know up front.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    pub runs: u32,
    /// Pause between runs; skipped after the last one.
    pub pause: Duration,
    pub isolate_network: bool,
    /// Observation name tag, carried in progress logs.
    pub name: String,
    pub output_dir: PathBuf,
    /// Where the capture tool parks the raw intermediate file.
    pub raw_path: PathBuf,
    pub low_space_mb: u64,
    pub critical_space_mb: u64,
    pub capture_timeout: Duration,
    pub upload_timeout: Duration,
    pub network_wait: Duration,
    pub params: ObservationParams,
}

impl CampaignConfig {
    pub fn new(runs: u32, mode: Mode, output_dir: PathBuf) -> Self {
        let runs = runs.max(1);
        Self {
            runs,
            pause: Duration::from_secs(180),
            isolate_network: true,
            name: "observation".to_owned(),
            raw_path: output_dir.join("capture.bin"),
            output_dir,
            low_space_mb: DEFAULT_LOW_SPACE_MB,
            critical_space_mb: DEFAULT_CRITICAL_SPACE_MB,
            capture_timeout: Duration::from_secs(60 * CAPTURE_MINUTES_PER_RUN * runs as u64),
            upload_timeout: UPLOAD_TIMEOUT,
            network_wait: NETWORK_WAIT,
            params: ObservationParams {
                mode,
                ..Default::default()
            },
        }
    }
}

/// What a finished campaign reports back.
#[derive(Debug)]
pub struct CampaignSummary {
    pub runs_completed: u32,
    /// Artifacts confirmed uploaded (and therefore deleted locally).
    pub uploaded: Vec<PathBuf>,
}

pub struct CampaignOrchestrator<C, N, D, U> {
    config: CampaignConfig,
    capture: C,
    network: N,
    disk: D,
    uploader: U,
    heartbeat: Option<HeartbeatClient>,
    artifacts: Vec<PathBuf>,
}

impl<C, N, D, U> CampaignOrchestrator<C, N, D, U>
where
    C: CaptureTool,
    N: NetworkControl,
    D: DiskUsage,
    U: Uploader,
{
    pub fn new(
        config: CampaignConfig,
        capture: C,
        network: N,
        disk: D,
        uploader: U,
        heartbeat: Option<HeartbeatClient>,
    ) -> Self {
        Self {
            config,
            capture,
            network,
            disk,
            uploader,
            heartbeat,
            artifacts: Vec::new(),
        }
    }

    /// Artifacts produced so far. After a failed upload these are the
    /// files retained on disk for manual recovery.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Runs the whole campaign. However it ends, the network is restored
    /// one final time before control returns to the caller.
    pub fn run(&mut self) -> Result<CampaignSummary, CampaignError> {
        log::info!(
            "campaign '{}': {} {} run(s), capture timeout {}min",
            self.config.name,
            self.config.runs,
            self.config.params.mode,
            self.config.capture_timeout.as_secs() / 60,
        );
        if let Some(hb) = &self.heartbeat {
            log::info!("heartbeat enabled: {} -> {}", hb.node_id(), hb.backend_url());
        }
        self.send_heartbeat(0, None);

        let result = self.run_all();

        if self.config.isolate_network {
            self.network.restore();
            log::info!("final cleanup: network forced on");
        }
        result
    }

    fn run_all(&mut self) -> Result<CampaignSummary, CampaignError> {
        let total = self.config.runs;
        for run in 0..total {
            self.preflight()?;
            log::info!(
                "starting {} run {}/{}",
                self.config.params.mode,
                run + 1,
                total
            );

            match self.isolated_capture() {
                Ok(path) => {
                    let last = path.file_name().map(|f| f.to_string_lossy().into_owned());
                    self.artifacts.push(path);
                    // Heartbeat only once connectivity had a chance to
                    // come back.
                    self.network.wait_for_network(self.config.network_wait);
                    self.send_heartbeat(run + 1, last.as_deref());
                }
                Err(source) => {
                    log::error!("capture failed on run {}/{}: {}", run + 1, total, source);
                    self.emergency_upload();
                    return Err(CampaignError::Run {
                        run: run + 1,
                        total,
                        source,
                        retained: self.artifacts.clone(),
                    });
                }
            }

            if run + 1 < total {
                log::info!(
                    "pausing for {}s before next run",
                    self.config.pause.as_secs()
                );
                std::thread::sleep(self.config.pause);
            }
        }

        if self.artifacts.is_empty() {
            log::info!("no artifacts captured to upload");
            return Ok(CampaignSummary {
                runs_completed: total,
                uploaded: Vec::new(),
            });
        }

        log::info!(
            "all captures complete, starting batch upload of {} file(s)",
            self.artifacts.len()
        );
        self.network.wait_for_network(self.config.network_wait);
        if let Err(e) = self.uploader.upload_batch(self.config.upload_timeout) {
            log::error!(
                "upload failed, {} file(s) NOT deleted, retained in {}:",
                self.artifacts.len(),
                self.config.output_dir.display()
            );
            for path in &self.artifacts {
                log::error!("  - {}", path.display());
            }
            return Err(e.into());
        }

        log::info!("upload successful, cleaning up local files");
        let uploaded = self.cleanup();
        self.send_heartbeat(total, Some("batch_complete"));
        Ok(CampaignSummary {
            runs_completed: total,
            uploaded,
        })
    }

    /// Disk-space guard, evaluated before each run touches the radio or
    /// the disk.
    fn preflight(&self) -> Result<(), CampaignError> {
        let free_mb = self.disk.free_mb().map_err(CampaignError::Disk)?;
        log::info!("disk space: {} MB free", free_mb);
        if free_mb < self.config.critical_space_mb {
            log::error!(
                "critically low disk space (< {} MB), aborting",
                self.config.critical_space_mb
            );
            return Err(CampaignError::InsufficientResources {
                free_mb,
                critical_mb: self.config.critical_space_mb,
            });
        }
        if free_mb < self.config.low_space_mb {
            log::warn!("low disk space, only {} MB remaining", free_mb);
        }
        Ok(())
    }

    /// One capture session inside a radio-silence window. The restore is
    /// unconditional: it runs whether or not the session succeeded.
    fn isolated_capture(&mut self) -> Result<PathBuf, RunError> {
        if self.config.isolate_network {
            self.network.silence();
        } else {
            log::info!("radio silence skipped (disabled by configuration)");
        }

        let result = run_capture_session(
            &self.capture,
            &self.config.params,
            &self.config.raw_path,
            &self.config.output_dir,
            self.config.capture_timeout,
        );

        if self.config.isolate_network {
            self.network.restore();
        }
        result
    }

    /// Best-effort attempt to get already-produced artifacts off the node
    /// before an abort propagates. Never deletes anything.
    fn emergency_upload(&self) {
        if self.artifacts.is_empty() {
            return;
        }
        log::warn!(
            "attempting emergency upload of {} artifact(s)...",
            self.artifacts.len()
        );
        self.network.wait_for_network(self.config.network_wait);
        match self.uploader.upload_batch(self.config.upload_timeout) {
            Ok(()) => log::info!("emergency upload successful, local files kept"),
            Err(e) => {
                log::warn!("emergency upload failed: {}", e);
                for path in &self.artifacts {
                    log::warn!("  file remains: {}", path.display());
                }
            }
        }
    }

    /// Deletes uploaded artifacts. Only ever called after the uploader
    /// reported success for the whole batch.
    fn cleanup(&mut self) -> Vec<PathBuf> {
        let mut total_mb = 0u64;
        for path in &self.artifacts {
            let size_mb = fs::metadata(path).map(|m| m.len() / (1024 * 1024)).ok();
            match fs::remove_file(path) {
                Ok(()) => {
                    total_mb += size_mb.unwrap_or(0);
                    log::info!("  deleted: {}", path.display());
                }
                Err(e) => log::warn!("  could not delete {}: {}", path.display(), e),
            }
        }
        log::info!(
            "cleaned up {} file(s) ({} MB total)",
            self.artifacts.len(),
            total_mb
        );
        if let Ok(free_mb) = self.disk.free_mb() {
            log::info!("final disk space: {} MB free", free_mb);
        }
        std::mem::take(&mut self.artifacts)
    }

    fn send_heartbeat(&self, run_index: u32, last_capture: Option<&str>) {
        if let Some(hb) = &self.heartbeat {
            if let Err(e) = hb.send(Some(run_index), Some(self.config.runs), last_capture) {
                log::warn!("heartbeat error (non-fatal): {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ProcessError, UploadError};
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;

    /// Capture tool that writes a tiny zero-sample raw file, optionally
    /// failing on a chosen run.
    struct FakeCapture {
        calls: Rc<Cell<u32>>,
        fail_on_call: Option<u32>,
    }

    impl CaptureTool for FakeCapture {
        fn capture(
            &self,
            params: &ObservationParams,
            output: &Path,
            _timeout: Duration,
        ) -> Result<(), ProcessError> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on_call == Some(call) {
                return Err(ProcessError::Failed {
                    program: "airspy_rx".into(),
                    code: 1,
                    stderr: "device gone".into(),
                });
            }
            fs::write(output, vec![0u8; params.fft_size * 4]).map_err(|source| {
                ProcessError::Spawn {
                    program: "fake".into(),
                    source,
                }
            })
        }
    }

    #[derive(Clone)]
    struct FakeNetwork {
        silences: Rc<Cell<u32>>,
        restores: Rc<Cell<u32>>,
    }

    impl FakeNetwork {
        fn new() -> Self {
            Self {
                silences: Rc::new(Cell::new(0)),
                restores: Rc::new(Cell::new(0)),
            }
        }
    }

    impl NetworkControl for FakeNetwork {
        fn silence(&self) {
            self.silences.set(self.silences.get() + 1);
        }
        fn restore(&self) {
            self.restores.set(self.restores.get() + 1);
        }
        fn wait_for_network(&self, _max_wait: Duration) -> bool {
            true
        }
    }

    struct FakeDisk {
        free_mb: u64,
    }

    impl DiskUsage for FakeDisk {
        fn free_mb(&self) -> std::io::Result<u64> {
            Ok(self.free_mb)
        }
    }

    struct FakeUploader {
        calls: Rc<Cell<u32>>,
        succeed: bool,
    }

    impl Uploader for FakeUploader {
        fn upload_batch(&self, _timeout: Duration) -> Result<(), UploadError> {
            self.calls.set(self.calls.get() + 1);
            if self.succeed {
                Ok(())
            } else {
                Err(UploadError::Process(ProcessError::Failed {
                    program: "rclone".into(),
                    code: 1,
                    stderr: "quota".into(),
                }))
            }
        }
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hydroline_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_config(runs: u32, dir: &Path) -> CampaignConfig {
        let mut config = CampaignConfig::new(runs, Mode::On, dir.to_path_buf());
        // Artifact names carry second resolution; keep runs in distinct
        // seconds without the full inter-run pause.
        config.pause = Duration::from_millis(1100);
        config.network_wait = Duration::from_millis(10);
        config.params.fft_size = 16;
        config.params.sample_rate = 16_000;
        config
    }

    #[test]
    fn successful_campaign_uploads_then_deletes() {
        let dir = test_dir("campaign_ok");
        let upload_calls = Rc::new(Cell::new(0));
        let network = FakeNetwork::new();
        let mut orch = CampaignOrchestrator::new(
            test_config(2, &dir),
            FakeCapture {
                calls: Rc::new(Cell::new(0)),
                fail_on_call: None,
            },
            network.clone(),
            FakeDisk { free_mb: 50_000 },
            FakeUploader {
                calls: Rc::clone(&upload_calls),
                succeed: true,
            },
            None,
        );

        let summary = orch.run().unwrap();
        assert_eq!(summary.runs_completed, 2);
        assert_eq!(summary.uploaded.len(), 2);
        assert_eq!(upload_calls.get(), 1);
        // Deleted only after the confirmed upload.
        for path in &summary.uploaded {
            assert!(!path.exists());
        }
        // One isolation window per run plus the final forced restore.
        assert_eq!(network.silences.get(), 2);
        assert_eq!(network.restores.get(), 3);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_upload_retains_every_artifact() {
        let dir = test_dir("campaign_upload_fail");
        let upload_calls = Rc::new(Cell::new(0));
        let mut orch = CampaignOrchestrator::new(
            test_config(1, &dir),
            FakeCapture {
                calls: Rc::new(Cell::new(0)),
                fail_on_call: None,
            },
            FakeNetwork::new(),
            FakeDisk { free_mb: 50_000 },
            FakeUploader {
                calls: Rc::clone(&upload_calls),
                succeed: false,
            },
            None,
        );

        let err = orch.run().unwrap_err();
        assert!(matches!(err, CampaignError::Upload(_)));
        assert_eq!(upload_calls.get(), 1);
        assert_eq!(orch.artifacts().len(), 1);
        assert!(orch.artifacts()[0].exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn capture_failure_aborts_but_attempts_emergency_upload() {
        let dir = test_dir("campaign_capture_fail");
        let capture_calls = Rc::new(Cell::new(0));
        let upload_calls = Rc::new(Cell::new(0));
        let network = FakeNetwork::new();
        let mut orch = CampaignOrchestrator::new(
            test_config(3, &dir),
            FakeCapture {
                calls: Rc::clone(&capture_calls),
                fail_on_call: Some(2),
            },
            network.clone(),
            FakeDisk { free_mb: 50_000 },
            FakeUploader {
                calls: Rc::clone(&upload_calls),
                succeed: false,
            },
            None,
        );

        let err = orch.run().unwrap_err();
        match err {
            CampaignError::Run { run, total, retained, .. } => {
                assert_eq!(run, 2);
                assert_eq!(total, 3);
                assert_eq!(retained.len(), 1);
                // Emergency upload failed too; nothing may be deleted.
                assert!(retained[0].exists());
            }
            other => panic!("unexpected error: {other}"),
        }
        // Run 3 never started.
        assert_eq!(capture_calls.get(), 2);
        assert_eq!(upload_calls.get(), 1);
        // Both isolation windows closed, plus the final forced restore.
        assert_eq!(network.restores.get(), 3);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn critical_disk_space_aborts_before_any_capture() {
        let dir = test_dir("campaign_disk");
        let capture_calls = Rc::new(Cell::new(0));
        let network = FakeNetwork::new();
        let mut orch = CampaignOrchestrator::new(
            test_config(1, &dir),
            FakeCapture {
                calls: Rc::clone(&capture_calls),
                fail_on_call: None,
            },
            network.clone(),
            FakeDisk { free_mb: 400 },
            FakeUploader {
                calls: Rc::new(Cell::new(0)),
                succeed: true,
            },
            None,
        );

        let err = orch.run().unwrap_err();
        assert!(matches!(
            err,
            CampaignError::InsufficientResources { free_mb: 400, .. }
        ));
        assert_eq!(capture_calls.get(), 0);
        assert_eq!(network.silences.get(), 0);
        // The abort path still forces the network on once.
        assert_eq!(network.restores.get(), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn isolation_can_be_disabled() {
        let dir = test_dir("campaign_no_isolation");
        let network = FakeNetwork::new();
        let mut config = test_config(1, &dir);
        config.isolate_network = false;
        let mut orch = CampaignOrchestrator::new(
            config,
            FakeCapture {
                calls: Rc::new(Cell::new(0)),
                fail_on_call: None,
            },
            network.clone(),
            FakeDisk { free_mb: 50_000 },
            FakeUploader {
                calls: Rc::new(Cell::new(0)),
                succeed: true,
            },
            None,
        );

        orch.run().unwrap();
        assert_eq!(network.silences.get(), 0);
        assert_eq!(network.restores.get(), 0);
        let _ = fs::remove_dir_all(&dir);
    }
}
