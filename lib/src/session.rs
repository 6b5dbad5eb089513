//! One capture-and-reduce cycle
//!
//! A session drives `Capturing → Reducing → Finalizing → Complete`: invoke
//! the external SDR capture tool, stream the raw file through the spectral
//! accumulator, derive statistics, persist the artifact, and only then
//! delete the raw intermediate. On a persistence failure the raw file is
//! kept so no data is silently lost.

use chrono::Utc;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::artifact::{artifact_filename, Mode, ObservationArtifact, ObservationMetadata};
use crate::errors::{ProcessError, RunError};
use crate::persistence;
use crate::process::ProcessRunner;
use crate::spectral::{frequency_axis, SpectralAccumulator, DEFAULT_FFT_SIZE};
use crate::stats::SpectrumStatistics;

/// Parameters of one observation, fixed before capture starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationParams {
    /// Target center frequency in MHz.
    pub freq_mhz: f64,
    pub sample_rate: u32,
    pub sample_count: u64,
    pub fft_size: usize,
    pub lna_gain: u8,
    pub mix_gain: u8,
    pub vga_gain: u8,
    pub mode: Mode,
}

impl Default for ObservationParams {
    /// Airspy Mini hydrogen-line defaults: 3 MSPS, ~33 s of data, LNA gain
    /// left at 0 because the front-end filter already amplifies.
    fn default() -> Self {
        Self {
            freq_mhz: 1420.405751,
            sample_rate: 3_000_000,
            sample_count: 100_000_000,
            fft_size: DEFAULT_FFT_SIZE,
            lna_gain: 0,
            mix_gain: 5,
            vga_gain: 6,
            mode: Mode::On,
        }
    }
}

impl ObservationParams {
    /// Target frequency in Hz, for statistics against the axis.
    pub fn freq_hz(&self) -> f64 {
        self.freq_mhz * 1e6
    }
}

/// The external SDR capture collaborator: writes a raw interleaved i16 I/Q
/// file at `output` and reports success through its exit status.
pub trait CaptureTool {
    fn capture(
        &self,
        params: &ObservationParams,
        output: &Path,
        timeout: Duration,
    ) -> Result<(), ProcessError>;
}

/// Production capture via the `airspy_rx` command-line tool.
pub struct AirspyRx<R: ProcessRunner> {
    runner: R,
}

impl<R: ProcessRunner> AirspyRx<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: ProcessRunner> CaptureTool for AirspyRx<R> {
    fn capture(
        &self,
        params: &ObservationParams,
        output: &Path,
        timeout: Duration,
    ) -> Result<(), ProcessError> {
        let args = vec![
            "-b1".to_owned(),
            "-l".to_owned(),
            params.lna_gain.to_string(),
            "-m".to_owned(),
            params.mix_gain.to_string(),
            "-v".to_owned(),
            params.vga_gain.to_string(),
            "-f".to_owned(),
            params.freq_mhz.to_string(),
            "-a".to_owned(),
            params.sample_rate.to_string(),
            "-n".to_owned(),
            params.sample_count.to_string(),
            "-r".to_owned(),
            output.to_string_lossy().into_owned(),
        ];
        self.runner.run_checked("airspy_rx", &args, timeout)?;
        Ok(())
    }
}

/// Runs one full session and returns the path of the artifact it produced.
///
/// The artifact's timestamp (and thereby its identity) is fixed here, at
/// capture start.
pub fn run_capture_session<C: CaptureTool>(
    tool: &C,
    params: &ObservationParams,
    raw_path: &Path,
    output_dir: &Path,
    capture_timeout: Duration,
) -> Result<PathBuf, RunError> {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();

    log::info!(
        "capturing {} MHz at {} MSPS, {} samples, gains l={} m={} v={}",
        params.freq_mhz,
        params.sample_rate as f64 / 1e6,
        params.sample_count,
        params.lna_gain,
        params.mix_gain,
        params.vga_gain,
    );
    if let Err(e) = tool.capture(params, raw_path, capture_timeout) {
        // A partial raw file from a failed capture is not trusted.
        if raw_path.exists() {
            let _ = fs::remove_file(raw_path);
        }
        return Err(RunError::Capture(e));
    }

    log::info!("reducing {}", raw_path.display());
    let mut acc = SpectralAccumulator::new(params.fft_size);
    let mut reader = BufReader::new(File::open(raw_path)?);
    let mut frame = vec![0u8; acc.frame_bytes()];
    loop {
        let n = read_full(&mut reader, &mut frame)?;
        if !acc.accumulate(&frame[..n])? {
            break;
        }
    }
    log::info!("averaged {} FFT windows", acc.frames());

    let averaging_windows = acc.frames();
    let spectrum = acc.finalize();
    let freq_axis = frequency_axis(params.fft_size, params.sample_rate);
    let stats = SpectrumStatistics::compute(&spectrum, &freq_axis, params.freq_hz());
    log::info!(
        "peak {:.1} dB, noise floor {:.1} dB, SNR {:.1} dB, RFI {:.1}%",
        stats.peak_power_db,
        stats.noise_floor_db,
        stats.snr_db,
        stats.rfi_percentage,
    );

    let artifact = ObservationArtifact {
        metadata: ObservationMetadata {
            timestamp: timestamp.clone(),
            mode: params.mode,
            freq_mhz: params.freq_mhz,
            sample_rate: params.sample_rate,
            fft_size: params.fft_size as u32,
            averaging_windows,
            lna_gain: params.lna_gain,
            mix_gain: params.mix_gain,
            vga_gain: params.vga_gain,
        },
        spectrum,
        freq_axis,
        stats,
    };

    let artifact_path = output_dir.join(artifact_filename(&timestamp));
    if let Err(e) = persistence::write_artifact(&artifact_path, &artifact) {
        log::error!(
            "artifact write failed, raw capture kept at {}",
            raw_path.display()
        );
        return Err(RunError::Persist(e));
    }

    // Confirmed written: the raw intermediate can go.
    fs::remove_file(raw_path)?;
    log::info!("capture produced {}", artifact_path.display());
    Ok(artifact_path)
}

/// Reads until `buf` is full or the stream ends; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::read_artifact;
    use std::cell::Cell;

    /// Capture tool that writes a fixed number of zero frames plus an
    /// optional partial trailing frame.
    struct FakeCapture {
        frames: usize,
        trailing_bytes: usize,
        fail: bool,
        calls: Cell<u32>,
    }

    impl CaptureTool for FakeCapture {
        fn capture(
            &self,
            params: &ObservationParams,
            output: &Path,
            _timeout: Duration,
        ) -> Result<(), ProcessError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(ProcessError::Failed {
                    program: "airspy_rx".into(),
                    code: 1,
                    stderr: "no device".into(),
                });
            }
            let data = vec![0u8; params.fft_size * 4 * self.frames + self.trailing_bytes];
            fs::write(output, data).map_err(|source| ProcessError::Spawn {
                program: "fake".into(),
                source,
            })
        }
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hydroline_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn small_params() -> ObservationParams {
        ObservationParams {
            fft_size: 16,
            sample_rate: 16_000,
            sample_count: 64,
            ..Default::default()
        }
    }

    #[test]
    fn session_produces_artifact_and_deletes_raw() {
        let dir = test_dir("session_ok");
        let raw = dir.join("capture.bin");
        let tool = FakeCapture {
            frames: 3,
            trailing_bytes: 6,
            fail: false,
            calls: Cell::new(0),
        };

        let artifact_path =
            run_capture_session(&tool, &small_params(), &raw, &dir, Duration::from_secs(5))
                .unwrap();

        assert!(artifact_path.exists());
        assert!(!raw.exists());

        // Whole frames were averaged, the partial trailing frame ignored.
        let artifact = read_artifact(&artifact_path).unwrap();
        assert_eq!(artifact.metadata.averaging_windows, 3);
        assert_eq!(artifact.metadata.fft_size, 16);
        assert!(artifact.spectrum.iter().all(|&v| v == 0.0));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_capture_discards_partial_raw_file() {
        let dir = test_dir("session_capfail");
        let raw = dir.join("capture.bin");
        // A stale partial file from the failed tool must not survive.
        fs::write(&raw, b"partial").unwrap();
        let tool = FakeCapture {
            frames: 0,
            trailing_bytes: 0,
            fail: true,
            calls: Cell::new(0),
        };

        let err =
            run_capture_session(&tool, &small_params(), &raw, &dir, Duration::from_secs(5))
                .unwrap_err();
        assert!(matches!(err, RunError::Capture(_)));
        assert!(!raw.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn persist_failure_retains_raw_file() {
        let dir = test_dir("session_persistfail");
        let raw = dir.join("capture.bin");
        let tool = FakeCapture {
            frames: 1,
            trailing_bytes: 0,
            fail: false,
            calls: Cell::new(0),
        };

        // Output "directory" is an existing file, so the artifact write
        // must fail and the raw capture must survive.
        let bogus_dir = dir.join("not_a_dir");
        fs::write(&bogus_dir, b"").unwrap();
        let err = run_capture_session(
            &tool,
            &small_params(),
            &raw,
            &bogus_dir,
            Duration::from_secs(5),
        )
        .unwrap_err();

        assert!(matches!(err, RunError::Persist(_)));
        assert!(raw.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn airspy_invocation_matches_tool_contract() {
        use crate::process::{ProcessOutput, ProcessRunner};
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Recorder {
            seen: Rc<RefCell<Vec<(String, Vec<String>)>>>,
        }
        impl ProcessRunner for Recorder {
            fn run(
                &self,
                program: &str,
                args: &[String],
                _timeout: Duration,
            ) -> Result<ProcessOutput, ProcessError> {
                self.seen
                    .borrow_mut()
                    .push((program.to_owned(), args.to_vec()));
                Ok(ProcessOutput {
                    code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }

        let seen = Rc::new(RefCell::new(Vec::new()));
        let tool = AirspyRx::new(Recorder { seen: Rc::clone(&seen) });
        tool.capture(
            &ObservationParams::default(),
            Path::new("capture.bin"),
            Duration::from_secs(1),
        )
        .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen[0].0, "airspy_rx");
        assert_eq!(
            seen[0].1,
            vec![
                "-b1", "-l", "0", "-m", "5", "-v", "6", "-f", "1420.405751", "-a", "3000000",
                "-n", "100000000", "-r", "capture.bin"
            ]
        );
    }
}
