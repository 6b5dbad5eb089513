//! Observation artifact: the single file a completed capture leaves behind.

use ndarray::Array1;

use crate::stats::SpectrumStatistics;

/// File extension of serialized artifacts. The upload collaborator selects
/// files by this extension.
pub const ARTIFACT_EXTENSION: &str = "parquet";

/// Antenna pointing mode of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Antenna pointed at the source.
    On,
    /// Antenna pointed at a reference position.
    Off,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::On => "on",
            Mode::Off => "off",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" => Ok(Mode::On),
            "off" => Ok(Mode::Off),
            _ => Err(format!("invalid mode: {} (expected 'on' or 'off')", s)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of the conditions of one capture, created at capture
/// start and embedded verbatim into the artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationMetadata {
    /// UTC capture-start timestamp, `YYYYMMDD_HHMMSS`. Doubles as the
    /// artifact's identity via [`artifact_filename`].
    pub timestamp: String,
    pub mode: Mode,
    /// Target center frequency in MHz.
    pub freq_mhz: f64,
    pub sample_rate: u32,
    pub fft_size: u32,
    /// Number of FFT frames averaged into the spectrum.
    pub averaging_windows: u32,
    pub lna_gain: u8,
    pub mix_gain: u8,
    pub vga_gain: u8,
}

/// Everything a completed observation produces: metadata, the averaged
/// spectrum with its frequency axis, and the derived quality statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationArtifact {
    pub metadata: ObservationMetadata,
    pub spectrum: Array1<f64>,
    pub freq_axis: Array1<f64>,
    pub stats: SpectrumStatistics,
}

/// Canonical artifact file name for a capture-start timestamp.
pub fn artifact_filename(timestamp: &str) -> String {
    format!("spectrum_{}.{}", timestamp, ARTIFACT_EXTENSION)
}
