//! Signal-quality statistics derived from a finished averaged spectrum.

use ndarray::Array1;

/// Rest-frame hydrogen line frequency in Hz.
pub const HYDROGEN_LINE_HZ: f64 = 1_420_405_751.0;
/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Guard against log10(0) on all-zero spectra.
const POWER_FLOOR: f64 = 1e-10;
/// Linear power ratio corresponding to the 10 dB RFI detection threshold.
const RFI_THRESHOLD_RATIO: f64 = 10.0;

/// Quality metrics of one averaged power spectrum.
///
/// Every field is descriptive; extreme values (SNR near zero, 100 % RFI)
/// are valid, reportable states, not failures.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumStatistics {
    pub peak_power_db: f64,
    /// 25th-percentile estimator, robust against a strong narrowband peak.
    pub noise_floor_db: f64,
    pub median_power_db: f64,
    pub snr_db: f64,
    pub peak_frequency_hz: f64,
    /// Offset of the peak from the target line, in kHz.
    pub hydrogen_offset_khz: f64,
    /// Non-relativistic Doppler velocity implied by the offset.
    pub radial_velocity_km_s: f64,
    /// Percentage of bins more than 10 dB above the noise floor.
    pub rfi_percentage: f64,
}

/// Qualitative RFI contamination bands used in operator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfiAssessment {
    /// < 5 % of bins above threshold
    Clean,
    /// 5–15 %
    Moderate,
    /// > 15 %, consider re-observation
    High,
}

/// Qualitative SNR bands used in operator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnrAssessment {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SpectrumStatistics {
    /// Derives all metrics from an averaged spectrum, its frequency axis and
    /// the target line frequency. Pure; tolerates degenerate flat spectra.
    pub fn compute(spectrum: &Array1<f64>, freq_axis: &Array1<f64>, target_hz: f64) -> Self {
        let mut sorted: Vec<f64> = spectrum.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let (peak_idx, peak_power) = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, &v)| (i, v))
            .unwrap_or((0, 0.0));

        let noise_floor = percentile(&sorted, 25.0);
        let median_power = percentile(&sorted, 50.0);

        let peak_power_db = to_db(peak_power);
        let noise_floor_db = to_db(noise_floor);
        let median_power_db = to_db(median_power);

        let peak_frequency_hz = freq_axis.get(peak_idx).copied().unwrap_or(0.0);
        let hydrogen_offset_khz = (peak_frequency_hz - target_hz) / 1000.0;

        let rfi_threshold = noise_floor * RFI_THRESHOLD_RATIO;
        let strong_bins = spectrum.iter().filter(|&&v| v > rfi_threshold).count();
        let rfi_percentage = strong_bins as f64 / spectrum.len().max(1) as f64 * 100.0;

        Self {
            peak_power_db,
            noise_floor_db,
            median_power_db,
            snr_db: peak_power_db - noise_floor_db,
            peak_frequency_hz,
            hydrogen_offset_khz,
            radial_velocity_km_s: radial_velocity_km_s(hydrogen_offset_khz),
            rfi_percentage,
        }
    }

    pub fn rfi_assessment(&self) -> RfiAssessment {
        if self.rfi_percentage < 5.0 {
            RfiAssessment::Clean
        } else if self.rfi_percentage < 15.0 {
            RfiAssessment::Moderate
        } else {
            RfiAssessment::High
        }
    }

    pub fn snr_assessment(&self) -> SnrAssessment {
        if self.snr_db > 10.0 {
            SnrAssessment::Excellent
        } else if self.snr_db > 5.0 {
            SnrAssessment::Good
        } else if self.snr_db > 3.0 {
            SnrAssessment::Fair
        } else {
            SnrAssessment::Poor
        }
    }
}

/// Doppler velocity (km/s) for a line offset given in kHz.
pub fn radial_velocity_km_s(offset_khz: f64) -> f64 {
    offset_khz / (HYDROGEN_LINE_HZ / 1000.0) * SPEED_OF_LIGHT_KM_S
}

fn to_db(power: f64) -> f64 {
    10.0 * (power + POWER_FLOOR).log10()
}

/// Percentile with linear interpolation over a pre-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
}

impl std::fmt::Display for RfiAssessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RfiAssessment::Clean => write!(f, "clean (< 5%)"),
            RfiAssessment::Moderate => write!(f, "moderate (5-15%)"),
            RfiAssessment::High => write!(f, "high (> 15%) - consider re-observation"),
        }
    }
}

impl std::fmt::Display for SnrAssessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnrAssessment::Poor => write!(f, "poor"),
            SnrAssessment::Fair => write!(f, "fair"),
            SnrAssessment::Good => write!(f, "good"),
            SnrAssessment::Excellent => write!(f, "excellent"),
        }
    }
}
