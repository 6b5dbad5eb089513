use hydroline_lib::{read_artifact, Mode};
use std::error::Error;

use crate::cli::AnalyzeArgs;

/// Read-only report over a stored artifact, for quick checks from a shell.
pub fn run(args: AnalyzeArgs) -> Result<(), Box<dyn Error>> {
    let artifact = read_artifact(&args.file)?;
    let meta = &artifact.metadata;
    let stats = &artifact.stats;

    println!("analysis of {}", args.file.display());
    println!();
    println!("observation:");
    println!("  timestamp:       {}", meta.timestamp);
    println!(
        "  mode:            {} (antenna {} source)",
        meta.mode,
        if meta.mode == Mode::On { "ON" } else { "OFF" }
    );
    println!("  sample rate:     {:.1} MSPS", meta.sample_rate as f64 / 1e6);
    println!("  fft size:        {}", meta.fft_size);
    println!("  fft windows:     {}", meta.averaging_windows);
    println!();
    println!("hardware settings:");
    println!("  lna gain:        {} dB", meta.lna_gain);
    println!("  mixer gain:      {} dB", meta.mix_gain);
    println!("  vga gain:        {} dB", meta.vga_gain);
    println!();
    println!("signal quality:");
    println!("  peak power:      {:.1} dB", stats.peak_power_db);
    println!("  noise floor:     {:.1} dB (25th percentile)", stats.noise_floor_db);
    println!("  median power:    {:.1} dB", stats.median_power_db);
    println!(
        "  snr:             {:.1} dB ({})",
        stats.snr_db,
        stats.snr_assessment()
    );
    println!();
    println!("frequency analysis:");
    println!(
        "  peak at:         {:.6} MHz offset",
        stats.peak_frequency_hz / 1e6
    );
    println!("  target line:     {:.6} MHz", meta.freq_mhz);
    println!("  doppler shift:   {:+.2} kHz", stats.hydrogen_offset_khz);
    println!(
        "  radial velocity: {:+.1} km/s ({})",
        stats.radial_velocity_km_s,
        velocity_interpretation(stats.radial_velocity_km_s)
    );
    println!();
    println!("rfi assessment:");
    println!(
        "  {:.1}% bins >10dB above noise floor: {}",
        stats.rfi_percentage,
        stats.rfi_assessment()
    );
    println!();
    println!(
        "spectrum: {} bins spanning {:.1} kHz to {:+.1} kHz",
        artifact.spectrum.len(),
        artifact.freq_axis.first().copied().unwrap_or(0.0) / 1e3,
        artifact.freq_axis.last().copied().unwrap_or(0.0) / 1e3,
    );
    Ok(())
}

fn velocity_interpretation(v_km_s: f64) -> &'static str {
    if v_km_s.abs() < 50.0 {
        "low velocity - local hydrogen or Earth motion"
    } else if v_km_s.abs() < 200.0 {
        "galactic hydrogen"
    } else {
        "high velocity - galactic rotation or unusual source"
    }
}
