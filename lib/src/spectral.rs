//! Streaming spectral averaging
//!
//! The capture tool leaves behind a raw file of interleaved little-endian
//! 16-bit I/Q samples. This module reduces that stream, one FFT frame at a
//! time, into an averaged power spectrum: deinterleave, remove the DC
//! offset, apply a Hann window, transform, and accumulate `|X|²` per bin.
//! Blocks are accumulated strictly in read order, so the same stream always
//! produces the same spectrum.

use ndarray::Array1;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::errors::SpectralError;

/// FFT window size used for hydrogen-line observations.
pub const DEFAULT_FFT_SIZE: usize = 8192;

/// Accumulates the averaged power spectrum of a raw I/Q sample stream.
pub struct SpectralAccumulator {
    fft_size: usize,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    buf: Vec<Complex64>,
    scratch: Vec<Complex64>,
    accum: Array1<f64>,
    frames: u32,
}

impl SpectralAccumulator {
    pub fn new(fft_size: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex64::default(); fft.get_inplace_scratch_len()];
        Self {
            fft_size,
            fft,
            window: hann_window(fft_size),
            buf: vec![Complex64::default(); fft_size],
            scratch,
            accum: Array1::zeros(fft_size),
            frames: 0,
        }
    }

    /// Bytes in one full complex frame: `fft_size` I/Q pairs of two i16 each.
    pub fn frame_bytes(&self) -> usize {
        self.fft_size * 4
    }

    /// Number of frames accumulated so far.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Folds one raw block into the accumulator.
    ///
    /// Returns `Ok(true)` if a full frame was consumed. A block shorter than
    /// one frame signals end-of-stream and is ignored (`Ok(false)`); the
    /// frame count is unaffected. A block that is long enough but not a
    /// whole number of I/Q pairs is structurally invalid.
    pub fn accumulate(&mut self, raw: &[u8]) -> Result<bool, SpectralError> {
        if raw.len() < self.frame_bytes() {
            return Ok(false);
        }
        if raw.len() % 4 != 0 {
            return Err(SpectralError::MalformedInput { len: raw.len() });
        }

        // Deinterleave and widen. Only the first frame of the block is used.
        for (cell, pair) in self.buf.iter_mut().zip(raw.chunks_exact(4)) {
            let i = i16::from_le_bytes([pair[0], pair[1]]);
            let q = i16::from_le_bytes([pair[2], pair[3]]);
            *cell = Complex64::new(i as f64, q as f64);
        }

        // DC offset removal (important)
        let mean = self.buf.iter().sum::<Complex64>() / self.fft_size as f64;
        for (cell, w) in self.buf.iter_mut().zip(&self.window) {
            *cell = (*cell - mean) * w;
        }

        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);

        // Accumulate zero-centered: bin 0 of the output is the most
        // negative frequency offset.
        let half = self.fft_size / 2;
        for i in 0..self.fft_size {
            self.accum[i] += self.buf[(i + half) % self.fft_size].norm_sqr();
        }
        self.frames += 1;
        Ok(true)
    }

    /// Divides the accumulator by the frame count, yielding the averaged
    /// power spectrum. Zero frames yield an all-zero spectrum: a degenerate
    /// but valid observation.
    pub fn finalize(self) -> Array1<f64> {
        let divisor = self.frames.max(1) as f64;
        self.accum.mapv_into(|v| v / divisor)
    }
}

/// Zero-centered frequency offsets (Hz) for each spectrum bin.
pub fn frequency_axis(fft_size: usize, sample_rate: u32) -> Array1<f64> {
    let step = sample_rate as f64 / fft_size as f64;
    let half = (fft_size / 2) as isize;
    Array1::from_iter((0..fft_size).map(|i| (i as isize - half) as f64 * step))
}

/// Symmetric raised-cosine (Hann) window.
fn hann_window(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}
