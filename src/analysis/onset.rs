//! Spectral-flux onset strength envelope
//!
//! Half-wave rectified frame-to-frame increase in FFT magnitude; feeds the
//! tempo estimator.

use crate::analysis::chroma::hann_window;
use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;

/// FFT frame size for onset analysis
pub const FRAME_SIZE: usize = 2048;

/// Hop between onset frames
pub const HOP_LENGTH: usize = 512;

/// Onset strength per frame, scaled to a maximum of 1
#[derive(Debug, Clone)]
pub struct OnsetEnvelope {
    pub strength: Vec<f32>,
    /// Envelope frames per second
    pub frame_rate: f32,
}

/// Compute the onset strength envelope of a mono signal
pub fn onset_envelope(samples: &[f32], sample_rate: u32) -> OnsetEnvelope {
    let frame_rate = if sample_rate == 0 {
        0.0
    } else {
        sample_rate as f32 / HOP_LENGTH as f32
    };

    if samples.is_empty() || sample_rate == 0 {
        return OnsetEnvelope {
            strength: vec![],
            frame_rate,
        };
    }

    let num_frames = samples.len().saturating_sub(FRAME_SIZE) / HOP_LENGTH + 1;
    debug!(
        "onset envelope: {} samples, {} frames",
        samples.len(),
        num_frames
    );

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);
    let window = hann_window(FRAME_SIZE);

    let mut prev_mags: Option<Vec<f32>> = None;
    let mut strength = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * HOP_LENGTH;
        let len = FRAME_SIZE.min(samples.len() - start);

        let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); FRAME_SIZE];
        for (i, &w) in window.iter().enumerate().take(len) {
            buffer[i] = Complex::new(samples[start + i] * w, 0.0);
        }

        fft.process(&mut buffer);

        let mags: Vec<f32> = buffer[..FRAME_SIZE / 2 + 1]
            .iter()
            .map(|c| c.norm())
            .collect();

        // Only rising magnitude counts as onset energy
        let flux = match prev_mags.as_ref() {
            Some(prev) => mags
                .iter()
                .zip(prev.iter())
                .map(|(m, p)| (m - p).max(0.0))
                .sum::<f32>(),
            None => 0.0,
        };

        strength.push(flux);
        prev_mags = Some(mags);
    }

    let max = strength.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for s in strength.iter_mut() {
            *s /= max;
        }
    }

    OnsetEnvelope {
        strength,
        frame_rate,
    }
}
