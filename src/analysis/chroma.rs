//! Pitch-class energy extraction
//!
//! Folds a Hann-windowed FFT magnitude spectrum onto the 12 pitch classes,
//! producing one chroma vector per analysis frame. Shared building block
//! for key estimation and chord detection.

use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;

/// FFT frame size; 4096 at 44.1kHz resolves ~10.8 Hz per bin, enough to
/// separate adjacent semitones down to C2
const FRAME_SIZE: usize = 4096;

/// Lowest folded frequency (C1)
const FMIN_HZ: f32 = 32.7;

/// Highest folded frequency; bins above this carry mostly noise and
/// percussive energy rather than pitch
const FMAX_HZ: f32 = 8000.0;

/// 12 pitch-class energies per frame with parallel frame times
#[derive(Debug, Clone)]
pub struct Chromagram {
    /// One 12-element energy vector per frame, each scaled to [0, 1]
    pub frames: Vec<[f32; 12]>,
    /// Frame times in seconds, ascending
    pub frame_times: Vec<f32>,
}

impl Chromagram {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Average chroma vector across all frames (zeros when empty)
    pub fn mean(&self) -> [f32; 12] {
        let mut mean = [0.0f32; 12];
        if self.frames.is_empty() {
            return mean;
        }
        for frame in &self.frames {
            for (m, v) in mean.iter_mut().zip(frame.iter()) {
                *m += v;
            }
        }
        let scale = 1.0 / self.frames.len() as f32;
        for m in mean.iter_mut() {
            *m *= scale;
        }
        mean
    }
}

/// Compute a chromagram over `samples` with the given hop length
///
/// Deterministic for identical input and hop length.
pub fn chroma(samples: &[f32], sample_rate: u32, hop_length: usize) -> Chromagram {
    let hop = hop_length.max(1);
    if samples.is_empty() || sample_rate == 0 {
        return Chromagram {
            frames: vec![],
            frame_times: vec![],
        };
    }

    let num_frames = samples.len().saturating_sub(FRAME_SIZE) / hop + 1;
    debug!(
        "extracting chroma: {} samples, hop {}, {} frames",
        samples.len(),
        hop,
        num_frames
    );

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);
    let window = hann_window(FRAME_SIZE);
    let bin_classes = bin_pitch_classes(sample_rate);

    let mut frames = Vec::with_capacity(num_frames);
    let mut frame_times = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        let len = FRAME_SIZE.min(samples.len() - start);

        let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); FRAME_SIZE];
        for (i, &w) in window.iter().enumerate().take(len) {
            buffer[i] = Complex::new(samples[start + i] * w, 0.0);
        }

        fft.process(&mut buffer);

        let mut energies = [0.0f32; 12];
        for (bin, class) in bin_classes.iter().enumerate() {
            if let Some(class) = class {
                energies[*class] += buffer[bin].norm_sqr();
            }
        }

        // Scale each frame to [0, 1] so template scores are comparable
        // across frames of different loudness
        let max = energies.iter().cloned().fold(0.0f32, f32::max);
        if max > 0.0 {
            for e in energies.iter_mut() {
                *e /= max;
            }
        }

        frames.push(energies);
        frame_times.push(start as f32 / sample_rate as f32);
    }

    Chromagram {
        frames,
        frame_times,
    }
}

/// Map every FFT bin to its nearest pitch class, or None outside the folded
/// frequency range
fn bin_pitch_classes(sample_rate: u32) -> Vec<Option<usize>> {
    let bin_hz = sample_rate as f32 / FRAME_SIZE as f32;
    (0..FRAME_SIZE / 2 + 1)
        .map(|bin| {
            let freq = bin as f32 * bin_hz;
            if freq < FMIN_HZ || freq > FMAX_HZ {
                return None;
            }
            let midi = 69.0 + 12.0 * (freq / 440.0).log2();
            Some((midi.round() as i32).rem_euclid(12) as usize)
        })
        .collect()
}

pub(crate) fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
        let n = (seconds * sample_rate as f32) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_pure_tone_concentrates_on_its_pitch_class() {
        let samples = tone(440.0, 1.0, 44100);
        let result = chroma(&samples, 44100, 512);

        let mean = result.mean();
        let best = mean
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, 9, "440 Hz should fold onto pitch class A");
    }

    #[test]
    fn test_major_chord_activates_triad_classes() {
        let sample_rate = 44100;
        let c4 = tone(261.63, 1.0, sample_rate);
        let e4 = tone(329.63, 1.0, sample_rate);
        let g4 = tone(392.00, 1.0, sample_rate);
        let signal: Vec<f32> = c4
            .iter()
            .zip(e4.iter())
            .zip(g4.iter())
            .map(|((c, e), g)| (c + e + g) / 3.0)
            .collect();

        let result = chroma(&signal, sample_rate, 2048);
        let mean = result.mean();

        let mut ranked: Vec<usize> = (0..12).collect();
        ranked.sort_by(|&a, &b| mean[b].partial_cmp(&mean[a]).unwrap());
        let top3 = &ranked[..3];
        assert!(top3.contains(&0), "C missing from top classes: {:?}", top3);
        assert!(top3.contains(&4), "E missing from top classes: {:?}", top3);
        assert!(top3.contains(&7), "G missing from top classes: {:?}", top3);
    }

    #[test]
    fn test_frame_times_parallel_and_ascending() {
        let samples = tone(220.0, 2.0, 44100);
        let result = chroma(&samples, 44100, 1024);

        assert_eq!(result.frames.len(), result.frame_times.len());
        assert!(!result.is_empty());
        assert!(result
            .frame_times
            .windows(2)
            .all(|w| w[0] < w[1]));
        assert!((result.frame_times[0]).abs() < 1e-9);
    }

    #[test]
    fn test_silence_yields_zero_frames() {
        let samples = vec![0.0f32; 44100];
        let result = chroma(&samples, 44100, 2048);

        assert!(!result.is_empty());
        for frame in &result.frames {
            assert!(frame.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_values_bounded() {
        let samples = tone(330.0, 1.0, 44100);
        let result = chroma(&samples, 44100, 512);
        for frame in &result.frames {
            assert!(frame.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_empty_input() {
        let result = chroma(&[], 44100, 512);
        assert!(result.is_empty());
        assert!(result.frame_times.is_empty());
        assert_eq!(result.mean(), [0.0f32; 12]);
    }
}
