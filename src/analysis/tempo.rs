//! Tempo estimation and beat placement
//!
//! Autocorrelates the onset envelope over a musically plausible lag range,
//! then lays a beat grid at the phase that collects the most onset energy.

use crate::analysis::onset::{self, OnsetEnvelope};
use crate::types::TempoEstimate;
use tracing::debug;

/// Slowest tempo considered (BPM)
const MIN_TEMPO: f32 = 60.0;

/// Fastest tempo considered (BPM)
const MAX_TEMPO: f32 = 200.0;

/// Estimate tempo and beat positions from a mono signal
///
/// Silence (no onset energy) yields a tempo of 0 and an empty beat grid.
pub fn estimate_tempo(samples: &[f32], sample_rate: u32) -> TempoEstimate {
    let envelope = onset::onset_envelope(samples, sample_rate);
    estimate_from_envelope(&envelope, sample_rate)
}

fn estimate_from_envelope(envelope: &OnsetEnvelope, sample_rate: u32) -> TempoEstimate {
    let silent = TempoEstimate {
        tempo_bpm: 0.0,
        beat_times: vec![],
    };
    if sample_rate == 0 {
        return silent;
    }

    let strength = &envelope.strength;
    if strength.iter().all(|&s| s <= 0.0) {
        debug!("no onset energy, reporting zero tempo");
        return silent;
    }

    let frame_rate = envelope.frame_rate;
    let lag_min = ((60.0 * frame_rate / MAX_TEMPO).round() as usize).max(1);
    let lag_max = ((60.0 * frame_rate / MIN_TEMPO).round() as usize)
        .min(strength.len().saturating_sub(1));
    if lag_min > lag_max {
        return silent;
    }

    // Biased autocorrelation: the raw sum shrinks as the lag grows, which
    // breaks exact ties between a period and its multiples in favor of the
    // shorter period
    let autocorr: Vec<f32> = (lag_min..=lag_max)
        .map(|lag| {
            strength[lag..]
                .iter()
                .zip(strength.iter())
                .map(|(a, b)| a * b)
                .sum::<f32>()
        })
        .collect();

    let mut best_idx = None;
    let mut best_value = 0.0f32;
    for (i, &value) in autocorr.iter().enumerate() {
        if value > best_value {
            best_value = value;
            best_idx = Some(i);
        }
    }
    let Some(best_idx) = best_idx else {
        return silent;
    };

    let period = lag_min + best_idx;
    let refined_lag = refine_peak(&autocorr, best_idx) + lag_min as f32;
    let tempo_bpm = (60.0 * frame_rate / refined_lag) as f64;

    let beat_times = place_beats(strength, period)
        .into_iter()
        .map(|f| f as f64 * onset::HOP_LENGTH as f64 / sample_rate as f64)
        .collect();

    debug!("estimated tempo {:.1} BPM (lag {} frames)", tempo_bpm, period);

    TempoEstimate {
        tempo_bpm,
        beat_times,
    }
}

/// Parabolic interpolation around an autocorrelation peak for sub-lag
/// tempo precision
fn refine_peak(values: &[f32], idx: usize) -> f32 {
    if idx == 0 || idx + 1 >= values.len() {
        return idx as f32;
    }
    let (left, center, right) = (values[idx - 1], values[idx], values[idx + 1]);
    let denom = left - 2.0 * center + right;
    if denom.abs() < 1e-12 {
        return idx as f32;
    }
    let delta = 0.5 * (left - right) / denom;
    idx as f32 + delta.clamp(-0.5, 0.5)
}

/// Choose the grid phase with the most onset energy and emit its frames;
/// ties resolve to the earliest phase
fn place_beats(strength: &[f32], period: usize) -> Vec<usize> {
    if period == 0 || strength.is_empty() {
        return vec![];
    }

    let mut best_phase = 0usize;
    let mut best_energy = f32::NEG_INFINITY;
    for phase in 0..period.min(strength.len()) {
        let energy: f32 = strength[phase..].iter().step_by(period).sum();
        if energy > best_energy {
            best_energy = energy;
            best_phase = phase;
        }
    }

    (best_phase..strength.len()).step_by(period).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_signal(bpm: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
        let n = (seconds * sample_rate as f32) as usize;
        let period = (60.0 / bpm * sample_rate as f32) as usize;
        let impulse = (0.005 * sample_rate as f32) as usize;
        (0..n)
            .map(|i| {
                let pos = i % period;
                if pos < impulse {
                    0.8 * (-5.0 * pos as f32 / impulse as f32).exp()
                } else {
                    0.0
                }
            })
            .collect()
    }

    #[test]
    fn test_click_track_tempo_recovered() {
        let samples = click_signal(120.0, 8.0, 44100);
        let estimate = estimate_tempo(&samples, 44100);

        assert!(
            (estimate.tempo_bpm - 120.0).abs() < 3.0,
            "expected ~120 BPM, got {:.2}",
            estimate.tempo_bpm
        );
    }

    #[test]
    fn test_beat_grid_spacing() {
        let samples = click_signal(120.0, 8.0, 44100);
        let estimate = estimate_tempo(&samples, 44100);

        assert!(estimate.beat_times.len() >= 8);
        assert!(estimate.beat_times.iter().all(|&t| t >= 0.0));
        for pair in estimate.beat_times.windows(2) {
            let spacing = pair[1] - pair[0];
            assert!(spacing > 0.0, "beat times must ascend");
            assert!(
                (spacing - 0.5).abs() < 0.03,
                "expected ~0.5s spacing, got {:.3}",
                spacing
            );
        }
    }

    #[test]
    fn test_silence_reports_zero_tempo() {
        let estimate = estimate_tempo(&vec![0.0f32; 88200], 44100);
        assert_eq!(estimate.tempo_bpm, 0.0);
        assert!(estimate.beat_times.is_empty());
    }

    #[test]
    fn test_short_input_does_not_panic() {
        let estimate = estimate_tempo(&vec![0.5f32; 256], 44100);
        assert!(estimate.tempo_bpm >= 0.0);
    }

    #[test]
    fn test_refine_peak_centers_symmetric_peak() {
        let values = vec![0.2, 1.0, 0.2];
        assert!((refine_peak(&values, 1) - 1.0).abs() < 1e-6);
    }
}
