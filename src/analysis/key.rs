//! Global key estimation via tonal profile correlation

use crate::analysis::chroma::Chromagram;
use crate::types::{KeyEstimate, Mode, PitchClass};
use tracing::debug;

/// Krumhansl tonal hierarchy profile for major keys, C rooted
const KRUMHANSL_MAJOR: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl tonal hierarchy profile for minor keys, C rooted
const KRUMHANSL_MINOR: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Guard against dividing by zero on silent input
const NORM_EPSILON: f32 = 1e-9;

/// Estimate the global key of a chromagram
///
/// The mean chroma vector is L2-normalized and correlated against both
/// profiles at all 12 rotations. Candidates are scanned in canonical order,
/// tonic ascending with major before minor at each tonic, and only a
/// strictly greater score displaces the current best; exact ties therefore
/// resolve to the earliest candidate in that order.
pub fn estimate_key(chroma: &Chromagram) -> KeyEstimate {
    let major = l2_normalize(&KRUMHANSL_MAJOR);
    let minor = l2_normalize(&KRUMHANSL_MINOR);

    let mean = chroma.mean();
    let norm = mean.iter().map(|v| v * v).sum::<f32>().sqrt() + NORM_EPSILON;
    let mut observed = [0.0f32; 12];
    for (o, v) in observed.iter_mut().zip(mean.iter()) {
        *o = v / norm;
    }

    let mut best_tonic = 0usize;
    let mut best_mode = Mode::Major;
    let mut best_score = f32::NEG_INFINITY;

    for tonic in 0..12 {
        for (mode, profile) in [(Mode::Major, &major), (Mode::Minor, &minor)] {
            let score = rotated_dot(&observed, profile, tonic);
            if score > best_score {
                best_score = score;
                best_tonic = tonic;
                best_mode = mode;
            }
        }
    }

    let key = format!(
        "{} {}",
        PitchClass::new(best_tonic).name(),
        best_mode.as_str()
    );
    let confidence = (((best_score + 1.0) / 2.0).clamp(0.0, 1.0)) as f64;

    debug!("estimated key {} (score {:.3})", key, best_score);

    KeyEstimate { key, confidence }
}

/// Dot product of `observed` against `profile` rotated so its root lands on
/// `tonic`
fn rotated_dot(observed: &[f32; 12], profile: &[f32; 12], tonic: usize) -> f32 {
    (0..12)
        .map(|i| observed[i] * profile[(i + 12 - tonic) % 12])
        .sum()
}

fn l2_normalize(profile: &[f32; 12]) -> [f32; 12] {
    let norm = profile.iter().map(|v| v * v).sum::<f32>().sqrt();
    let mut out = [0.0f32; 12];
    for (o, v) in out.iter_mut().zip(profile.iter()) {
        *o = v / norm;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chromagram_from_classes(classes: &[usize], frames: usize) -> Chromagram {
        let mut frame = [0.0f32; 12];
        for &c in classes {
            frame[c] = 1.0;
        }
        Chromagram {
            frames: vec![frame; frames],
            frame_times: (0..frames).map(|i| i as f32 * 0.05).collect(),
        }
    }

    #[test]
    fn test_c_major_triad_detected() {
        let chroma = chromagram_from_classes(&[0, 4, 7], 10);
        let estimate = estimate_key(&chroma);
        assert_eq!(estimate.key, "C major");
        assert!(estimate.confidence > 0.5);
    }

    #[test]
    fn test_a_minor_triad_detected() {
        // A, C, E
        let chroma = chromagram_from_classes(&[9, 0, 4], 10);
        let estimate = estimate_key(&chroma);
        assert_eq!(estimate.key, "A minor");
    }

    #[test]
    fn test_rotation_shifts_tonic() {
        // D major triad: D, F#, A
        let chroma = chromagram_from_classes(&[2, 6, 9], 10);
        let estimate = estimate_key(&chroma);
        assert_eq!(estimate.key, "D major");
    }

    #[test]
    fn test_silence_resolves_to_first_canonical_candidate() {
        // All 24 scores tie at zero, so the scan order decides: C major
        let chroma = Chromagram {
            frames: vec![[0.0; 12]; 8],
            frame_times: (0..8).map(|i| i as f32 * 0.05).collect(),
        };
        let estimate = estimate_key(&chroma);
        assert_eq!(estimate.key, "C major");
        assert!((estimate.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_chromagram() {
        let chroma = Chromagram {
            frames: vec![],
            frame_times: vec![],
        };
        let estimate = estimate_key(&chroma);
        assert_eq!(estimate.key, "C major");
        assert!(estimate.confidence.is_finite());
    }

    #[test]
    fn test_confidence_bounded() {
        for classes in [&[0usize, 4, 7][..], &[1, 5, 8], &[11], &[]] {
            let chroma = chromagram_from_classes(classes, 5);
            let estimate = estimate_key(&chroma);
            assert!((0.0..=1.0).contains(&estimate.confidence));
        }
    }
}
