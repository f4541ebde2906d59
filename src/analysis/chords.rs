//! Frame-level chord detection via triad template matching

use crate::analysis::chroma::Chromagram;
use crate::types::{ChordSegment, PitchClass};
use tracing::debug;

/// Sentinel label for frames where no triad template scores above zero
pub const NO_CHORD: &str = "N";

/// Semitone offsets of a major triad above its root
const MAJOR_TRIAD: [usize; 3] = [0, 4, 7];

/// Semitone offsets of a minor triad above its root
const MINOR_TRIAD: [usize; 3] = [0, 3, 7];

/// Active pitch classes per template; normalizes a raw dot product into a
/// confidence
const TEMPLATE_SIZE: f32 = 3.0;

/// Detect one chord label per frame, then merge consecutive identical labels
///
/// Roots are scanned ascending with the major triad checked before the minor
/// at each root; only a strictly greater score displaces the current best,
/// so exact ties keep the earliest candidate. Merged segments keep the first
/// frame's time and never repeat a label in adjacent positions.
pub fn detect_chords(chroma: &Chromagram) -> Vec<ChordSegment> {
    let mut segments: Vec<ChordSegment> = Vec::new();

    for (frame, &time) in chroma.frames.iter().zip(chroma.frame_times.iter()) {
        let (label, score) = best_label(frame);

        // Merge runs of the same label, keeping the first frame of each run
        if segments.last().map(|s| s.chord == label).unwrap_or(false) {
            continue;
        }

        segments.push(ChordSegment {
            time: time as f64,
            chord: label,
            confidence: ((score / TEMPLATE_SIZE).clamp(0.0, 1.0)) as f64,
        });
    }

    debug!(
        "detected {} chord segments from {} frames",
        segments.len(),
        chroma.len()
    );
    segments
}

/// Best-scoring triad label for one chroma frame, or the no-chord sentinel
/// when nothing scores above zero
fn best_label(frame: &[f32; 12]) -> (String, f32) {
    let mut best_label = NO_CHORD.to_string();
    let mut best_score = 0.0f32;

    for root in 0..12 {
        let major = triad_score(frame, root, &MAJOR_TRIAD);
        if major > best_score {
            best_score = major;
            best_label = PitchClass::new(root).name().to_string();
        }

        let minor = triad_score(frame, root, &MINOR_TRIAD);
        if minor > best_score {
            best_score = minor;
            best_label = format!("{}m", PitchClass::new(root).name());
        }
    }

    (best_label, best_score)
}

fn triad_score(frame: &[f32; 12], root: usize, intervals: &[usize; 3]) -> f32 {
    intervals.iter().map(|&i| frame[(root + i) % 12]).sum()
}
