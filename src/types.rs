//! Core data types for tracklab
//!
//! These types represent the domain model and flow through the pipeline.

use crate::error::TracklabError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

// =============================================================================
// Musical primitives
// =============================================================================

/// Note names for the 12 pitch classes, indexed 0 = C through 11 = B
const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the 12 pitch classes (C, C#, ..., B), octave-independent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PitchClass(u8);

impl PitchClass {
    /// Wrap any index onto the 12-tone circle (0 = C, 11 = B)
    pub fn new(index: usize) -> Self {
        Self((index % 12) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Standard notation (e.g., "C", "F#", "A#")
    pub fn name(self) -> &'static str {
        PITCH_NAMES[self.0 as usize]
    }
}

/// Major or minor tonal quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

// =============================================================================
// Inference device
// =============================================================================

/// Device a separation model is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl FromStr for Device {
    type Err = TracklabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda),
            other => Err(TracklabError::ConfigError(format!(
                "unknown device '{}', expected \"cpu\" or \"cuda\"",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Audio buffer
// =============================================================================

/// Decoded audio samples, channel-first
///
/// Every channel holds the same number of samples; values are nominally in
/// [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// One sample vector per channel
    pub channels: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(
            channels.windows(2).all(|w| w[0].len() == w[1].len()),
            "all channels must have equal length"
        );
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples in each channel
    pub fn samples_per_channel(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn duration_seconds(&self) -> f64 {
        // Guard against division by zero on an invalid sample rate
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples_per_channel() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples_per_channel() == 0
    }

    /// Equal-weight average of all channels into a single mono signal
    pub fn mixdown(&self) -> Vec<f32> {
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }
        let frames = self.samples_per_channel();
        let scale = 1.0 / self.channels.len().max(1) as f32;
        (0..frames)
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
            .collect()
    }
}

// =============================================================================
// Analysis results
// =============================================================================

/// Estimated global key
#[derive(Debug, Clone, Serialize)]
pub struct KeyEstimate {
    /// "<Tonic> <major|minor>", e.g. "F# minor"
    pub key: String,
    /// Confidence score in [0, 1]
    pub confidence: f64,
}

/// Estimated global tempo with beat grid
#[derive(Debug, Clone, Serialize)]
pub struct TempoEstimate {
    /// Tempo in beats per minute; 0 when no rhythmic energy was found
    pub tempo_bpm: f64,
    /// Beat positions in seconds, ascending
    pub beat_times: Vec<f64>,
}

/// A time-stamped chord label
#[derive(Debug, Clone, Serialize)]
pub struct ChordSegment {
    /// Segment start in seconds
    pub time: f64,
    /// Root name, root+"m" for minor, or "N" for no chord
    pub chord: String,
    /// Confidence score in [0, 1]
    pub confidence: f64,
}

/// Downsampled waveform for UI rendering
#[derive(Debug, Clone, Serialize)]
pub struct WaveformPreview {
    /// Sample rate of the source buffer
    pub sample_rate: u32,
    /// Number of channels
    pub channels: usize,
    /// Points per channel; 0 only for zero-length input
    pub points: usize,
    /// Channel-first amplitude data in [-1, 1]
    pub data: Vec<Vec<f32>>,
}

/// Mapping from stem category (vocals, drums, ...) to the written file path
pub type StemSet = BTreeMap<String, PathBuf>;

/// Complete analysis result for a single track
///
/// Assembled once per run by the orchestrator and immutable afterwards; the
/// caller owns serialization and the lifetime of the referenced stem files.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Original file name
    pub filename: String,
    /// Track duration in seconds
    pub duration_seconds: f64,
    /// Wall-clock time of the whole analysis in seconds
    pub processing_time_seconds: f64,
    /// Display waveform
    pub waveform: WaveformPreview,
    /// Estimated key, "<Tonic> <major|minor>"
    pub key: String,
    /// Key confidence in [0, 1]
    pub key_confidence: f64,
    /// Estimated tempo in BPM
    pub tempo_bpm: f64,
    /// Beat positions in seconds, ascending
    pub beat_times: Vec<f64>,
    /// Chord progression sorted by time, no adjacent duplicate labels
    pub chords: Vec<ChordSegment>,
    /// Stem category to output file path
    pub stems: StemSet,
}
