//! tracklab - Music track analysis pipeline
//!
//! Decodes a music track and produces a downsampled waveform for display,
//! an estimated musical key, a tempo estimate with beat grid, a time-stamped
//! chord progression, and a per-instrument stem decomposition written as
//! audio files.
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - `audio`: decoding via an ordered list of strategies, plus phase-aligned
//!   resampling
//! - `analysis`: chroma extraction, key/tempo/chord estimation, waveform
//!   previews, and stem separation with a process-wide model cache
//! - `pipeline`: per-track orchestration of all analysis stages
//! - `config`: runtime tuning knobs for a pipeline run
//!
//! Transport, upload validation, and session directory lifecycle are the
//! caller's concern; this crate reads one input file and writes stem files
//! into a directory it is given.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tracklab::{analyze, AnalysisConfig, Device};
//!
//! let config = AnalysisConfig::default();
//! let result = analyze(
//!     Path::new("track.mp3"),
//!     Path::new("./session/stems"),
//!     Device::Cpu,
//!     &config,
//! ).expect("analysis failed");
//! println!("{}: {} at {:.1} BPM", result.filename, result.key, result.tempo_bpm);
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-export key types at crate root
pub use config::AnalysisConfig;
pub use error::{Result, TracklabError};
pub use pipeline::analyze;
pub use types::{
    AnalysisResult, AudioBuffer, ChordSegment, Device, KeyEstimate, StemSet, TempoEstimate,
    WaveformPreview,
};
