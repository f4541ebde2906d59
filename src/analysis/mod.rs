//! Audio analysis stages
//!
//! Chroma extraction is the shared feature behind key and chord estimation;
//! the remaining stages are independent of each other and of the chroma
//! consumers.

pub mod chords;
pub mod chroma;
pub mod key;
pub mod onset;
pub mod stems;
pub mod tempo;
pub mod waveform;

pub use chords::detect_chords;
pub use chroma::Chromagram;
pub use key::estimate_key;
pub use stems::StemSeparator;
pub use tempo::estimate_tempo;
pub use waveform::preview;
