//! Neural stem separation
//!
//! A cached ONNX Runtime model decomposes the mix into per-instrument
//! sources; outputs are written as WAV files named by source category.

pub mod cache;
pub mod chunking;
pub mod model;
pub mod separator;

pub use cache::{separation_models, ModelCache, ModelKey};
pub use model::{spec_for, ModelSpec, SeparationModel};
pub use separator::{match_channels, StemSeparator};
