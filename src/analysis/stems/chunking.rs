//! Segmenting and crossfaded reassembly for model inference
//!
//! The separation model only accepts short segments, so long tracks are
//! split with overlap and the per-source outputs are blended back together
//! with linear crossfades.

use crate::types::AudioBuffer;

/// Longest segment the model accepts, in seconds
pub const MAX_SEGMENT_SECONDS: f32 = 7.8;

/// Overlap between adjacent segments, in seconds (for smooth crossfade)
pub const OVERLAP_SECONDS: f32 = 1.0;

/// Configuration for audio segmenting
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum samples per chunk
    pub chunk_samples: usize,
    /// Overlap samples between chunks
    pub overlap_samples: usize,
    /// Sample rate
    pub sample_rate: u32,
}

impl ChunkConfig {
    /// Default segmenting for a model running at `sample_rate`
    pub fn for_sample_rate(sample_rate: u32) -> Self {
        Self::new(MAX_SEGMENT_SECONDS, OVERLAP_SECONDS, sample_rate)
    }

    /// Create config with custom parameters
    pub fn new(max_seconds: f32, overlap_seconds: f32, sample_rate: u32) -> Self {
        Self {
            chunk_samples: (max_seconds * sample_rate as f32) as usize,
            overlap_samples: (overlap_seconds * sample_rate as f32) as usize,
            sample_rate,
        }
    }

    /// Hop between chunk starts
    pub fn stride(&self) -> usize {
        self.chunk_samples.saturating_sub(self.overlap_samples)
    }
}

/// A single input segment ready for inference
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Chunk index (0-based)
    pub index: usize,
    /// Start sample in the original audio
    pub start_sample: usize,
    /// End sample in the original audio
    pub end_sample: usize,
    /// Audio data for this chunk
    pub audio: AudioBuffer,
}

/// Per-source model output for one segment, in the model's source order
#[derive(Debug, Clone)]
pub struct StemChunk {
    pub index: usize,
    pub start_sample: usize,
    pub stems: Vec<AudioBuffer>,
}

/// Split a buffer into overlapping chunks
pub fn chunk_buffer(audio: &AudioBuffer, config: &ChunkConfig) -> Vec<AudioChunk> {
    let total_samples = audio.samples_per_channel();
    let stride = config.stride().max(1);

    if total_samples <= config.chunk_samples {
        // Short audio: single chunk
        return vec![AudioChunk {
            index: 0,
            start_sample: 0,
            end_sample: total_samples,
            audio: audio.clone(),
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut index = 0;

    while start < total_samples {
        let end = (start + config.chunk_samples).min(total_samples);

        let channels: Vec<Vec<f32>> = audio
            .channels
            .iter()
            .map(|c| c[start..end].to_vec())
            .collect();

        chunks.push(AudioChunk {
            index,
            start_sample: start,
            end_sample: end,
            audio: AudioBuffer::new(channels, audio.sample_rate),
        });

        start += stride;
        index += 1;

        // A trailing sliver shorter than the overlap is already covered
        if total_samples.saturating_sub(start) < config.overlap_samples {
            break;
        }
    }

    chunks
}

/// Reassemble separated stem chunks using overlap-add with linear crossfade
pub fn overlap_add(
    chunks: &[StemChunk],
    config: &ChunkConfig,
    total_samples: usize,
    num_sources: usize,
    num_channels: usize,
) -> Vec<AudioBuffer> {
    let mut outputs = vec![vec![vec![0.0f32; total_samples]; num_channels]; num_sources];
    let mut weight_sum = vec![0.0f32; total_samples];

    for chunk in chunks {
        let chunk_len = chunk
            .stems
            .first()
            .map(|s| s.samples_per_channel())
            .unwrap_or(0);
        let weights = crossfade_weights(
            chunk_len,
            config.overlap_samples,
            chunk.index == 0,
            chunk.index == chunks.len().saturating_sub(1),
        );

        for (source_idx, stem) in chunk.stems.iter().enumerate().take(num_sources) {
            for (ch_idx, channel) in stem.channels.iter().enumerate().take(num_channels) {
                let out = &mut outputs[source_idx][ch_idx];
                for (i, (&sample, &w)) in channel.iter().zip(weights.iter()).enumerate() {
                    let out_idx = chunk.start_sample + i;
                    if out_idx < total_samples {
                        out[out_idx] += sample * w;
                    }
                }
            }
        }

        for (i, &w) in weights.iter().enumerate() {
            let out_idx = chunk.start_sample + i;
            if out_idx < total_samples {
                weight_sum[out_idx] += w;
            }
        }
    }

    // Normalize by accumulated weight
    for sample_idx in 0..total_samples {
        if weight_sum[sample_idx] > 1e-8 {
            let inv = 1.0 / weight_sum[sample_idx];
            for source in outputs.iter_mut() {
                for channel in source.iter_mut() {
                    channel[sample_idx] *= inv;
                }
            }
        }
    }

    outputs
        .into_iter()
        .map(|channels| AudioBuffer::new(channels, config.sample_rate))
        .collect()
}

/// Linear fade-in/fade-out ramps over the overlap region
///
/// The first chunk skips the fade-in and the last skips the fade-out.
fn crossfade_weights(chunk_len: usize, overlap: usize, is_first: bool, is_last: bool) -> Vec<f32> {
    let mut weights = vec![1.0f32; chunk_len];

    if !is_first {
        let fade = overlap.min(chunk_len);
        for (i, w) in weights.iter_mut().take(fade).enumerate() {
            *w = i as f32 / fade as f32;
        }
    }

    if !is_last {
        let fade = overlap.min(chunk_len);
        let start = chunk_len.saturating_sub(fade);
        for (i, w) in weights[start..].iter_mut().enumerate() {
            *w *= (fade - i) as f32 / fade as f32;
        }
    }

    weights
}
