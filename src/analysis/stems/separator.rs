//! ONNX Runtime stem separation
//!
//! Splits the input into overlapping segments, runs each through the
//! separation model, reassembles the per-source outputs with crossfaded
//! overlap-add, and writes one WAV file per source category.

use crate::analysis::stems::chunking::{chunk_buffer, overlap_add, AudioChunk, ChunkConfig, StemChunk};
use crate::analysis::stems::model::{spec_for, SeparationModel};
use crate::error::{Result, TracklabError};
use crate::types::{AudioBuffer, Device, StemSet};
use ndarray::Array3;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs a cached separation model over decoded audio
pub struct StemSeparator {
    model: Arc<SeparationModel>,
}

impl StemSeparator {
    /// Create a separator for `model_name` on `device`
    ///
    /// The model loads on first use for this (name, device) pair and the
    /// process-wide instance is reused afterwards.
    pub fn new(model_name: &str, device: Device) -> Result<Self> {
        let spec = spec_for(model_name)?;
        let model = SeparationModel::cached(spec, device)?;
        Ok(Self { model })
    }

    pub fn model(&self) -> &SeparationModel {
        &self.model
    }

    /// Separate `audio` into the model's sources and write one WAV per
    /// source into `output_dir`, returning the category to path mapping
    ///
    /// The buffer must already match the model's native sample rate and
    /// channel layout.
    pub fn separate(&self, audio: &AudioBuffer, output_dir: &Path) -> Result<StemSet> {
        let spec = self.model.spec();

        if audio.sample_rate != spec.sample_rate {
            return Err(TracklabError::ConfigError(format!(
                "model {} expects {}Hz input, got {}Hz",
                spec.name, spec.sample_rate, audio.sample_rate
            )));
        }
        if audio.channel_count() != spec.channels {
            return Err(TracklabError::ConfigError(format!(
                "model {} expects {} channels, got {}",
                spec.name,
                spec.channels,
                audio.channel_count()
            )));
        }

        std::fs::create_dir_all(output_dir)
            .map_err(|e| TracklabError::output_error(output_dir, e))?;

        let total_samples = audio.samples_per_channel();
        let config = ChunkConfig::for_sample_rate(spec.sample_rate);
        let chunks = chunk_buffer(audio, &config);

        info!(
            "separating {:.2}s of audio into {} sources ({} segments)",
            audio.duration_seconds(),
            spec.sources.len(),
            chunks.len()
        );

        let mut stem_chunks = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            debug!("running inference on segment {}/{}", chunk.index + 1, chunks.len());
            let stems = self.run_chunk(chunk)?;
            stem_chunks.push(StemChunk {
                index: chunk.index,
                start_sample: chunk.start_sample,
                stems,
            });
        }

        let stems = overlap_add(
            &stem_chunks,
            &config,
            total_samples,
            spec.sources.len(),
            spec.channels,
        );

        let mut paths = StemSet::new();
        for (source, stem) in spec.sources.iter().zip(stems.iter()) {
            let path = output_dir.join(format!("{}.wav", source));
            write_wav(&path, stem)?;
            paths.insert(source.to_string(), path);
        }

        info!("stem separation complete: {} files", paths.len());
        Ok(paths)
    }

    /// One forward pass: (1, channels, samples) in, (1, sources, channels,
    /// samples) out
    fn run_chunk(&self, chunk: &AudioChunk) -> Result<Vec<AudioBuffer>> {
        let spec = self.model.spec();
        let chunk_len = chunk.audio.samples_per_channel();

        let mut input = Array3::<f32>::zeros((1, spec.channels, chunk_len));
        for (ch_idx, channel) in chunk.audio.channels.iter().enumerate() {
            input
                .slice_mut(ndarray::s![0, ch_idx, ..])
                .assign(&ndarray::ArrayView1::from(&channel[..]));
        }

        let input_tensor =
            Tensor::from_array(input).map_err(|e| TracklabError::InferenceError {
                reason: format!("failed to create input tensor: {}", e),
            })?;

        let mut session =
            self.model
                .session()
                .lock()
                .map_err(|_| TracklabError::InferenceError {
                    reason: "model session lock poisoned".to_string(),
                })?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| TracklabError::InferenceError {
                reason: "model has no input tensors defined".to_string(),
            })?;

        let outputs = session
            .run(ort::inputs![input_name.as_str() => input_tensor])
            .map_err(|e| TracklabError::InferenceError {
                reason: format!("forward pass failed: {}", e),
            })?;

        let output = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| TracklabError::InferenceError {
                reason: "no output tensor from model".to_string(),
            })?;

        let (output_shape, output_data) =
            output
                .try_extract_tensor::<f32>()
                .map_err(|e| TracklabError::InferenceError {
                    reason: format!("failed to extract output tensor: {}", e),
                })?;

        let shape: Vec<i64> = output_shape.iter().copied().collect();
        extract_sources(
            &shape,
            output_data,
            spec.sources.len(),
            spec.channels,
            chunk.audio.sample_rate,
        )
    }
}

/// Adapt a decoded buffer to the model's channel layout
///
/// Mono is replicated onto the missing channels; excess channels are dropped
/// from the end.
pub fn match_channels(buffer: AudioBuffer, target: usize) -> AudioBuffer {
    if buffer.channel_count() == target {
        return buffer;
    }

    let sample_rate = buffer.sample_rate;
    let mut channels = buffer.channels;

    if channels.len() < target {
        let template = channels.first().cloned().unwrap_or_default();
        while channels.len() < target {
            channels.push(template.clone());
        }
    } else {
        channels.truncate(target);
    }

    AudioBuffer::new(channels, sample_rate)
}

/// Validate the model's output shape and slice it into per-source buffers
///
/// The output tensor is expected contiguous row-major with layout
/// (batch, sources, channels, samples); the length check below confirms
/// contiguity before any slicing.
fn extract_sources(
    shape: &[i64],
    data: &[f32],
    num_sources: usize,
    num_channels: usize,
    sample_rate: u32,
) -> Result<Vec<AudioBuffer>> {
    let inference_err = |reason: String| TracklabError::InferenceError { reason };

    if shape.len() != 4 {
        return Err(inference_err(format!(
            "expected 4D output tensor, got shape {:?}",
            shape
        )));
    }
    if shape[0] != 1 {
        return Err(inference_err(format!(
            "expected batch size 1, got {} (shape {:?})",
            shape[0], shape
        )));
    }
    if shape[1] != num_sources as i64 {
        return Err(inference_err(format!(
            "expected {} sources, got {} (shape {:?})",
            num_sources, shape[1], shape
        )));
    }
    if shape[2] != num_channels as i64 {
        return Err(inference_err(format!(
            "expected {} channels, got {} (shape {:?})",
            num_channels, shape[2], shape
        )));
    }
    if shape[3] < 0 {
        return Err(inference_err(format!(
            "negative sample dimension in output shape {:?}",
            shape
        )));
    }

    let samples = shape[3] as usize;
    let expected_len = num_sources
        .checked_mul(num_channels)
        .and_then(|v| v.checked_mul(samples))
        .ok_or_else(|| {
            inference_err(format!("output shape {:?} overflows a buffer length", shape))
        })?;

    if data.len() != expected_len {
        return Err(inference_err(format!(
            "output buffer length {} does not match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_len
        )));
    }

    let mut sources = Vec::with_capacity(num_sources);
    for source_idx in 0..num_sources {
        let mut channels = Vec::with_capacity(num_channels);
        for ch_idx in 0..num_channels {
            let start = (source_idx * num_channels + ch_idx) * samples;
            channels.push(data[start..start + samples].to_vec());
        }
        sources.push(AudioBuffer::new(channels, sample_rate));
    }
    Ok(sources)
}

/// Write a buffer as 16-bit PCM WAV
fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channel_count() as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let wav_err = |reason: String| TracklabError::OutputError {
        path: path.to_path_buf(),
        reason,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| wav_err(format!("failed to create WAV file: {}", e)))?;

    for i in 0..audio.samples_per_channel() {
        for channel in &audio.channels {
            let sample = (channel[i] * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample)
                .map_err(|e| wav_err(format!("failed to write sample: {}", e)))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| wav_err(format!("failed to finalize WAV: {}", e)))?;

    debug!("wrote stem to {}", path.display());
    Ok(())
}
