//! Audio decoding behind an ordered list of strategies
//!
//! The fast path parses WAV directly with hound; everything else goes
//! through symphonia's format probe. Strategies are tried in order and the
//! final decode error carries every attempt's failure reason.

use crate::audio::resample;
use crate::error::{Result, TracklabError};
use crate::types::AudioBuffer;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Maximum file size we'll attempt to decode (2GB)
/// Prevents OOM on extremely large files
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Raw decode output: channel-first samples at the container's native rate
#[derive(Debug)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

/// Why a single strategy failed; the loader aggregates these per attempt
#[derive(Debug)]
pub struct DecodeFailure {
    pub strategy: &'static str,
    pub reason: String,
}

/// One way of turning a file into samples
pub trait DecodeStrategy: Sync {
    fn name(&self) -> &'static str;
    fn decode(&self, path: &Path) -> std::result::Result<DecodedAudio, DecodeFailure>;
}

/// Strategies in priority order: cheap WAV parsing first, then the broad
/// symphonia probe
fn strategies() -> &'static [&'static dyn DecodeStrategy] {
    &[&WavDecoder, &SymphoniaDecoder]
}

/// Decode an audio file to a channel-first buffer at `target_sample_rate`
///
/// With `mono` the channels are averaged down before resampling. Resampling
/// runs per channel with identical parameters so channels stay phase
/// aligned.
pub fn load(path: &Path, target_sample_rate: u32, mono: bool) -> Result<AudioBuffer> {
    if target_sample_rate == 0 {
        return Err(TracklabError::ConfigError(
            "target sample rate must be positive".to_string(),
        ));
    }

    let DecodedAudio {
        channels,
        sample_rate,
    } = decode_any(path)?;

    let channels = if mono && channels.len() > 1 {
        vec![mixdown_channels(&channels)]
    } else {
        channels
    };

    let channels = resample::resample_channels(channels, sample_rate, target_sample_rate)?;

    debug!(
        "loaded {}: {} channels, {} samples @ {}Hz",
        path.display(),
        channels.len(),
        channels.first().map(|c| c.len()).unwrap_or(0),
        target_sample_rate
    );

    Ok(AudioBuffer::new(channels, target_sample_rate))
}

/// Duration in seconds from container metadata, decoding only as a last
/// resort for containers that do not declare a frame count
pub fn probe_duration(path: &Path) -> Result<f64> {
    if let Ok(reader) = hound::WavReader::open(path) {
        let spec = reader.spec();
        if spec.sample_rate > 0 {
            return Ok(reader.duration() as f64 / spec.sample_rate as f64);
        }
    }

    if let Some(seconds) = probe_duration_metadata(path) {
        return Ok(seconds);
    }

    trace!(
        "{} declares no frame count, decoding for duration",
        path.display()
    );
    let decoded = decode_any(path)?;
    let frames = decoded.channels.first().map(|c| c.len()).unwrap_or(0);
    Ok(frames as f64 / decoded.sample_rate as f64)
}

fn probe_duration_metadata(path: &Path) -> Option<f64> {
    let file = std::fs::File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    let format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)?;

    let n_frames = track.codec_params.n_frames?;
    let sample_rate = track.codec_params.sample_rate?;
    if sample_rate == 0 {
        return None;
    }
    Some(n_frames as f64 / sample_rate as f64)
}

/// Run the strategy list until one succeeds; collect every failure into the
/// final error otherwise
fn decode_any(path: &Path) -> Result<DecodedAudio> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        TracklabError::decode_error(path, format!("failed to read file metadata: {}", e))
    })?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(TracklabError::decode_error(
            path,
            format!(
                "file too large ({:.1} GB), maximum supported size is 2 GB",
                metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ));
    }

    let mut failures: Vec<DecodeFailure> = Vec::new();

    for strategy in strategies() {
        match strategy.decode(path) {
            Ok(decoded) => {
                if decoded.sample_rate == 0 || decoded.channels.is_empty() {
                    failures.push(DecodeFailure {
                        strategy: strategy.name(),
                        reason: "decoded stream reports no channels or zero sample rate"
                            .to_string(),
                    });
                    continue;
                }
                debug!(
                    "decoded {} with the {} strategy",
                    path.display(),
                    strategy.name()
                );
                return Ok(decoded);
            }
            Err(failure) => {
                trace!(
                    "{} strategy failed for {}: {}",
                    failure.strategy,
                    path.display(),
                    failure.reason
                );
                failures.push(failure);
            }
        }
    }

    let reason = failures
        .iter()
        .map(|f| format!("{}: {}", f.strategy, f.reason))
        .collect::<Vec<_>>()
        .join("; ");
    Err(TracklabError::decode_error(path, reason))
}

/// Split interleaved samples into per-channel vectors
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let channels = channels.max(1);
    let frames = samples.len() / channels;
    let mut out = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &s) in out.iter_mut().zip(frame.iter()) {
            ch.push(s);
        }
    }
    out
}

/// Equal-weight average of all channels into one
fn mixdown_channels(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels.first().map(|c| c.len()).unwrap_or(0);
    let scale = 1.0 / channels.len() as f32;
    (0..frames)
        .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() * scale)
        .collect()
}

// =============================================================================
// WAV fast path
// =============================================================================

/// Direct WAV parsing, the common case for already-extracted audio
struct WavDecoder;

impl DecodeStrategy for WavDecoder {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn decode(&self, path: &Path) -> std::result::Result<DecodedAudio, DecodeFailure> {
        let fail = |reason: String| DecodeFailure {
            strategy: "wav",
            reason,
        };

        let mut reader = hound::WavReader::open(path).map_err(|e| fail(e.to_string()))?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(fail("invalid WAV header".to_string()));
        }

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| fail(e.to_string()))?,
            (hound::SampleFormat::Int, bits) if (1..=16).contains(&bits) => {
                let scale = 1.0 / (1i32 << (bits - 1)) as f32;
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| fail(e.to_string()))?
            }
            (hound::SampleFormat::Int, bits) if (17..=32).contains(&bits) => {
                let scale = 1.0 / (1i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| fail(e.to_string()))?
            }
            (format, bits) => {
                return Err(fail(format!(
                    "unsupported sample format {:?} at {} bits",
                    format, bits
                )))
            }
        };

        Ok(DecodedAudio {
            channels: deinterleave(&interleaved, spec.channels as usize),
            sample_rate: spec.sample_rate,
        })
    }
}

// =============================================================================
// Symphonia fallback
// =============================================================================

/// Broad-compatibility decoding through symphonia's format probe
struct SymphoniaDecoder;

impl DecodeStrategy for SymphoniaDecoder {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn decode(&self, path: &Path) -> std::result::Result<DecodedAudio, DecodeFailure> {
        let fail = |reason: String| DecodeFailure {
            strategy: "symphonia",
            reason,
        };

        let file =
            std::fs::File::open(path).map_err(|e| fail(format!("failed to open file: {}", e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Provide a hint based on file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| fail(format!("failed to probe format: {}", e)))?;

        let mut format = probed.format;

        // Find the first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .ok_or_else(|| fail("no audio tracks found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

        debug!(
            "decoding {} @ {}Hz, {} channels",
            path.display(),
            sample_rate,
            channels
        );

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| fail(format!("failed to create decoder: {}", e)))?;

        let mut interleaved: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break; // End of stream
                }
                Err(e) => return Err(fail(format!("failed to read packet: {}", e))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    // Skip corrupted frames
                    trace!("skipping corrupted frame: {}", e);
                    continue;
                }
                Err(e) => return Err(fail(format!("decode error: {}", e))),
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(sample_buf.samples());
        }

        if channels == 0 {
            return Err(fail("decoded stream has no channels".to_string()));
        }

        Ok(DecodedAudio {
            channels: deinterleave(&interleaved, channels),
            sample_rate,
        })
    }
}
