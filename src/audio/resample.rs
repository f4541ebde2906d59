//! Sample rate conversion using rubato
//!
//! Every channel runs through its own FFT resampler constructed with the
//! same parameters, so multi-channel material stays phase aligned after
//! rate conversion. Stems are later recombined against the same timeline,
//! which makes inter-channel phase drift unacceptable.

use crate::error::{Result, TracklabError};
use rubato::{FftFixedInOut, Resampler};
use tracing::debug;

/// Input chunk size for the FFT resampler
const CHUNK_SIZE: usize = 1024;

/// Resample all channels from `from_rate` to `to_rate`
///
/// Identity when the rates already match. Channels are converted one at a
/// time with identical resampler parameters.
pub fn resample_channels(
    channels: Vec<Vec<f32>>,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<Vec<f32>>> {
    if from_rate == to_rate {
        return Ok(channels);
    }

    debug!(
        "resampling {} channels: {}Hz -> {}Hz",
        channels.len(),
        from_rate,
        to_rate
    );

    channels
        .into_iter()
        .map(|ch| resample_channel(&ch, from_rate, to_rate))
        .collect()
}

/// Resample a single channel with an anti-aliased FFT resampler
fn resample_channel(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 1).map_err(
            |e| TracklabError::ResampleError {
                reason: format!(
                    "failed to initialize resampler ({}Hz -> {}Hz): {}",
                    from_rate, to_rate, e
                ),
            },
        )?;

    let input_frames = resampler.input_frames_next();
    let output_frames = resampler.output_frames_next();

    let ratio = to_rate as f64 / from_rate as f64;
    let mut output = Vec::with_capacity((samples.len() as f64 * ratio).ceil() as usize);

    let mut pos = 0;
    while pos < samples.len() {
        let end = (pos + input_frames).min(samples.len());
        let mut chunk = samples[pos..end].to_vec();

        // The resampler only accepts full chunks; zero-pad the tail
        if chunk.len() < input_frames {
            chunk.resize(input_frames, 0.0);
        }

        let resampled =
            resampler
                .process(&[chunk], None)
                .map_err(|e| TracklabError::ResampleError {
                    reason: format!("resampler processing failed: {}", e),
                })?;

        if let Some(channel) = resampled.first() {
            let valid = if pos + input_frames > samples.len() {
                // Last chunk: only keep the output that maps to real input
                let input_valid = samples.len() - pos;
                ((input_valid as f64 * ratio).ceil() as usize).min(output_frames)
            } else {
                output_frames
            };
            output.extend_from_slice(&channel[..valid.min(channel.len())]);
        }

        pos += input_frames;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rates_pass_through() {
        let channels = vec![vec![0.1, 0.2, 0.3, 0.4, 0.5]];
        let result = resample_channels(channels.clone(), 44100, 44100).unwrap();
        assert_eq!(result, channels);
    }

    #[test]
    fn test_downsample_halves_length() {
        let samples: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let result = resample_channels(vec![samples], 44100, 22050).unwrap();
        assert!((result[0].len() as f64 - 500.0).abs() < 2.0);
    }

    #[test]
    fn test_upsample_doubles_length() {
        let samples: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let result = resample_channels(vec![samples], 22050, 44100).unwrap();
        assert!((result[0].len() as f64 - 2000.0).abs() < 10.0);
    }

    #[test]
    fn test_sine_amplitude_preserved() {
        use std::f32::consts::PI;
        let sample_rate = 44100.0;
        let freq = 440.0;
        let samples: Vec<f32> = (0..2000)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let result = resample_channels(vec![samples], 44100, 22050).unwrap();

        let max_val = result[0].iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_val = result[0].iter().cloned().fold(f32::INFINITY, f32::min);
        assert!(max_val > 0.9, "max value {} should be > 0.9", max_val);
        assert!(min_val < -0.9, "min value {} should be < -0.9", min_val);
    }

    #[test]
    fn test_identical_channels_stay_identical() {
        use std::f32::consts::PI;
        let samples: Vec<f32> = (0..5000)
            .map(|i| (2.0 * PI * 220.0 * i as f32 / 44100.0).sin())
            .collect();

        let result = resample_channels(vec![samples.clone(), samples], 44100, 48000).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], result[1]);
    }

    #[test]
    fn test_empty_channel() {
        let result = resample_channels(vec![vec![]], 22050, 44100).unwrap();
        assert!(result[0].is_empty());
    }
}
