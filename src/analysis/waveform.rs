//! Waveform preview generation
//!
//! Downsamples a buffer into a compact mean-envelope representation for UI
//! rendering.

use crate::types::{AudioBuffer, WaveformPreview};
use tracing::debug;

/// Downsample `buffer` to at most `max_points` per channel
///
/// Amplitudes are divided by the single loudest absolute sample across all
/// channels; a silent buffer divides by 1 and stays silent. A buffer that
/// already fits is returned unchanged apart from normalization. Chunks are
/// reduced by arithmetic mean, producing an envelope rather than a peak
/// preview.
pub fn preview(buffer: &AudioBuffer, max_points: usize) -> WaveformPreview {
    let samples = buffer.samples_per_channel();
    let channels = buffer.channel_count();
    let max_points = max_points.max(1);

    let peak = buffer
        .channels
        .iter()
        .flat_map(|c| c.iter())
        .fold(0.0f32, |acc, &s| acc.max(s.abs()));
    let scale = if peak > 0.0 { 1.0 / peak } else { 1.0 };

    if samples <= max_points {
        let data = buffer
            .channels
            .iter()
            .map(|c| c.iter().map(|&s| s * scale).collect())
            .collect();
        return WaveformPreview {
            sample_rate: buffer.sample_rate,
            channels,
            points: samples,
            data,
        };
    }

    // Ceiling division keeps the point count within the budget for every
    // input length
    let chunk_size = samples.div_ceil(max_points).max(1);
    let actual_points = samples / chunk_size;

    debug!(
        "waveform preview: {} samples -> {} points (chunk {})",
        samples, actual_points, chunk_size
    );

    let data: Vec<Vec<f32>> = buffer
        .channels
        .iter()
        .map(|channel| {
            channel[..actual_points * chunk_size]
                .chunks_exact(chunk_size)
                .map(|chunk| chunk.iter().sum::<f32>() * scale / chunk_size as f32)
                .collect()
        })
        .collect();

    WaveformPreview {
        sample_rate: buffer.sample_rate,
        channels,
        points: actual_points,
        data,
    }
}
