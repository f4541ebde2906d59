//! Pipeline orchestration
//!
//! Runs every analysis stage over one input file and assembles the final
//! result. The waveform, key/tempo, and chord stages are pure functions of
//! the decoded audio and independent of each other, so they run in
//! parallel; each decodes at its own required sample rate and channel
//! layout, trading repeated decode work for stage isolation. Stem
//! separation runs last; it is the only stage with side effects and the
//! dominant cost.

use crate::analysis::stems::{match_channels, StemSeparator};
use crate::analysis::{chords, chroma, key, tempo, waveform};
use crate::audio;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::types::{
    AnalysisResult, ChordSegment, Device, KeyEstimate, StemSet, TempoEstimate, WaveformPreview,
};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Analyze one track: waveform preview, key, tempo, chords, and stems
///
/// `output_dir` receives the stem files; the caller owns that directory and
/// its cleanup. Any stage failure aborts the run and propagates unchanged.
pub fn analyze(
    input: &Path,
    output_dir: &Path,
    device: Device,
    config: &AnalysisConfig,
) -> Result<AnalysisResult> {
    let started = Instant::now();

    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    debug!("analyzing {} on {}", input.display(), device);

    let duration_seconds = audio::probe_duration(input)?;

    let (waveform_result, (key_tempo_result, chords_result)) = rayon::join(
        || waveform_stage(input, config),
        || {
            rayon::join(
                || key_tempo_stage(input, config),
                || chords_stage(input, config),
            )
        },
    );

    let preview = waveform_result?;
    let (key_estimate, tempo_estimate) = key_tempo_result?;
    let chord_segments = chords_result?;

    let stems = if config.stems_enabled {
        stems_stage(input, output_dir, device, config)?
    } else {
        debug!("stem separation disabled, skipping");
        StemSet::new()
    };

    let processing_time_seconds = started.elapsed().as_secs_f64();
    info!(
        "analyzed {} in {:.2}s: {} at {:.1} BPM, {} chords, {} stems",
        filename,
        processing_time_seconds,
        key_estimate.key,
        tempo_estimate.tempo_bpm,
        chord_segments.len(),
        stems.len()
    );

    Ok(AnalysisResult {
        filename,
        duration_seconds,
        processing_time_seconds,
        waveform: preview,
        key: key_estimate.key,
        key_confidence: key_estimate.confidence,
        tempo_bpm: tempo_estimate.tempo_bpm,
        beat_times: tempo_estimate.beat_times,
        chords: chord_segments,
        stems,
    })
}

fn waveform_stage(input: &Path, config: &AnalysisConfig) -> Result<WaveformPreview> {
    let buffer = audio::load(input, config.analysis_sample_rate, false)?;
    Ok(waveform::preview(&buffer, config.waveform_max_points))
}

fn key_tempo_stage(
    input: &Path,
    config: &AnalysisConfig,
) -> Result<(KeyEstimate, TempoEstimate)> {
    let buffer = audio::load(input, config.analysis_sample_rate, true)?;
    let mono = buffer.channel(0);

    let chromagram = chroma::chroma(mono, buffer.sample_rate, config.key_hop_length);
    let key_estimate = key::estimate_key(&chromagram);
    let tempo_estimate = tempo::estimate_tempo(mono, buffer.sample_rate);

    Ok((key_estimate, tempo_estimate))
}

fn chords_stage(input: &Path, config: &AnalysisConfig) -> Result<Vec<ChordSegment>> {
    let buffer = audio::load(input, config.analysis_sample_rate, true)?;
    let chromagram = chroma::chroma(
        buffer.channel(0),
        buffer.sample_rate,
        config.chord_hop_length,
    );
    Ok(chords::detect_chords(&chromagram))
}

fn stems_stage(
    input: &Path,
    output_dir: &Path,
    device: Device,
    config: &AnalysisConfig,
) -> Result<StemSet> {
    let separator = StemSeparator::new(&config.model_name, device)?;
    let spec = separator.model().spec();

    // The model dictates sample rate and channel layout
    let buffer = audio::load(input, spec.sample_rate, false)?;
    let buffer = match_channels(buffer, spec.channels);

    separator.separate(&buffer, output_dir)
}
