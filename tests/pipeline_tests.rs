//! Integration tests for the tracklab analysis pipeline
//!
//! These tests exercise the full orchestrator over generated WAV fixtures.
//! Stem separation is disabled so the suite runs without model weights; the
//! separation path is covered by unit tests on the cache, chunking, and
//! tensor extraction layers.

use std::f32::consts::PI;
use std::path::Path;
use tempfile::TempDir;
use tracklab::{analyze, AnalysisConfig, Device};

fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        stems_enabled: false,
        ..AnalysisConfig::default()
    }
}

/// Generate a sine wave WAV file for testing
fn generate_sine_wav(path: &Path, freq: f32, seconds: f32, sample_rate: u32, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("failed to create WAV");

    let num_samples = (seconds * sample_rate as f32) as usize;
    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let sample = ((2.0 * PI * freq * t).sin() * 0.5 * 32767.0) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).expect("failed to write sample");
        }
    }
    writer.finalize().expect("failed to finalize WAV");
}

/// Generate an all-zero WAV file
fn generate_silent_wav(path: &Path, seconds: f32, sample_rate: u32, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("failed to create WAV");

    let num_samples = (seconds * sample_rate as f32) as usize;
    for _ in 0..num_samples * channels as usize {
        writer.write_sample(0i16).expect("failed to write sample");
    }
    writer.finalize().expect("failed to finalize WAV");
}

/// Generate a click track WAV at the given BPM
fn generate_click_wav(path: &Path, bpm: f32, seconds: f32, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("failed to create WAV");

    let num_samples = (seconds * sample_rate as f32) as usize;
    let samples_per_beat = (60.0 / bpm * sample_rate as f32) as usize;
    let impulse_samples = (0.005 * sample_rate as f32) as usize;

    for i in 0..num_samples {
        let position_in_beat = i % samples_per_beat;
        let sample = if position_in_beat < impulse_samples {
            let decay = (-5.0 * position_in_beat as f32 / impulse_samples as f32).exp();
            (0.8 * decay * 32767.0) as i16
        } else {
            0
        };
        writer.write_sample(sample).expect("failed to write sample");
    }
    writer.finalize().expect("failed to finalize WAV");
}

#[test]
fn test_sine_track_full_contract() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let track = input_dir.path().join("tone.wav");
    generate_sine_wav(&track, 440.0, 5.0, 44100, 1);

    let result = analyze(&track, output_dir.path(), Device::Cpu, &test_config())
        .expect("analysis should succeed");

    assert_eq!(result.filename, "tone.wav");
    assert!((result.duration_seconds - 5.0).abs() < 0.05);
    assert!(result.processing_time_seconds >= 0.0);

    // Waveform contract
    assert!(result.waveform.points <= 4096);
    assert!(result.waveform.points > 0);
    assert_eq!(result.waveform.channels, 1);
    assert_eq!(result.waveform.data.len(), 1);
    assert_eq!(result.waveform.data[0].len(), result.waveform.points);
    for &v in &result.waveform.data[0] {
        assert!((-1.0..=1.0).contains(&v));
        assert!(!v.is_nan());
    }

    // Key contract: "<Tonic> <major|minor>"
    let parts: Vec<&str> = result.key.split(' ').collect();
    assert_eq!(parts.len(), 2, "unexpected key format: {}", result.key);
    assert!(["major", "minor"].contains(&parts[1]));
    assert!((0.0..=1.0).contains(&result.key_confidence));

    // Tempo contract
    assert!(result.tempo_bpm >= 0.0);
    for pair in result.beat_times.windows(2) {
        assert!(pair[0] >= 0.0);
        assert!(pair[0] <= pair[1]);
    }

    // Chord contract: sorted, bounded confidence, no adjacent duplicates
    for segment in &result.chords {
        assert!(segment.time >= 0.0);
        assert!((0.0..=1.0).contains(&segment.confidence));
    }
    for pair in result.chords.windows(2) {
        assert!(pair[0].time <= pair[1].time);
        assert_ne!(pair[0].chord, pair[1].chord);
    }

    // Stems disabled for this run
    assert!(result.stems.is_empty());
}

#[test]
fn test_silent_stereo_track_is_inert() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let track = input_dir.path().join("silence.wav");
    generate_silent_wav(&track, 2.0, 44100, 2);

    let result = analyze(&track, output_dir.path(), Device::Cpu, &test_config())
        .expect("silence must not raise");

    // Preview is all zeros with no NaN from the normalization guard
    assert_eq!(result.waveform.channels, 2);
    for channel in &result.waveform.data {
        assert!(channel.iter().all(|&v| v == 0.0 && !v.is_nan()));
    }

    // Either nothing detected or a single no-chord segment
    assert!(result.chords.len() <= 1);
    if let Some(segment) = result.chords.first() {
        assert_eq!(segment.chord, "N");
    }

    assert_eq!(result.tempo_bpm, 0.0);
    assert!(result.beat_times.is_empty());
    assert!((0.0..=1.0).contains(&result.key_confidence));
}

#[test]
fn test_click_track_tempo_recovered() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let track = input_dir.path().join("click.wav");
    generate_click_wav(&track, 120.0, 8.0, 44100);

    let result = analyze(&track, output_dir.path(), Device::Cpu, &test_config())
        .expect("analysis should succeed");

    assert!(
        (result.tempo_bpm - 120.0).abs() < 3.0,
        "expected ~120 BPM, got {:.2}",
        result.tempo_bpm
    );
    assert!(result.beat_times.len() >= 8);
    for pair in result.beat_times.windows(2) {
        assert!((pair[1] - pair[0] - 0.5).abs() < 0.05);
    }
}

#[test]
fn test_low_sample_rate_input_is_resampled() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let track = input_dir.path().join("low_rate.wav");
    generate_sine_wav(&track, 440.0, 2.0, 22050, 1);

    let result = analyze(&track, output_dir.path(), Device::Cpu, &test_config())
        .expect("analysis should succeed");

    // Preview reflects the analysis rate, duration the source file
    assert_eq!(result.waveform.sample_rate, 44100);
    assert!((result.duration_seconds - 2.0).abs() < 0.01);
}

#[test]
fn test_result_serializes_with_contract_fields() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let track = input_dir.path().join("tone.wav");
    generate_sine_wav(&track, 330.0, 3.0, 44100, 2);

    let result = analyze(&track, output_dir.path(), Device::Cpu, &test_config()).unwrap();
    let json = serde_json::to_value(&result).expect("result should serialize");

    for field in [
        "filename",
        "duration_seconds",
        "processing_time_seconds",
        "waveform",
        "key",
        "key_confidence",
        "tempo_bpm",
        "beat_times",
        "chords",
        "stems",
    ] {
        assert!(json.get(field).is_some(), "missing field {}", field);
    }

    let waveform = json.get("waveform").unwrap();
    for field in ["sample_rate", "channels", "points", "data"] {
        assert!(waveform.get(field).is_some(), "missing waveform.{}", field);
    }
}

#[test]
fn test_missing_input_fails_with_decode_error() {
    let output_dir = TempDir::new().unwrap();
    let result = analyze(
        Path::new("/nonexistent/track.wav"),
        output_dir.path(),
        Device::Cpu,
        &test_config(),
    );
    assert!(result.is_err());
}

#[test]
fn test_device_selector_parsing() {
    assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
    assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda);
    assert!("metal".parse::<Device>().is_err());
}
