//! Separation model registry and loading
//!
//! Model weights are resolved from an environment override, well-known
//! cache directories, or downloaded and checksum-verified on first use.
//! Each loaded model is bound to a single device for its whole lifetime;
//! requesting another device produces a separate instance under its own
//! cache key.

use crate::analysis::stems::cache::{separation_models, ModelKey};
use crate::error::{Result, TracklabError};
use crate::types::Device;
use directories::ProjectDirs;
use ort::session::Session;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Static description of a separation model variant
pub struct ModelSpec {
    pub name: &'static str,
    /// Native sample rate the model expects
    pub sample_rate: u32,
    /// Channel layout the model expects
    pub channels: usize,
    /// Source categories in the model's output order
    pub sources: &'static [&'static str],
    /// URL to download the weights from
    pub url: &'static str,
    /// Expected SHA-256 hash of the weights file
    pub sha256: &'static str,
    /// Weights filename
    pub filename: &'static str,
    /// Weights size in bytes (for progress reporting)
    pub size_bytes: u64,
}

/// Hybrid Transformer Demucs: four sources at 44.1kHz stereo
///
/// Pre-optimized .ort weights, direct download with SHA-256 verification.
/// Users can override the location with TRACKLAB_MODEL_PATH.
pub const HTDEMUCS: ModelSpec = ModelSpec {
    name: "htdemucs",
    sample_rate: 44_100,
    channels: 2,
    sources: &["drums", "bass", "other", "vocals"],
    url: "https://huggingface.co/gentij/htdemucs-ort/resolve/main/htdemucs.ort",
    sha256: "09dc165512d8ef7480bcb2cacea9dda82d571f8dbf421d8c44a2ca5568bec729",
    filename: "htdemucs.ort",
    size_bytes: 209_884_896, // ~200MB
};

/// Look up the spec for a model name
pub fn spec_for(name: &str) -> Result<&'static ModelSpec> {
    match name {
        "htdemucs" => Ok(&HTDEMUCS),
        other => Err(TracklabError::ModelLoadError {
            reason: format!("unknown separation model '{}'", other),
        }),
    }
}

/// A loaded separation model bound to one device
pub struct SeparationModel {
    spec: &'static ModelSpec,
    device: Device,
    session: Mutex<Session>,
}

impl SeparationModel {
    /// Load the model weights and bind them to `device`
    pub fn load(spec: &'static ModelSpec, device: Device) -> Result<Self> {
        let model_path = find_model_path(spec)?;
        let session = build_session(&model_path, device)?;

        info!(
            "separation model {} ready on {} ({})",
            spec.name,
            device,
            model_path.display()
        );

        Ok(Self {
            spec,
            device,
            session: Mutex::new(session),
        })
    }

    /// Fetch the shared instance for (spec, device), loading it on first use
    pub fn cached(spec: &'static ModelSpec, device: Device) -> Result<Arc<Self>> {
        let key = ModelKey {
            name: spec.name.to_string(),
            device,
        };
        separation_models().get_or_load(&key, || Self::load(spec, device))
    }

    pub fn spec(&self) -> &'static ModelSpec {
        self.spec
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub(crate) fn session(&self) -> &Mutex<Session> {
        &self.session
    }
}

/// Build an ORT session for the requested device
///
/// Requesting cuda without the `cuda` build feature (or when the provider
/// cannot be registered) fails fast; there is no silent CPU fallback.
fn build_session(model_path: &Path, device: Device) -> Result<Session> {
    let load_err = |reason: String| TracklabError::ModelLoadError { reason };

    let builder = Session::builder()
        .map_err(|e| load_err(format!("failed to create session builder: {}", e)))?;

    let session = match device {
        Device::Cuda => {
            #[cfg(feature = "cuda")]
            {
                use ort::execution_providers::CUDAExecutionProvider;
                builder
                    .with_execution_providers([CUDAExecutionProvider::default()
                        .build()
                        .error_on_failure()])
                    .map_err(|e| load_err(format!("failed to configure CUDA: {}", e)))?
                    .commit_from_file(model_path)
                    .map_err(|e| load_err(format!("failed to load model with CUDA: {}", e)))?
            }
            #[cfg(not(feature = "cuda"))]
            {
                return Err(load_err(
                    "device 'cuda' requested but tracklab was built without the 'cuda' feature"
                        .to_string(),
                ));
            }
        }
        Device::Cpu => {
            use ort::execution_providers::CPUExecutionProvider;
            builder
                .with_execution_providers([CPUExecutionProvider::default().build()])
                .map_err(|e| load_err(format!("failed to configure CPU provider: {}", e)))?
                .commit_from_file(model_path)
                .map_err(|e| load_err(format!("failed to load model: {}", e)))?
        }
    };

    Ok(session)
}

/// Check for a user-provided model path via environment variable
pub fn user_model_path() -> Option<PathBuf> {
    std::env::var("TRACKLAB_MODEL_PATH").ok().map(PathBuf::from)
}

/// Find the weights file by checking well-known locations
///
/// Search order:
/// 1. TRACKLAB_MODEL_PATH environment variable
/// 2. ProjectDirs cache: ~/.cache/tracklab/models/ (Linux)
/// 3. ProjectDirs data: ~/.local/share/tracklab/models/ (Linux)
/// 4. Current directory: ./models/
/// 5. Home directory: ~/tracklab/models/
///
/// Falls back to downloading into the cache directory when nothing exists.
pub fn find_model_path(spec: &ModelSpec) -> Result<PathBuf> {
    let filename = spec.filename;
    let mut checked: Vec<String> = Vec::new();

    if let Some(env_path) = user_model_path() {
        if env_path.exists() {
            return Ok(env_path);
        }
        checked.push(format!("TRACKLAB_MODEL_PATH={}", env_path.display()));
    }

    if let Some(proj_dirs) = ProjectDirs::from("com", "tracklab", "tracklab") {
        let cache_path = proj_dirs.cache_dir().join("models").join(filename);
        if cache_path.exists() {
            return Ok(cache_path);
        }
        checked.push(cache_path.display().to_string());

        let data_path = proj_dirs.data_dir().join("models").join(filename);
        if data_path.exists() {
            return Ok(data_path);
        }
        checked.push(data_path.display().to_string());
    }

    let cwd_path = PathBuf::from("./models").join(filename);
    if cwd_path.exists() {
        return Ok(cwd_path.canonicalize().unwrap_or(cwd_path));
    }
    checked.push(cwd_path.display().to_string());

    if let Some(base_dirs) = directories::BaseDirs::new() {
        let home_path = base_dirs
            .home_dir()
            .join("tracklab")
            .join("models")
            .join(filename);
        if home_path.exists() {
            return Ok(home_path);
        }
        checked.push(home_path.display().to_string());
    }

    debug!(
        "model {} not found locally (checked {}), downloading",
        spec.name,
        checked.join(", ")
    );
    ensure_model(spec)
}

/// Get the model cache directory, creating it if needed
fn model_cache_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "tracklab", "tracklab").ok_or_else(|| {
        TracklabError::ModelLoadError {
            reason: "could not determine cache directory".to_string(),
        }
    })?;

    let cache_dir = proj_dirs.cache_dir().join("models");
    fs::create_dir_all(&cache_dir).map_err(|e| TracklabError::ModelLoadError {
        reason: format!(
            "failed to create cache directory {}: {}",
            cache_dir.display(),
            e
        ),
    })?;

    Ok(cache_dir)
}

/// Download the weights if not already cached, verifying the checksum
pub fn ensure_model(spec: &ModelSpec) -> Result<PathBuf> {
    let model_path = model_cache_dir()?.join(spec.filename);

    if model_path.exists() {
        if verify_model_hash(&model_path, spec.sha256)? {
            debug!("model already cached at {}", model_path.display());
            return Ok(model_path);
        }
        warn!("cached model hash mismatch, re-downloading");
        fs::remove_file(&model_path).ok();
    }

    info!(
        "downloading {} weights (~{}MB)...",
        spec.name,
        spec.size_bytes / (1024 * 1024)
    );
    download_model(spec, &model_path)?;

    Ok(model_path)
}

/// Stream the weights to disk with a progress bar
fn download_model(spec: &ModelSpec, dest_path: &Path) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::io::{Read, Write};

    let download_err = |reason: String| TracklabError::ModelLoadError { reason };

    let response = reqwest::blocking::get(spec.url)
        .map_err(|e| download_err(format!("failed to download model: {}", e)))?;

    if !response.status().is_success() {
        return Err(download_err(format!(
            "model download failed with status: {}",
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(spec.size_bytes);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.set_message(format!("Downloading {} model...", spec.name));

    let mut file = fs::File::create(dest_path)
        .map_err(|e| download_err(format!("failed to create model file: {}", e)))?;

    let mut downloaded: u64 = 0;
    let mut reader = response;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| download_err(format!("failed to read model data: {}", e)))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| download_err(format!("failed to write model file: {}", e)))?;

        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }

    pb.finish_with_message("Download complete");
    info!("model downloaded to {}", dest_path.display());

    if !verify_model_hash(dest_path, spec.sha256)? {
        fs::remove_file(dest_path).ok();
        return Err(download_err(
            "downloaded model hash verification failed".to_string(),
        ));
    }

    Ok(())
}

/// Verify the SHA-256 hash of a weights file
fn verify_model_hash(path: &Path, expected_hash: &str) -> Result<bool> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let read_err = |reason: String| TracklabError::ModelLoadError { reason };

    let mut file = fs::File::open(path)
        .map_err(|e| read_err(format!("failed to open model for verification: {}", e)))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| read_err(format!("failed to read model for verification: {}", e)))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    let actual_hash = hex::encode(hasher.finalize());
    let matches = actual_hash == expected_hash;

    if !matches {
        warn!(
            "model hash mismatch: expected {}, got {}",
            expected_hash, actual_hash
        );
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lookup() {
        let spec = spec_for("htdemucs").unwrap();
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sources, &["drums", "bass", "other", "vocals"]);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let err = spec_for("spleeter").unwrap_err();
        assert!(err.to_string().contains("spleeter"));
    }

    #[test]
    fn test_hash_verification_detects_corruption() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("weights.ort");
        std::fs::write(&path, b"not the real weights").unwrap();

        let matches = verify_model_hash(&path, HTDEMUCS.sha256).unwrap();
        assert!(!matches);
    }
}
