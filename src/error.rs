//! Unified error types for tracklab
//!
//! Error strategy: every failure aborts the analysis and propagates to the
//! caller unmodified. The pipeline performs no retries and never returns a
//! partial result; mapping errors to user-facing responses and cleaning up
//! half-written session state is the caller's job.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for tracklab operations
#[derive(Debug, Error)]
pub enum TracklabError {
    /// No decode strategy could read the file. The reason lists every
    /// attempted strategy with its individual failure.
    #[error("failed to decode audio file '{path}': {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("resampling failed: {reason}")]
    ResampleError { reason: String },

    /// Separation model weights are missing, corrupt, or unreachable, or
    /// the requested device could not be initialized.
    #[error("failed to load separation model: {reason}")]
    ModelLoadError { reason: String },

    /// Device or runtime failure during the separation forward pass.
    #[error("model inference failed: {reason}")]
    InferenceError { reason: String },

    #[error("cannot write output to '{path}': {reason}")]
    OutputError { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tracklab operations
pub type Result<T> = std::result::Result<T, TracklabError>;

impl TracklabError {
    /// Create a decode error with context about the issue
    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TracklabError::DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, translating common IO failures into
    /// actionable messages
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!(
                    "permission denied, check write access to {}",
                    path.display()
                )
            }
            std::io::ErrorKind::NotFound => {
                format!(
                    "directory does not exist: {}",
                    path.parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                )
            }
            _ => err.to_string(),
        };
        TracklabError::OutputError { path, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_lists_path_and_reason() {
        let err = TracklabError::decode_error("/tmp/track.mp3", "wav: bad header; symphonia: eof");
        let message = err.to_string();
        assert!(message.contains("/tmp/track.mp3"));
        assert!(message.contains("wav: bad header"));
        assert!(message.contains("symphonia: eof"));
    }

    #[test]
    fn test_output_error_permission_denied() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TracklabError::output_error("/srv/out/vocals.wav", io_err);
        assert!(err.to_string().contains("permission denied"));
    }
}
