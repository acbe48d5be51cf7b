//! Error types shared across Reelforge crates.

use std::path::PathBuf;

/// Top-level error type for Reelforge operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelforgeError {
    #[error("Timeline error: {message}")]
    Timeline { message: String },

    #[error("Build error: {message}")]
    Build { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A required external tool is missing or unexecutable. The message
    /// carries remediation instructions for the user.
    #[error("Environment error: {message}")]
    Environment { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("{program} exited with status {code}: {detail}")]
    CommandFailed {
        program: String,
        code: i32,
        detail: String,
    },

    /// An external process exceeded the caller-supplied timeout and was
    /// terminated. Distinct from `CommandFailed`: it indicates a hang,
    /// not a deterministic rejection.
    #[error("{program} timed out after {seconds:.1}s")]
    Timeout { program: String, seconds: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelforgeError.
pub type ReelforgeResult<T> = Result<T, ReelforgeError>;

impl ReelforgeError {
    pub fn timeline(msg: impl Into<String>) -> Self {
        Self::Timeline {
            message: msg.into(),
        }
    }

    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn environment(msg: impl Into<String>) -> Self {
        Self::Environment {
            message: msg.into(),
        }
    }

    /// True for caller-input errors that should never be retried.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Timeline { .. } | Self::Build { .. } | Self::Config { .. }
        )
    }
}
