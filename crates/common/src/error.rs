//! Error types shared across Clipburn crates.

use std::path::PathBuf;

/// Top-level error type for Clipburn operations.
///
/// Variants follow the render failure taxonomy: request validation, asset
/// generation, graph invariants, and the external engine. Cleanup failures
/// are never surfaced through this type; they are logged instead.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("Asset error: {message}")]
    Asset { message: String },

    #[error("Filter graph error: {message}")]
    Graph { message: String },

    #[error("Render engine failed: {message}")]
    Engine {
        message: String,
        /// Captured diagnostic output (stderr) of the engine process.
        diagnostics: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Render cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClipError.
pub type ClipResult<T> = Result<T, ClipError>;

impl ClipError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset {
            message: msg.into(),
        }
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph {
            message: msg.into(),
        }
    }

    pub fn engine(msg: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::Engine {
            message: msg.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Captured engine output, for engine failures.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Engine { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    /// Whether the failure was detected before any rendering work began.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
