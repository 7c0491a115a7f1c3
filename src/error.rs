//! Error types for the Hideaway library
//!
//! This module defines all error types that can occur while publishing an
//! index or verifying a secret. Most conditions the pipeline tolerates
//! (malformed descriptors, a stray directory exit) are logged and skipped
//! rather than surfaced here; what remains is what genuinely stops a build.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the Hideaway library
pub type Result<T> = std::result::Result<T, HideawayError>;

/// Main error type for all Hideaway operations
#[derive(Debug, Error)]
pub enum HideawayError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// File watcher error from the notify crate
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// The persisted epoch record could not be read or decoded
    #[error("Epoch record unavailable at {path:?}: {reason}")]
    EpochRecordUnavailable {
        /// Path of the record that was expected
        path: PathBuf,
        /// What went wrong reading it
        reason: String,
    },

    /// Source root is missing or not a directory
    #[error("Source directory not found: {0:?}")]
    SourceNotFound(PathBuf),

    /// A secret-gated artifact was requested without a directory token
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Requested artifact does not exist in the published site
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Another build currently holds the build lock
    #[error("Build already in progress")]
    BuildInProgress,

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HideawayError {
    /// Create a configuration error with a custom message
    pub fn config(msg: impl Into<String>) -> Self {
        HideawayError::InvalidConfiguration(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        HideawayError::Internal(msg.into())
    }

    /// Check if this error is recoverable
    ///
    /// A recoverable error is one where retrying the same operation later
    /// can reasonably succeed without any change to inputs.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HideawayError::BuildInProgress | HideawayError::Watch(_))
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            HideawayError::EpochRecordUnavailable { path, .. } => {
                format!(
                    "No readable epoch record at {:?}. Run 'hideaway build' first so the record exists.",
                    path
                )
            }
            HideawayError::SourceNotFound(path) => {
                format!("Source directory {:?} does not exist. Pass --source with a valid directory.", path)
            }
            HideawayError::InvalidConfiguration(msg) if msg.contains("server key") => {
                format!("{}. Set HIDEAWAY_SECRET_KEY or pass --key.", self)
            }
            HideawayError::BuildInProgress => {
                "Another build is running against this output. Try again when it finishes.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
