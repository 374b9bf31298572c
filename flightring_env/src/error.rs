//! Error types for the FlightRing storage layer.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading or writing trial storage.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Filesystem operation failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `.npy` file is truncated, has an unsupported dtype or a bad header
    #[error("Malformed array file {}: {reason}", path.display())]
    MalformedArray { path: PathBuf, reason: String },

    /// A simulator log parsed as JSON but does not have the expected shape
    #[error("Malformed log {}: {reason}", path.display())]
    MalformedLog { path: PathBuf, reason: String },

    /// JSON decoding failed
    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Participant directory has no trial index file
    #[error("No trial index for participant '{participant}' (run reindex)")]
    MissingIndex { participant: String },

    /// Trial number outside the participant's index
    #[error("Trial {trial} not found for participant '{participant}'")]
    TrialNotFound { participant: String, trial: u32 },

    /// Directory layout does not match `<name>/<name>-<k>`
    #[error("Invalid trial layout for '{participant}': {reason}")]
    InvalidLayout { participant: String, reason: String },
}

impl EnvError {
    /// Creates an I/O error tagged with the path it concerns.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a malformed-array error.
    pub fn malformed_array(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::MalformedArray {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed-log error.
    pub fn malformed_log(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::MalformedLog {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Creates a JSON error.
    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
