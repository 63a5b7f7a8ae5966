//! Error types for the library engine.
//!
//! Nothing here is fatal to the process. Every variant carries enough context
//! (path, operation) for the caller to report the failure and retry.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A record could not be ingested (missing path, unreadable tags).
    #[error("cannot ingest `{path}`: {reason}")]
    Ingest { path: PathBuf, reason: String },

    /// Rating update or lookup against a path the catalog does not know.
    #[error("{operation}: no track with path `{path}`")]
    NotFound {
        path: PathBuf,
        operation: &'static str,
    },

    /// The audio transport refused the file (unreadable, unsupported codec).
    #[error("transport failed on `{path}`: {reason}")]
    Transport { path: PathBuf, reason: String },

    /// Sub-score outside 0..=10.
    #[error("sub-score `{field}` must be within 0..=10, got {value}")]
    InvalidScore { field: &'static str, value: i64 },

    #[error("playlist index {index} out of range for {len} entries")]
    InvalidIndex { index: usize, len: usize },

    #[error("playlist is empty")]
    EmptyPlaylist,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// A catalog lock was poisoned by a panicking writer.
    #[error("catalog lock poisoned during {0}")]
    Lock(&'static str),
}

impl Error {
    pub fn ingest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Ingest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(path: impl Into<PathBuf>, operation: &'static str) -> Self {
        Self::NotFound {
            path: path.into(),
            operation,
        }
    }

    pub fn transport(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Transport {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for the "operation did not complete, state unchanged" class of
    /// errors a UI should show as a notice rather than a failure dialog.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Ingest { .. } | Self::NotFound { .. } | Self::Transport { .. }
        )
    }
}

/// Convenience Result type using the engine's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
