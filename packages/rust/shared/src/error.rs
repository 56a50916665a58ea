//! Error types for the courseforge publish pipeline.
//!
//! Library crates use [`PublishError`] via `thiserror`. Every variant except
//! [`PublishError::Prune`] is fatal to the current run; prune problems are
//! recovered locally because store hygiene is eventually consistent.

use std::path::PathBuf;

/// Top-level error type for all publish pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Course data could not be fetched from its source.
    #[error("course data fetch failed: {0}")]
    DataFetch(String),

    /// Course data failed validation before the build.
    #[error("course validation failed: {message}")]
    Validation { message: String },

    /// Theme or menu materialization error.
    #[error("theme apply failed: {0}")]
    ThemeApply(String),

    /// External builder failed: non-zero exit, or stderr-only output with
    /// exit 0 (treated as failure by policy).
    #[error("build failed: {0}")]
    Build(String),

    /// Archive stream error while packaging the build output.
    #[error("packaging failed: {0}")]
    Packaging(String),

    /// Staging or manifest I/O error while publishing a release.
    #[error("release publish failed: {0}")]
    ReleasePublish(String),

    /// Store cleanup error. Non-fatal: the run still reports success and a
    /// later successful prune converges the store.
    #[error("prune failed: {0}")]
    Prune(String),

    /// A publish is already in flight for this course.
    #[error("a publish is already in flight for course {course_id}")]
    InFlight { course_id: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PublishError>;

impl PublishError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a release publish error carrying the failing path.
    pub fn release(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        Self::ReleasePublish(format!("{}: {source}", path.display()))
    }

    /// Whether this error aborts the current run. Only prune failures are
    /// recovered locally.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Prune(_))
    }
}
