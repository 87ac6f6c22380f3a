//! Error types for the HR assistant.
//!
//! Library crates use [`AssistantError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all assistant operations.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// An external gateway (LLM, index, facts) is down, timed out, or answered garbage.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// The record store could not durably read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// A validation decision targeted an unknown record.
    #[error("validation {id} not found")]
    NotFound { id: String },

    /// The caller lacks the role or ownership required for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (malformed id, empty document, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AssistantError>;

impl AssistantError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an input validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error for a validation id.
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the boundary should report this as "service unavailable".
    ///
    /// A failed validation enqueue lands here: the obligation to review the
    /// answer could not be recorded, so the query must not look successful.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
