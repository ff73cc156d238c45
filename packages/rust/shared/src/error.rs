//! Error types for VerseWeave.
//!
//! Library crates use [`VerseweaveError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all VerseWeave pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum VerseweaveError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Source archive extraction error.
    #[error("archive error: {0}")]
    Archive(String),

    /// USFM parsing error.
    #[error("usfm error: {message}")]
    Usfm { message: String },

    /// Malformed verse reference or reference span.
    #[error("bad reference {reference:?}: {message}")]
    Ref { reference: String, message: String },

    /// Mapping-table loading or format error.
    #[error("mapping error: {message}")]
    Mapping { message: String },

    /// A mapping entry names a verse address that no parsed record resolves.
    #[error("unresolved {tradition} reference {reference} (mapping row {row})")]
    UnresolvedRef {
        tradition: String,
        reference: String,
        row: usize,
    },

    /// CSV read/write error.
    #[error("csv error: {0}")]
    Csv(String),

    /// LaTeX generation or external-renderer error.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing stage input, schema mismatch, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, VerseweaveError>;

impl VerseweaveError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a USFM parse error from any displayable message.
    pub fn usfm(msg: impl Into<String>) -> Self {
        Self::Usfm {
            message: msg.into(),
        }
    }

    /// Create a bad-reference error.
    pub fn bad_ref(reference: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Ref {
            reference: reference.into(),
            message: msg.into(),
        }
    }

    /// Create a mapping-table error from any displayable message.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping {
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
}
