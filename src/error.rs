//! Error types and handling infrastructure for logweave.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types, with helper constructors so call sites stay terse.
//!
//! The indexing engine distinguishes recoverable file-level conditions (a file
//! vanished mid-session, a format parser rejected new bytes, lines arrived out
//! of order) from operational failures. The recoverable conditions map onto
//! rebuild decisions rather than bubbling out of `rebuild_index`; the variants
//! here exist so collaborators can surface them to the user.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for logweave operations.
#[derive(Error, Debug)]
pub enum LogweaveError {
    /// File system related errors (file not found, permission denied, etc.)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// A log file was removed or rotated away mid-session.
    #[error("File vanished: {path}")]
    FileVanished { path: PathBuf },

    /// The format parser could not interpret newly observed bytes.
    #[error("File content not parseable: {message}")]
    FileInvalid { message: String },

    /// Newly observed lines predate the tail of the merged index.
    #[error("Out-of-order lines detected in {filename}")]
    ReOrderDetected { filename: String },

    /// A search pattern failed to compile, even after literal quoting.
    #[error("Search pattern could not be compiled: {message}")]
    RegexCompileFailed { message: String },

    /// Search operation errors
    #[error("Search operation failed: {message}")]
    SearchError { message: String },

    /// A row or line reference that does not resolve.
    #[error("Line reference out of bounds: {message}")]
    LineOutOfBounds { message: String },

    /// Rendering a view row failed.
    #[error("Render operation failed: {message}")]
    RenderError { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for logweave operations.
pub type Result<T> = std::result::Result<T, LogweaveError>;

impl LogweaveError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a FileInvalid error with a descriptive message
    pub fn file_invalid(message: impl Into<String>) -> Self {
        Self::FileInvalid {
            message: message.into(),
        }
    }

    /// Create a SearchError with a descriptive message
    pub fn search(message: impl Into<String>) -> Self {
        Self::SearchError {
            message: message.into(),
        }
    }

    /// Create a LineOutOfBounds error with a descriptive message
    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::LineOutOfBounds {
            message: message.into(),
        }
    }

    /// Create a RenderError with a descriptive message
    pub fn render(message: impl Into<String>) -> Self {
        Self::RenderError {
            message: message.into(),
        }
    }

    /// Create a generic Other error with a descriptive message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

// Automatic conversion from io::Error to LogweaveError
impl From<std::io::Error> for LogweaveError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}
