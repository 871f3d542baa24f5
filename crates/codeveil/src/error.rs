//! Error types for codeveil.
//!
//! This module defines all error types used throughout the codeveil crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for codeveil operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A directory named in the project configuration does not exist.
    #[error("configured directory '{name}' not found at {path}")]
    MissingDirectory {
        /// Directory name as written in the project configuration.
        name: String,
        /// Resolved path that was checked.
        path: PathBuf,
    },

    // === Redaction Errors ===
    /// A structural marker expected after a trigger line was never found.
    #[error(
        "malformed input in {file}: trigger '{trigger}' on line {line} has no closing '{marker}' before end of input"
    )]
    MalformedInput {
        /// File being redacted.
        file: PathBuf,
        /// Trigger pattern that matched.
        trigger: String,
        /// 1-based line number of the trigger match.
        line: usize,
        /// The marker that could not be located.
        marker: String,
    },

    // === Export Errors ===
    /// The rendering engine failed to produce a document.
    #[error("failed to export {document}: {message}")]
    Export {
        /// Markup document being exported.
        document: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// No rendering engine binary could be located.
    #[error("no headless browser found (tried: {tried}); set render.browser in the configuration")]
    BrowserNotFound {
        /// Comma-separated list of candidates that were tried.
        tried: String,
    },

    // === Archive Errors ===
    /// Packaging the output tree failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a source file.
    #[error("failed to read {path}: {source}")]
    SourceRead {
        /// Path of the source file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for codeveil operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new export error for the given markup document.
    #[must_use]
    pub fn export(document: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Export {
            document: document.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error belongs to the configuration class.
    ///
    /// Configuration errors abort a run before any output is written.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } | Self::MissingDirectory { .. }
        )
    }

    /// Check if this error is a malformed input error.
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedInput { .. })
    }

    /// Check if this error came from the rendering engine.
    #[must_use]
    pub fn is_export_error(&self) -> bool {
        matches!(
            self,
            Self::Export { .. } | Self::BrowserNotFound { .. } | Self::Timeout { .. }
        )
    }
}
