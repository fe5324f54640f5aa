//! Error types for office-to-pdf conversion.
//!
//! [`EngineError`] covers everything that can go wrong below the processor:
//! locating and driving LibreOffice, filesystem work, configuration. The
//! processor never returns it directly; it folds every failure into a
//! [`ProcessError`] carrying one of the four stable [`ErrorKind`]s.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a conversion engine or while configuring one.
#[derive(Error, Debug)]
pub enum EngineError {
    /// LibreOffice is not installed or not found in PATH.
    #[error("LibreOffice not found. Please install LibreOffice and ensure 'soffice' is in PATH")]
    LibreOfficeNotFound,

    /// LibreOffice process failed to start.
    #[error("Failed to start LibreOffice process: {0}")]
    ProcessStartFailed(#[source] std::io::Error),

    /// LibreOffice ran but reported a failure.
    #[error("LibreOffice conversion failed for '{name}': {message}")]
    ConversionFailed { name: String, message: String },

    /// LibreOffice exited cleanly but left no PDF behind.
    #[error("LibreOffice produced no PDF for '{name}'")]
    OutputMissing { name: String },

    /// `convert_to_pdf` was called before `initialize` completed.
    #[error("Conversion engine '{0}' is not initialized")]
    NotReady(String),

    /// Filesystem operation failed.
    #[error("{context} '{path}': {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by a third-party engine implementation.
    #[error("{0}")]
    Engine(String),
}

impl EngineError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The fixed failure taxonomy surfaced to callers of
/// [`Processor::process`](crate::Processor::process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Wrong file count, or the file exceeds the size limit.
    InvalidOptions,
    /// Extension outside the family whitelist.
    FileTypeInvalid,
    /// Cancellation observed at a checkpoint.
    ProcessingCancelled,
    /// Engine initialization or conversion failed, including timeout.
    ProcessingFailed,
}

impl ErrorKind {
    /// Stable wire code, e.g. `INVALID_OPTIONS`.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidOptions => "INVALID_OPTIONS",
            ErrorKind::FileTypeInvalid => "FILE_TYPE_INVALID",
            ErrorKind::ProcessingCancelled => "PROCESSING_CANCELLED",
            ErrorKind::ProcessingFailed => "PROCESSING_FAILED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Structured failure returned from a `process` call.
///
/// `message` is stable and meant for display; `detail` keeps the underlying
/// error text for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProcessError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProcessError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn invalid_options(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOptions, message)
    }

    pub(crate) fn file_type_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FileTypeInvalid, message)
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(ErrorKind::ProcessingCancelled, "Conversion was cancelled")
    }

    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProcessingFailed, message)
    }
}
