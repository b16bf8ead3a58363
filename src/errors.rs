//! Error types for the daybook persistence core.
//!
//! Every backend-specific failure is wrapped into [`DaybookError`] before it
//! leaves a backend, and every variant classifies into exactly one
//! [`ErrorKind`] so callers can branch without knowing which backend is active.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// The four kinds of failure a storage operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A lookup by id or name matched nothing.
    NotFound,
    /// A duplicate id on create or a duplicate unique name.
    Conflict,
    /// Empty content or a malformed id/name.
    Validation,
    /// Any underlying I/O, parse or database failure.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
        };
        f.write_str(name)
    }
}

/// The main error type for the daybook library.
#[derive(Error, Debug)]
pub enum DaybookError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to JSON serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors while encoding or decoding a record header.
    #[error("Header error: {0}")]
    Header(#[from] serde_yaml::Error),

    /// Errors reported by the embedded database.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A record was not found when performing an operation.
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// A record with the same id or unique name already exists.
    #[error("{what} already exists: {key}")]
    Conflict { what: &'static str, key: String },

    /// Input failed validation.
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// A stored timestamp could not be parsed.
    #[error("Invalid timestamp {value}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A stored record could not be parsed.
    #[error("Corrupt record {path}: {message}")]
    CorruptRecord { path: PathBuf, message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },
}

impl DaybookError {
    /// Classifies this error into one of the four storage-boundary kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DaybookError::NotFound { .. } => ErrorKind::NotFound,
            DaybookError::Conflict { .. } => ErrorKind::Conflict,
            DaybookError::Validation { .. } => ErrorKind::Validation,
            DaybookError::Io(_)
            | DaybookError::Serialization(_)
            | DaybookError::Header(_)
            | DaybookError::Database(_)
            | DaybookError::Timestamp { .. }
            | DaybookError::CorruptRecord { .. }
            | DaybookError::DirectoryError { .. }
            | DaybookError::ConfigError { .. }
            | DaybookError::LockAcquisitionFailed { .. } => ErrorKind::Storage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub(crate) fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        DaybookError::NotFound {
            what,
            key: key.into(),
        }
    }

    pub(crate) fn conflict(what: &'static str, key: impl Into<String>) -> Self {
        DaybookError::Conflict {
            what,
            key: key.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DaybookError::Validation {
            message: message.into(),
        }
    }
}
