//! Error types for the entry store.

use thiserror::Error;

/// An entry shape that cannot be turned into a usable [`Entry`](crate::Entry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Title missing or blank after trimming
    #[error("entry title cannot be empty")]
    EmptyTitle,

    /// Chapter value is NaN or infinite
    #[error("chapter must be a finite number, got {0}")]
    NonFiniteChapter(String),
}

/// An import file or stored value that does not look like a collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Input is not valid JSON
    #[error("invalid file format: {0}")]
    Parse(String),

    /// Top-level value is not an object
    #[error("invalid file format: expected an object, found {0}")]
    NotAnObject(&'static str),

    /// Top-level object has no `entries` list
    #[error("invalid file format: missing `entries` list")]
    MissingEntries,
}

/// Failure of the persistent key-value backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// I/O error while reading or writing the backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend refused the operation
    #[error("backend error for key {key}: {message}")]
    Backend { key: String, message: String },
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Serialization(e.to_string())
    }
}

/// Errors surfaced by tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
