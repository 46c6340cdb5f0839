//! Error types for the experiment tracking API

use thiserror::Error;

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by the checkpoint client and the experiments facade
#[derive(Error, Debug)]
pub enum Error {
    // Repository errors
    #[error("Repository not found: no '.dvc' directory in {path} or any parent")]
    RepositoryNotFound { path: String },

    #[error("Failed to open repository at {location}: {message}")]
    RepositoryOpen { location: String, message: String },

    // Experiment errors
    #[error("Experiment '{name}' already exists (use force to overwrite)")]
    ExperimentExists { name: String },

    #[error("Unknown revision: {rev}")]
    RevisionNotFound { rev: String },

    #[error("Ambiguous revision '{rev}' matches {candidates:?}")]
    AmbiguousRevision { rev: String, candidates: Vec<String> },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Returns true if the failure may go away on its own (remote hiccups).
    ///
    /// Nothing in this workspace retries automatically; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RepositoryOpen { .. })
    }

    /// Returns true if this error indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::RepositoryNotFound { .. }
                | Error::Io(_)
                | Error::InvalidConfig { .. }
                | Error::Internal { .. }
        )
    }

    /// Returns true if the caller can fix the request and try again
    /// (a different experiment name, or `force`).
    pub fn is_recoverable_by_caller(&self) -> bool {
        matches!(self, Error::ExperimentExists { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
