//! Error types for the poolwatch engine

use std::fmt;

use poolwatch_core::JobId;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the wire decoder
#[derive(Debug, Error)]
pub enum ParseError {
    /// An element outside the ad grammar
    #[error("Unsupported element <{0}>")]
    UnknownElement(String),

    /// `<a>` without its `n` attribute
    #[error("Attribute element without a name at byte {position}")]
    MissingName { position: u64 },

    /// Text of an `<i>` element is not an integer
    #[error("Invalid integer '{text}' for attribute {attribute}")]
    InvalidInteger { attribute: String, text: String },

    /// Text of an `<r>` element is not a real
    #[error("Invalid real '{text}' for attribute {attribute}")]
    InvalidReal { attribute: String, text: String },

    /// The XML itself is not well formed
    #[error("Malformed document at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    /// Input ended while an element was still open
    #[error("Document ended inside <{0}>")]
    Truncated(String),
}

/// Failures of a single backend invocation
#[derive(Debug, Error)]
pub enum BackendError {
    /// The external tool could not be started
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool exited unsuccessfully
    #[error("{program} exited with status {code}: {stderr}")]
    ExitStatus {
        program: String,
        code: i32,
        stderr: String,
    },

    /// The tool's output could not be decoded
    #[error("Failed to decode output: {0}")]
    Decode(#[from] ParseError),

    /// The native binding raised an error
    #[error("{0}")]
    Binding(String),

    /// The selected backend cannot perform the operation
    #[error("{0}")]
    Unsupported(String),
}

impl BackendError {
    pub fn binding(message: impl Into<String>) -> Self {
        Self::Binding(message.into())
    }
}

/// The `(job, attribute, value)` triple an edit batch failed on, if known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEdit(pub Option<(JobId, String, String)>);

impl fmt::Display for FailedEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some((job, attribute, value)) => write!(f, "{}/{}/{}", job, attribute, value),
            None => write!(f, "unknown/unknown/unknown"),
        }
    }
}

/// A failed query or edit, with everything needed to reproduce it
#[derive(Debug, Error)]
pub enum QueryError {
    /// A fetch failed in either backend
    #[error(
        "Error executing query against {target} with constraint {constraint} and format {format}: {source}"
    )]
    Fetch {
        target: String,
        constraint: String,
        format: String,
        #[source]
        source: BackendError,
    },

    /// A bulk edit batch was aborted
    #[error("Error editing jobs on schedd {schedd} in pool {pool} (job/attr/val {failed}): {source}")]
    Edit {
        schedd: String,
        pool: String,
        failed: FailedEdit,
        #[source]
        source: BackendError,
    },
}

impl QueryError {
    /// The underlying backend failure
    pub fn backend_error(&self) -> &BackendError {
        match self {
            Self::Fetch { source, .. } | Self::Edit { source, .. } => source,
        }
    }
}

/// Errors that can occur when using the engine
#[derive(Debug, Error)]
pub enum Error {
    /// A backend invocation failed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A document handed directly to the decoder was malformed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A named schedd or record is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller violated an API precondition
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Configuration could not be loaded or is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error is a precondition violation
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    /// Check if this error wraps a backend failure
    pub fn is_query_error(&self) -> bool {
        matches!(self, Self::Query(_))
    }
}
