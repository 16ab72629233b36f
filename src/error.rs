//! # Error Handling
//!
//! Two channels leave the batch processor. Recoverable outcomes travel as
//! [`BatchOutcome`](crate::orchestration::BatchOutcome) values carrying a
//! [`BatchFailure`]; anything that must stop the run is a [`FatalError`].
//! They are kept as separate types because the recovery policy depends on
//! which operation failed, not on what the failure looked like.

use crate::geo::{Area, SplitError};
use crate::models::EntityRef;
use crate::remote::RemoteError;
use crate::source::CompileError;
use std::fmt;
use thiserror::Error;

/// Errors that terminate the run
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("Database error: {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("Remote API error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Failed to redact {target}: {source}")]
    RedactionFailed {
        target: EntityRef,
        #[source]
        source: RemoteError,
    },

    #[error("Area too small to split: {0}")]
    AreaTooSmall(#[from] SplitError),

    #[error("Invalid redaction ids: hidden={hidden} visible={visible}")]
    InvalidRedactionIds { hidden: i64, visible: i64 },

    #[error("Change compiler failed: {0}")]
    Compile(#[from] CompileError),

    #[error("Unhandled map response {status} for {area}: {body}")]
    UnexpectedMapResponse { area: Area, status: u16, body: String },

    #[error("Malformed map response for {area}: {message}")]
    MapParse { area: Area, message: String },
}

impl FatalError {
    /// Wrap a database error with the operation that hit it
    pub fn database(operation: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::Database {
            operation: operation.into(),
            message: error.to_string(),
        }
    }
}

/// Where inside a batch things went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    OpenChangeset,
    UploadChangeset,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStage::OpenChangeset => f.write_str("open changeset"),
            BatchStage::UploadChangeset => f.write_str("upload changeset"),
        }
    }
}

/// A recoverable batch failure. Chunks before `chunk` stay applied remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub stage: BatchStage,
    /// 1-based index of the failing chunk
    pub chunk: usize,
    pub chunk_count: usize,
    pub reason: String,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed on chunk {}/{}: {}",
            self.stage, self.chunk, self.chunk_count, self.reason
        )
    }
}

pub type Result<T> = std::result::Result<T, FatalError>;
