//! Error types shared by every crate in the workspace.
//!
//! Callers branch on [`ErrorKind`]
//! (for example to pick an HTTP status) and log the `Display` output.

use thiserror::Error;

use crate::types::CatalogId;

/// Errors produced by the catalog client, the embedding gateway and the
/// pipeline built on top of them.
#[derive(Error, Debug)]
pub enum RecsError {
    /// HTTP or RPC connectivity failure, or a non-success status.
    ///
    /// `context` names the operation (and identifier or page) that failed.
    #[error("{context}: {message}")]
    Transport { context: String, message: String },

    /// A title search returned no results
    #[error("no results found for movie title: {0}")]
    NotFound(String),

    /// Caller input rejected before any network call
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Some records in an index build failed while others succeeded
    #[error("{failed} of {total} movies failed to index")]
    PartialFailure { failed: usize, total: usize },

    /// The operation was cancelled by its caller
    #[error("operation cancelled")]
    Cancelled,
}

/// Coarse classification of a [`RecsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    NotFound,
    InvalidArgument,
    PartialFailure,
    Cancelled,
}

impl RecsError {
    /// Build a transport error from any displayable cause.
    pub fn transport(context: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        RecsError::Transport {
            context: context.into(),
            message: cause.to_string(),
        }
    }

    /// Transport error for an operation on a single catalog entry.
    pub fn for_movie(operation: &str, id: CatalogId, cause: impl std::fmt::Display) -> Self {
        Self::transport(format!("{operation} failed for movie {id}"), cause)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RecsError::Transport { .. } => ErrorKind::Transport,
            RecsError::NotFound(_) => ErrorKind::NotFound,
            RecsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RecsError::PartialFailure { .. } => ErrorKind::PartialFailure,
            RecsError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Convenience type alias for Results in this workspace
pub type Result<T> = std::result::Result<T, RecsError>;
