// Handler error types
// The single place domain failures are mapped to HTTP status codes

use hyper::StatusCode;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum BoardError {
    /// Body unparseable or a required field missing
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Well-formed request the board refuses (empty content, bad username)
    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    /// Persistence failed; `context` is all the client gets to see
    #[error("{context}: {source}")]
    StorageFailure {
        context: &'static str,
        #[source]
        source: StorageError,
    },
}

impl BoardError {
    pub const fn storage(context: &'static str, source: StorageError) -> Self {
        Self::StorageFailure { context, source }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) | Self::ValidationFailure(_) => StatusCode::BAD_REQUEST,
            Self::StorageFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client
    pub fn public_message(&self) -> &str {
        match self {
            Self::MalformedRequest(msg) | Self::ValidationFailure(msg) => msg,
            Self::StorageFailure { context, .. } => context,
        }
    }
}
