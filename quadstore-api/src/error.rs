//! Error types for the quadstore API

use thiserror::Error;

/// API errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Storage, dictionary, parse or validation failure
    #[error(transparent)]
    Core(#[from] quadstore_core::Error),

    /// Evaluation failure
    #[error(transparent)]
    Query(#[from] quadstore_query::QueryError),

    /// Operation not valid in the connection's transaction state
    #[error("Transaction state: {0}")]
    TransactionState(String),

    /// Connection was closed
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Repository was shut down
    #[error("Repository is shut down")]
    RepositoryClosed,
}

impl ApiError {
    pub fn transaction_state(msg: impl Into<String>) -> Self {
        ApiError::TransactionState(msg.into())
    }

    /// True for a commit vetoed by the validation hook
    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Core(quadstore_core::Error::Validation(_)))
    }

    /// True for malformed input from a statement stream
    pub fn is_parse(&self) -> bool {
        matches!(self, ApiError::Core(quadstore_core::Error::Parse(_)))
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
