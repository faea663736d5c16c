//! Error types for query execution

use thiserror::Error;

/// Query execution errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// Error from quadstore-core
    #[error("Core error: {0}")]
    Core(#[from] quadstore_core::Error),

    /// Federation member unreachable or failing
    #[error("Resolver failure for <{endpoint}>: {message}")]
    Resolver { endpoint: String, message: String },

    /// Consumer closed the evaluation before exhaustion
    #[error("Evaluation cancelled")]
    Cancelled,

    /// Invalid query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Operator not opened
    #[error("Operator not opened - call open() before next()")]
    OperatorNotOpened,

    /// Operator already opened
    #[error("Operator already opened")]
    OperatorAlreadyOpened,

    /// Operator is closed
    #[error("Operator is closed")]
    OperatorClosed,
}

impl QueryError {
    pub fn resolver(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::Resolver {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        QueryError::InvalidQuery(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled)
    }
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
