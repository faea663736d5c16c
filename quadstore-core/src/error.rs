//! Error types for quadstore-core

use std::fmt;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed input from a statement stream.
///
/// Produced by format parsers; `line` is 1-based when the parser tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: Option<u64>,
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(line: u64, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Durable read/write failure in the underlying key-value store
    #[error("Storage I/O failure: {0}")]
    StorageIo(String),

    /// Surrogate id or value not present in the dictionary
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input from a statement stream
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Constraint violation vetoing a commit
    #[error("Validation failure: {0}")]
    Validation(String),

    /// Statement violates the value model (e.g. literal subject)
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    /// Stored key or value bytes could not be decoded
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// Invalid index permutation name
    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    /// Invalid store configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a storage I/O error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::StorageIo(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create an invalid statement error
    pub fn invalid_statement(msg: impl Into<String>) -> Self {
        Error::InvalidStatement(msg.into())
    }

    /// Create a corrupt data error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Create an invalid index error
    pub fn invalid_index(msg: impl Into<String>) -> Self {
        Error::InvalidIndex(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// True for failures of the durable storage layer
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::StorageIo(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::StorageIo(err.into_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}
