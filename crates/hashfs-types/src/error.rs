use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object location: {0}")]
    InvalidLocation(String),

    #[error("invalid block hash: {0}")]
    InvalidHash(String),

    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("block layout violated: {0}")]
    InvalidLayout(String),
}
