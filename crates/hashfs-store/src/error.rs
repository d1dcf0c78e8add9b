use std::time::Duration;

use hashfs_types::{BlockHash, ByteRange, ObjectLocation};
use thiserror::Error;

/// Errors raised by a backend collaborator.
///
/// `NotFound` is kept apart from transport failures so callers can test for
/// absence without inspecting response bodies.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unsatisfiable range {header} for {size} byte object")]
    UnsatisfiableRange { header: String, size: u64 },

    #[error("payload error: {0}")]
    Codec(#[from] hashfs_codec::CodecError),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Timeout { .. } => true,
            Self::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Errors from block store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad arithmetic inputs to block addressing. Always a caller bug.
    #[error("invalid block range: {0}")]
    InvalidRange(String),

    #[error("block {hash} not found in {location}")]
    BlockNotFound {
        location: ObjectLocation,
        hash: BlockHash,
    },

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectLocation),

    #[error("metadata unavailable for {location}: {reason}")]
    MetadataUnavailable { location: String, reason: String },

    #[error("offset {offset} outside block range {range}")]
    OffsetOutOfRange { offset: u64, range: ByteRange },

    #[error("block digest mismatch: expected {expected}, computed {computed}")]
    IntegrityMismatch {
        expected: BlockHash,
        computed: BlockHash,
    },

    #[error("short read for {range}: got {actual} bytes")]
    ShortRead { range: ByteRange, actual: u64 },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    pub fn metadata(location: impl ToString, reason: impl Into<String>) -> Self {
        Self::MetadataUnavailable {
            location: location.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that mean "nothing there".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ObjectNotFound(_) | Self::BlockNotFound { .. } => true,
            Self::Backend(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
