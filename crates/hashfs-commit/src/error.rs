use hashfs_types::ObjectLocation;
use thiserror::Error;

/// Errors that stop a commit before any file is moved.
///
/// A failed move of one file is not an error here; it is recorded in the
/// [`CommitReport`](crate::CommitReport) and the remaining files are still
/// attempted.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("{location} is not below a {segment} directory")]
    NotAnAttemptPath {
        location: ObjectLocation,
        segment: String,
    },

    #[error("cannot list attempt directory {location}: {reason}")]
    Listing {
        location: ObjectLocation,
        reason: String,
    },
}

pub type CommitResult<T> = Result<T, CommitError>;
