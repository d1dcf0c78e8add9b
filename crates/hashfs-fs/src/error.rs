use hashfs_types::ObjectLocation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(ObjectLocation),

    #[error("is a directory: {0}")]
    IsADirectory(ObjectLocation),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(ObjectLocation),

    #[error("cannot rename across containers: {source_location} -> {destination}")]
    CrossContainer {
        source_location: ObjectLocation,
        destination: ObjectLocation,
    },

    #[error("writer for {0} is already closed")]
    WriterClosed(ObjectLocation),

    #[error("invalid path: {0}")]
    Path(#[from] hashfs_types::TypeError),

    #[error("store error: {0}")]
    Store(#[from] hashfs_store::StoreError),

    #[error("backend error: {0}")]
    Backend(#[from] hashfs_store::BackendError),

    #[error("codec error: {0}")]
    Codec(#[from] hashfs_codec::CodecError),

    #[error("commit error: {0}")]
    Commit(#[from] hashfs_commit::CommitError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Store(e) => e.is_not_found(),
            Self::Backend(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<FsError> for std::io::Error {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Io(e) => e,
            other if other.is_not_found() => {
                std::io::Error::new(std::io::ErrorKind::NotFound, other)
            }
            other => std::io::Error::other(other),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
