use serde::{Deserialize, Serialize};

use crate::location::ObjectLocation;

/// Content types the backend uses for directory marker objects.
pub const DIRECTORY_CONTENT_TYPES: &[&str] = &["application/directory", "application/folder"];

/// Returns `true` if `content_type` marks a directory. Parameters such as
/// `; charset=utf-8` are ignored.
pub fn is_directory_content_type(content_type: &str) -> bool {
    DIRECTORY_CONTENT_TYPES
        .iter()
        .any(|dir| content_type.contains(dir))
}

/// What the file facade reports for a path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub location: ObjectLocation,
    pub is_directory: bool,
    /// Length in bytes; always 0 for directories.
    pub size: u64,
    pub block_size: u64,
    /// Last modification as milliseconds since the Unix epoch, when known.
    pub modification_time: Option<i64>,
}

impl FileStatus {
    pub fn directory(location: ObjectLocation, block_size: u64) -> Self {
        Self {
            location,
            is_directory: true,
            size: 0,
            block_size,
            modification_time: None,
        }
    }

    pub fn file(
        location: ObjectLocation,
        size: u64,
        block_size: u64,
        modification_time: Option<i64>,
    ) -> Self {
        Self {
            location,
            is_directory: false,
            size,
            block_size,
            modification_time,
        }
    }
}
