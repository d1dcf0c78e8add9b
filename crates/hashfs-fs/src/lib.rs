//! File facade for hashfs.
//!
//! [`FileSystem`] offers `open`, `create`, `get_status`, `list`, `delete`,
//! `rename` and `mkdir` over any [`ObjectBackend`](hashfs_store::ObjectBackend).
//! Reads go block by block through the block store; writes are cut into
//! blocks locally and uploaded as one codec payload on close. Status queries
//! on a staged attempt directory drive the output commit.

pub mod config;
pub mod error;
pub mod fs;
pub mod reader;
pub mod staging;
pub mod writer;

pub use config::{FsConfig, RetryConfig, DEFAULT_STATUS_BLOCK_SIZE};
pub use error::{FsError, FsResult};
pub use fs::{parse_last_modified, FileSystem, DIRECTORY_CONTENT_TYPE};
pub use reader::BlockReader;
pub use staging::{StagedWrites, WriteState};
pub use writer::BlockWriter;
