//! Foundation types for hashfs.
//!
//! hashfs exposes a byte-stream file API over an object store that keeps
//! every object as an ordered list of fixed-size, content-addressed blocks.
//! Every other hashfs crate depends on `hashfs-types`.
//!
//! # Key Types
//!
//! - [`ObjectLocation`]: container plus backend-relative object name
//! - [`BlockHash`] / [`HashAlgorithm`]: block content digests
//! - [`ByteRange`]: inclusive byte span of an object
//! - [`Block`]: immutable block payload tagged with its hash
//! - [`StoredObject`]: object name, block size and ordered blocks
//! - [`FileStatus`]: what the file facade reports for a path

pub mod block;
pub mod error;
pub mod hash;
pub mod location;
pub mod object;
pub mod range;
pub mod status;

pub use block::Block;
pub use error::TypeError;
pub use hash::{BlockHash, HashAlgorithm};
pub use location::ObjectLocation;
pub use object::StoredObject;
pub use range::ByteRange;
pub use status::{is_directory_content_type, FileStatus, DIRECTORY_CONTENT_TYPES};
