//! Block-level access to a content-hashed object store.
//!
//! The backend keeps each object as an ordered list of fixed-size blocks
//! named by their digest. This crate turns "give me block `h` of object `o`"
//! into an exact byte range and a single range read.
//!
//! # Layers
//!
//! - [`address`]: pure block range arithmetic
//! - [`BlockHashIndex`]: ordered block hashes of one object
//! - [`HashmapSnapshot`]: one parsed hashmap metadata response
//! - [`BlockStore`]: block, offset and span reads
//! - [`ObjectBackend`]: the collaborator boundary; [`MemoryBackend`] and
//!   [`RetryingBackend`] implement it

pub mod address;
pub mod backend;
pub mod error;
pub mod hashmap;
pub mod index;
pub mod memory;
pub mod metadata;
pub mod retry;
pub mod store;

pub use address::{block_count_for, block_index_of, block_range, block_ranges};
pub use backend::ObjectBackend;
pub use error::{BackendError, BackendResult, StoreError, StoreResult};
pub use hashmap::HashmapSnapshot;
pub use index::BlockHashIndex;
pub use memory::{BackendStats, MemoryBackend};
pub use metadata::{headers, Metadata};
pub use retry::{RetryPolicy, RetryingBackend};
pub use store::{BlockStore, BlockStoreOptions};
