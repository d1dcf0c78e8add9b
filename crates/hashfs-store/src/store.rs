use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use hashfs_types::{Block, BlockHash, ByteRange, HashAlgorithm, ObjectLocation};
use tracing::debug;

use crate::backend::ObjectBackend;
use crate::error::{BackendError, StoreError, StoreResult};
use crate::hashmap::HashmapSnapshot;
use crate::index::BlockHashIndex;
use crate::metadata::{headers, Metadata};

/// Options for [`BlockStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockStoreOptions {
    /// Algorithm used to recompute block digests.
    pub algorithm: HashAlgorithm,
    /// Recompute and compare the digest of every fetched block.
    pub verify_blocks: bool,
}

impl Default for BlockStoreOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            verify_blocks: true,
        }
    }
}

/// Block-level reads against an [`ObjectBackend`].
///
/// Holds no state besides the injected backend, so one store can serve
/// concurrent callers. Metadata is fetched per call and never cached here.
#[derive(Clone)]
pub struct BlockStore {
    backend: Arc<dyn ObjectBackend>,
    options: BlockStoreOptions,
}

impl BlockStore {
    pub fn new(backend: Arc<dyn ObjectBackend>, options: BlockStoreOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    pub fn options(&self) -> BlockStoreOptions {
        self.options
    }

    // ---- Metadata ----

    /// Query the hashmap metadata of `location` once.
    pub fn snapshot(&self, location: &ObjectLocation) -> StoreResult<HashmapSnapshot> {
        let metadata = self.hashmap_metadata(location)?;
        HashmapSnapshot::from_metadata(location, &metadata)
    }

    pub fn block_size(&self, location: &ObjectLocation) -> StoreResult<u64> {
        Ok(self.snapshot(location)?.block_size)
    }

    pub fn block_count(&self, location: &ObjectLocation) -> StoreResult<u64> {
        Ok(self.snapshot(location)?.block_count())
    }

    pub fn total_size(&self, location: &ObjectLocation) -> StoreResult<u64> {
        Ok(self.snapshot(location)?.total_size)
    }

    pub fn block_hashes(&self, location: &ObjectLocation) -> StoreResult<BlockHashIndex> {
        Ok(self.snapshot(location)?.index)
    }

    /// Default block size new objects in `container` are split into.
    pub fn container_block_size(&self, container: &str) -> StoreResult<u64> {
        let metadata = self.container_metadata(container)?;
        metadata
            .last_u64(headers::CONTAINER_BLOCK_SIZE)
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                StoreError::metadata(
                    container,
                    format!("{} missing or unparsable", headers::CONTAINER_BLOCK_SIZE),
                )
            })
    }

    /// Hash algorithm `container` addresses its blocks with.
    pub fn container_hash_algorithm(&self, container: &str) -> StoreResult<HashAlgorithm> {
        let metadata = self.container_metadata(container)?;
        let name = metadata.first(headers::CONTAINER_BLOCK_HASH).ok_or_else(|| {
            StoreError::metadata(container, format!("{} missing", headers::CONTAINER_BLOCK_HASH))
        })?;
        HashAlgorithm::from_str(name).map_err(|e| StoreError::metadata(container, e.to_string()))
    }

    // ---- Block reads ----

    /// Fetch the block identified by `hash`.
    pub fn fetch_block(&self, location: &ObjectLocation, hash: &BlockHash) -> StoreResult<Block> {
        let snapshot = self.snapshot(location)?;
        self.fetch_block_in(&snapshot, hash)
    }

    /// Fetch a block using an already-queried snapshot.
    ///
    /// An unknown hash fails before any range read is issued.
    pub fn fetch_block_in(&self, snapshot: &HashmapSnapshot, hash: &BlockHash) -> StoreResult<Block> {
        let range = snapshot.range_of(hash)?;
        let data = self.read(&snapshot.location, range, snapshot.total_size)?;
        let block = Block::new(hash.clone(), data);
        self.check_integrity(&block)?;
        debug!(
            location = %snapshot.location,
            hash = block.hash().short(),
            %range,
            "fetched block"
        );
        Ok(block)
    }

    /// Fetch every block in physical order. The first failure aborts.
    pub fn fetch_all_blocks(&self, location: &ObjectLocation) -> StoreResult<Vec<Block>> {
        let snapshot = self.snapshot(location)?;
        snapshot
            .index
            .iter()
            .map(|hash| self.fetch_block_in(&snapshot, hash))
            .collect()
    }

    /// Bytes from object offset `offset` to the end of the block `hash`.
    ///
    /// `offset` is absolute within the object and must fall in
    /// `[range.start, range.end)` of that block.
    pub fn fetch_range(
        &self,
        location: &ObjectLocation,
        hash: &BlockHash,
        offset: u64,
    ) -> StoreResult<Bytes> {
        let snapshot = self.snapshot(location)?;
        self.fetch_range_in(&snapshot, hash, offset)
    }

    pub fn fetch_range_in(
        &self,
        snapshot: &HashmapSnapshot,
        hash: &BlockHash,
        offset: u64,
    ) -> StoreResult<Bytes> {
        let block = snapshot.range_of(hash)?;
        if offset < block.start || offset >= block.end {
            return Err(StoreError::OffsetOutOfRange {
                offset,
                range: block,
            });
        }
        self.read(
            &snapshot.location,
            ByteRange::new(offset, block.end),
            snapshot.total_size,
        )
    }

    /// Bytes of an arbitrary inclusive span of the object.
    pub fn fetch_span(&self, location: &ObjectLocation, span: ByteRange) -> StoreResult<Bytes> {
        let snapshot = self.snapshot(location)?;
        if span.start > span.end || span.end >= snapshot.total_size {
            return Err(StoreError::InvalidRange(format!(
                "span {span} outside object of {} bytes",
                snapshot.total_size
            )));
        }
        self.read(location, span, snapshot.total_size)
    }

    // ---- Internals ----

    fn read(&self, location: &ObjectLocation, range: ByteRange, total_size: u64) -> StoreResult<Bytes> {
        let header = range.header_value(total_size);
        debug!(%location, %range, header = %header, "range read");
        let data = self.backend.range_read(location, &header).map_err(|e| match e {
            BackendError::NotFound(_) => StoreError::ObjectNotFound(location.clone()),
            other => StoreError::Backend(other),
        })?;
        if data.len() as u64 != range.len() {
            return Err(StoreError::ShortRead {
                range,
                actual: data.len() as u64,
            });
        }
        Ok(data)
    }

    fn check_integrity(&self, block: &Block) -> StoreResult<()> {
        if !self.options.verify_blocks {
            return Ok(());
        }
        let computed = self.options.algorithm.digest(block.data());
        if &computed != block.hash() {
            return Err(StoreError::IntegrityMismatch {
                expected: block.hash().clone(),
                computed,
            });
        }
        Ok(())
    }

    fn hashmap_metadata(&self, location: &ObjectLocation) -> StoreResult<Metadata> {
        self.backend
            .object_metadata(location, true)
            .map_err(|e| match e {
                BackendError::NotFound(_) => StoreError::ObjectNotFound(location.clone()),
                other => StoreError::metadata(location, other.to_string()),
            })
    }

    fn container_metadata(&self, container: &str) -> StoreResult<Metadata> {
        self.backend
            .container_metadata(container)
            .map_err(|e| StoreError::metadata(container, e.to_string()))
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
