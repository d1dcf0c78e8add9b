use hashfs_types::{is_directory_content_type, BlockHash, ByteRange, ObjectLocation};

use crate::address::block_range;
use crate::error::{StoreError, StoreResult};
use crate::index::BlockHashIndex;
use crate::metadata::{headers, Metadata};

/// One hashmap metadata response, parsed.
///
/// A snapshot lives for a single request: it lets one `fetch_all_blocks`
/// address every block from a single metadata query without caching
/// anything across calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashmapSnapshot {
    pub location: ObjectLocation,
    pub total_size: u64,
    pub block_size: u64,
    pub index: BlockHashIndex,
    pub content_type: Option<String>,
}

impl HashmapSnapshot {
    /// Parse the size, block size and block hash fields of `metadata`.
    pub fn from_metadata(location: &ObjectLocation, metadata: &Metadata) -> StoreResult<Self> {
        let total_size = metadata
            .content_length()
            .ok_or_else(|| missing(location, headers::CONTENT_LENGTH))?;
        let block_size = metadata
            .last_u64(headers::OBJECT_BLOCK_SIZE)
            .ok_or_else(|| missing(location, headers::OBJECT_BLOCK_SIZE))?;
        let raw_hashes = metadata
            .values(headers::OBJECT_BLOCK_HASHES)
            .ok_or_else(|| missing(location, headers::OBJECT_BLOCK_HASHES))?;

        let hashes = raw_hashes
            .iter()
            .filter(|h| !h.trim().is_empty())
            .map(|h| {
                BlockHash::parse(h.trim()).map_err(|e| StoreError::metadata(location, e.to_string()))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Self {
            location: location.clone(),
            total_size,
            block_size,
            index: BlockHashIndex::new(hashes),
            content_type: metadata.content_type().map(str::to_string),
        })
    }

    /// Returns `true` when the object is a directory marker.
    pub fn is_directory(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(is_directory_content_type)
    }

    pub fn block_count(&self) -> u64 {
        self.index.count()
    }

    /// 1-based position of `hash`, or `BlockNotFound`.
    pub fn locate(&self, hash: &BlockHash) -> StoreResult<u64> {
        self.index
            .locate(hash)
            .ok_or_else(|| StoreError::BlockNotFound {
                location: self.location.clone(),
                hash: hash.clone(),
            })
    }

    /// Byte range of the block at 1-based `index`.
    pub fn range_at(&self, index: u64) -> StoreResult<ByteRange> {
        block_range(self.total_size, self.block_size, self.block_count(), index)
    }

    /// Byte range of the first block with `hash`.
    pub fn range_of(&self, hash: &BlockHash) -> StoreResult<ByteRange> {
        self.range_at(self.locate(hash)?)
    }
}

fn missing(location: &ObjectLocation, header: &str) -> StoreError {
    StoreError::metadata(location, format!("{header} missing or unparsable"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> ObjectLocation {
        ObjectLocation::parse("box/obj").unwrap()
    }

    fn metadata(size: u64, block_size: u64, hashes: &[&str]) -> Metadata {
        let mut md = Metadata::new()
            .with(headers::CONTENT_LENGTH, size.to_string())
            .with(headers::OBJECT_BLOCK_SIZE, block_size.to_string());
        md.insert(
            headers::OBJECT_BLOCK_HASHES,
            hashes.iter().map(|h| h.to_string()).collect(),
        );
        md
    }

    #[test]
    fn parses_fields() {
        let snap = HashmapSnapshot::from_metadata(&loc(), &metadata(10, 4, &["aa", "bb", "cc"])).unwrap();
        assert_eq!(snap.total_size, 10);
        assert_eq!(snap.block_size, 4);
        assert_eq!(snap.block_count(), 3);
        let cc = BlockHash::parse("cc").unwrap();
        assert_eq!(snap.range_of(&cc).unwrap(), ByteRange::new(8, 9));
    }

    #[test]
    fn directory_marker_is_detected() {
        let plain = HashmapSnapshot::from_metadata(&loc(), &metadata(1, 4, &["aa"])).unwrap();
        assert!(!plain.is_directory());

        let marker = metadata(0, 4, &[]).with(headers::CONTENT_TYPE, "application/directory");
        let snap = HashmapSnapshot::from_metadata(&loc(), &marker).unwrap();
        assert!(snap.is_directory());
        assert_eq!(snap.block_count(), 0);
    }

    #[test]
    fn missing_block_size_is_metadata_error() {
        let md = Metadata::new().with(headers::CONTENT_LENGTH, "10");
        let err = HashmapSnapshot::from_metadata(&loc(), &md).unwrap_err();
        assert!(matches!(err, StoreError::MetadataUnavailable { .. }));
    }

    #[test]
    fn garbled_hash_is_metadata_error() {
        let err = HashmapSnapshot::from_metadata(&loc(), &metadata(1, 4, &["zz"])).unwrap_err();
        assert!(matches!(err, StoreError::MetadataUnavailable { .. }));
    }

    #[test]
    fn unknown_hash_is_block_not_found() {
        let snap = HashmapSnapshot::from_metadata(&loc(), &metadata(4, 4, &["aa"])).unwrap();
        let err = snap.locate(&BlockHash::parse("ff").unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::BlockNotFound { .. }));
    }
}
