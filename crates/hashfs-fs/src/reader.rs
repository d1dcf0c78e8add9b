use std::io::{self, Read, Seek, SeekFrom};

use bytes::Bytes;
use hashfs_store::{BlockStore, HashmapSnapshot};
use hashfs_types::{ByteRange, ObjectLocation};
use tracing::trace;

use crate::error::FsError;

/// Sequential and random-access reads of one object, a block at a time.
///
/// The hashmap is queried once at open; each block is fetched (and verified,
/// if the store is configured to) on first touch and kept until the
/// position leaves it.
pub struct BlockReader {
    store: BlockStore,
    snapshot: HashmapSnapshot,
    position: u64,
    current: Option<(ByteRange, Bytes)>,
}

impl BlockReader {
    pub(crate) fn new(store: BlockStore, snapshot: HashmapSnapshot) -> Self {
        Self {
            store,
            snapshot,
            position: 0,
            current: None,
        }
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.snapshot.location
    }

    /// Object length in bytes.
    pub fn len(&self) -> u64 {
        self.snapshot.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.total_size == 0
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Load the block holding `self.position` unless it is already cached.
    fn load_block(&mut self) -> Result<(), FsError> {
        if let Some((range, _)) = &self.current {
            if range.contains(self.position) {
                return Ok(());
            }
        }

        let count = self.snapshot.block_count();
        let index = if count <= 1 {
            1
        } else {
            (self.position / self.snapshot.block_size.max(1) + 1).min(count)
        };
        let range = self.snapshot.range_at(index)?;
        let hash = self
            .snapshot
            .index
            .get(index)
            .ok_or_else(|| FsError::NotFound(self.snapshot.location.clone()))?
            .clone();
        let block = self.store.fetch_block_in(&self.snapshot, &hash)?;
        trace!(location = %self.snapshot.location, index, %range, "reader loaded block");
        self.current = Some((range, block.into_data()));
        Ok(())
    }
}

impl Read for BlockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.snapshot.total_size {
            return Ok(0);
        }
        self.load_block()?;
        let Some((range, data)) = &self.current else {
            return Ok(0);
        };
        let offset = (self.position - range.start) as usize;
        let available = &data[offset.min(data.len())..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for BlockReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.snapshot.total_size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of object")
        })?;
        self.position = target;
        Ok(target)
    }
}

impl std::fmt::Debug for BlockReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockReader")
            .field("location", &self.snapshot.location)
            .field("len", &self.snapshot.total_size)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
