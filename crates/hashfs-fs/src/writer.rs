use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use hashfs_codec::ObjectCodec;
use hashfs_store::ObjectBackend;
use hashfs_types::{Block, HashAlgorithm, ObjectLocation, StoredObject};
use tracing::{debug, warn};

use crate::error::{FsError, FsResult};
use crate::staging::StagedWrites;

/// Write sink that cuts its input into hashed blocks and uploads the whole
/// object as one codec payload on [`close`](Self::close).
///
/// Nothing reaches the backend before close. Dropping an unclosed writer
/// closes it and logs a failure instead of reporting it.
pub struct BlockWriter {
    backend: Arc<dyn ObjectBackend>,
    location: ObjectLocation,
    block_size: usize,
    algorithm: HashAlgorithm,
    pending: Vec<u8>,
    blocks: Vec<Block>,
    staging: Option<Arc<StagedWrites>>,
    closed: bool,
}

impl BlockWriter {
    pub(crate) fn new(
        backend: Arc<dyn ObjectBackend>,
        location: ObjectLocation,
        block_size: u64,
        algorithm: HashAlgorithm,
        staging: Option<Arc<StagedWrites>>,
    ) -> FsResult<Self> {
        let block_size = usize::try_from(block_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| FsError::Config(format!("unusable block size {block_size}")))?;
        if let Some(staging) = &staging {
            staging.begin(&location);
        }
        Ok(Self {
            backend,
            location,
            block_size,
            algorithm,
            pending: Vec::with_capacity(block_size.min(1 << 20)),
            blocks: Vec::new(),
            staging,
            closed: false,
        })
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    /// Bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.blocks.iter().map(Block::len).sum::<u64>() + self.pending.len() as u64
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Encode and upload the object. Closing twice is a no-op, so a failed
    /// upload is reported once and not retried.
    pub fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.pending.is_empty() {
            let last = std::mem::take(&mut self.pending);
            self.blocks.push(Block::from_data(self.algorithm, last));
        }

        let object = StoredObject::new(
            self.location.name(),
            self.block_size as u64,
            std::mem::take(&mut self.blocks),
        );
        let uploaded = self.upload(&object);
        if let Some(staging) = &self.staging {
            match &uploaded {
                Ok(()) => staging.finish(&self.location),
                Err(_) => staging.forget(&self.location),
            }
        }
        uploaded
    }

    fn upload(&self, object: &StoredObject) -> FsResult<()> {
        let payload = ObjectCodec::for_algorithm(self.algorithm).serialize(object)?;
        debug!(
            location = %self.location,
            blocks = object.block_count(),
            size = object.total_size(),
            "uploading object"
        );
        self.backend
            .upload_payload(&self.location, Bytes::from(payload))?;
        Ok(())
    }

    fn cut_blocks(&mut self) {
        while self.pending.len() >= self.block_size {
            let rest = self.pending.split_off(self.block_size);
            let full = std::mem::replace(&mut self.pending, rest);
            self.blocks.push(Block::from_data(self.algorithm, full));
        }
    }
}

impl Write for BlockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(FsError::WriterClosed(self.location.clone()).into());
        }
        self.pending.extend_from_slice(buf);
        self.cut_blocks();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for BlockWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!(location = %self.location, error = %e, "closing dropped writer failed");
            }
        }
    }
}

impl std::fmt::Debug for BlockWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockWriter")
            .field("location", &self.location)
            .field("block_size", &self.block_size)
            .field("written", &self.written())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::WriteState;
    use hashfs_store::MemoryBackend;

    fn staged_writer(
        backend: &Arc<MemoryBackend>,
        staging: &Arc<StagedWrites>,
    ) -> (BlockWriter, ObjectLocation) {
        let location = ObjectLocation::parse("c/out/_temporary/0/part-00000").unwrap();
        let writer = BlockWriter::new(
            backend.clone(),
            location.clone(),
            4,
            HashAlgorithm::Sha256,
            Some(staging.clone()),
        )
        .unwrap();
        (writer, location)
    }

    #[test]
    fn close_marks_staged_write_closed() {
        let backend = Arc::new(MemoryBackend::new(4, HashAlgorithm::Sha256));
        let staging = Arc::new(StagedWrites::new());
        let (mut writer, location) = staged_writer(&backend, &staging);
        assert_eq!(staging.state(&location), Some(WriteState::Open));

        writer.write_all(b"0123456789").unwrap();
        writer.close().unwrap();
        assert_eq!(staging.state(&location), Some(WriteState::Closed));
        assert_eq!(backend.content(&location).unwrap().as_ref(), b"0123456789");
    }

    #[test]
    fn failed_upload_drops_staged_entry() {
        let backend = Arc::new(MemoryBackend::new(4, HashAlgorithm::Sha256));
        let staging = Arc::new(StagedWrites::new());
        let (mut writer, location) = staged_writer(&backend, &staging);

        writer.write_all(b"abc").unwrap();
        backend.fail_next(1);
        assert!(writer.close().is_err());
        assert_eq!(staging.state(&location), None);
        assert!(!staging.has_closed_in(&location.parent().unwrap()));
        assert!(!backend.contains(&location));
    }

    #[test]
    fn write_after_close_fails() {
        let backend = Arc::new(MemoryBackend::new(4, HashAlgorithm::Sha256));
        let staging = Arc::new(StagedWrites::new());
        let (mut writer, _) = staged_writer(&backend, &staging);
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.write(b"x").is_err());
    }
}
