use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use bytes::Bytes;
use hashfs_codec::ObjectCodec;
use hashfs_types::{BlockHash, HashAlgorithm, ObjectLocation, StoredObject};

use crate::backend::ObjectBackend;
use crate::error::{BackendError, BackendResult};
use crate::metadata::{headers, Metadata};

/// Content type of a regular object.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Call counters of a [`MemoryBackend`]. Failed calls are counted too.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub metadata_queries: u64,
    pub range_reads: u64,
    pub moves: u64,
    pub uploads: u64,
}

#[derive(Clone, Debug)]
struct Entry {
    content: Bytes,
    content_type: String,
    block_size: u64,
    hashes: Vec<BlockHash>,
    last_modified: String,
}

#[derive(Default)]
struct Faults {
    fail_next: usize,
    range_reads_left: Option<usize>,
    failing_moves: HashSet<String>,
}

/// In-memory object store implementing [`ObjectBackend`].
///
/// Objects are re-blocked on write at the backend's block size and hashed
/// with its algorithm, so hashmap metadata looks like a real container's.
/// Counters and fault injection make it usable as a test double.
pub struct MemoryBackend {
    block_size: u64,
    algorithm: HashAlgorithm,
    objects: RwLock<HashMap<(String, String), Entry>>,
    faults: Mutex<Faults>,
    range_headers: Mutex<Vec<String>>,
    metadata_queries: AtomicU64,
    range_reads: AtomicU64,
    moves: AtomicU64,
    uploads: AtomicU64,
}

impl MemoryBackend {
    /// A backend whose containers split objects into `block_size` blocks.
    /// A zero `block_size` is raised to one byte.
    pub fn new(block_size: u64, algorithm: HashAlgorithm) -> Self {
        Self {
            block_size: block_size.max(1),
            algorithm,
            objects: RwLock::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            range_headers: Mutex::new(Vec::new()),
            metadata_queries: AtomicU64::new(0),
            range_reads: AtomicU64::new(0),
            moves: AtomicU64::new(0),
            uploads: AtomicU64::new(0),
        }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn stats(&self) -> BackendStats {
        BackendStats {
            metadata_queries: self.metadata_queries.load(Ordering::SeqCst),
            range_reads: self.range_reads.load(Ordering::SeqCst),
            moves: self.moves.load(Ordering::SeqCst),
            uploads: self.uploads.load(Ordering::SeqCst),
        }
    }

    /// Every `Range` header received, oldest first.
    pub fn range_headers(&self) -> Vec<String> {
        self.range_headers.lock().expect("lock poisoned").clone()
    }

    /// Number of stored objects across all containers.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, location: &ObjectLocation) -> bool {
        self.objects
            .read()
            .expect("lock poisoned")
            .contains_key(&key(location))
    }

    /// Whole content of an object, bypassing counters and faults.
    pub fn content(&self, location: &ObjectLocation) -> Option<Bytes> {
        self.objects
            .read()
            .expect("lock poisoned")
            .get(&key(location))
            .map(|e| e.content.clone())
    }

    /// Override the `Last-Modified` value reported for an object.
    pub fn set_last_modified(&self, location: &ObjectLocation, value: impl Into<String>) {
        if let Some(entry) = self
            .objects
            .write()
            .expect("lock poisoned")
            .get_mut(&key(location))
        {
            entry.last_modified = value.into();
        }
    }

    // ---- Fault injection ----

    /// Fail the next `n` calls of any kind with `Unavailable`.
    pub fn fail_next(&self, n: usize) {
        self.faults.lock().expect("lock poisoned").fail_next = n;
    }

    /// Let `n` more range reads succeed, then fail every later one.
    pub fn fail_range_reads_after(&self, n: usize) {
        self.faults.lock().expect("lock poisoned").range_reads_left = Some(n);
    }

    /// Reject every move whose source object is `name`.
    pub fn fail_moves_of(&self, name: impl Into<String>) {
        self.faults
            .lock()
            .expect("lock poisoned")
            .failing_moves
            .insert(name.into());
    }

    /// Flip the bits of one stored byte without touching its block hashes.
    pub fn corrupt_byte(&self, location: &ObjectLocation, offset: usize) {
        let mut objects = self.objects.write().expect("lock poisoned");
        if let Some(entry) = objects.get_mut(&key(location)) {
            if offset < entry.content.len() {
                let mut raw = entry.content.to_vec();
                raw[offset] ^= 0xff;
                entry.content = Bytes::from(raw);
            }
        }
    }

    fn injected(&self, operation: &str) -> BackendResult<()> {
        let mut faults = self.faults.lock().expect("lock poisoned");
        if faults.fail_next > 0 {
            faults.fail_next -= 1;
            return Err(BackendError::Unavailable(format!("injected failure in {operation}")));
        }
        Ok(())
    }

    fn entry(&self, location: &ObjectLocation) -> BackendResult<Entry> {
        self.objects
            .read()
            .expect("lock poisoned")
            .get(&key(location))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(location.to_string()))
    }

    fn store(&self, location: &ObjectLocation, object: StoredObject, content_type: &str) {
        let content = Bytes::from(object.content());
        let entry = Entry {
            content,
            content_type: content_type.to_string(),
            block_size: if object.block_size == 0 {
                self.block_size
            } else {
                object.block_size
            },
            hashes: object.block_hashes(),
            last_modified: chrono::Utc::now().to_rfc2822(),
        };
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key(location), entry);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(4 * 1024 * 1024, HashAlgorithm::Sha256)
    }
}

impl ObjectBackend for MemoryBackend {
    fn container_metadata(&self, _container: &str) -> BackendResult<Metadata> {
        self.metadata_queries.fetch_add(1, Ordering::SeqCst);
        self.injected("container_metadata")?;
        Ok(Metadata::new()
            .with(headers::CONTAINER_BLOCK_SIZE, self.block_size.to_string())
            .with(headers::CONTAINER_BLOCK_HASH, self.algorithm.name()))
    }

    fn object_metadata(&self, location: &ObjectLocation, hashmap: bool) -> BackendResult<Metadata> {
        self.metadata_queries.fetch_add(1, Ordering::SeqCst);
        self.injected("object_metadata")?;
        let entry = self.entry(location)?;
        let mut metadata = Metadata::new()
            .with(headers::CONTENT_LENGTH, entry.content.len().to_string())
            .with(headers::CONTENT_TYPE, entry.content_type)
            .with(headers::LAST_MODIFIED, entry.last_modified);
        if hashmap {
            metadata.insert(
                headers::OBJECT_BLOCK_SIZE,
                vec![entry.block_size.to_string()],
            );
            metadata.insert(
                headers::OBJECT_BLOCK_HASHES,
                entry.hashes.iter().map(|h| h.to_string()).collect(),
            );
        }
        Ok(metadata)
    }

    fn range_read(&self, location: &ObjectLocation, range_header: &str) -> BackendResult<Bytes> {
        self.range_reads.fetch_add(1, Ordering::SeqCst);
        self.range_headers
            .lock()
            .expect("lock poisoned")
            .push(range_header.to_string());
        self.injected("range_read")?;
        {
            let mut faults = self.faults.lock().expect("lock poisoned");
            if let Some(left) = faults.range_reads_left.as_mut() {
                if *left == 0 {
                    return Err(BackendError::Unavailable("injected range read failure".into()));
                }
                *left -= 1;
            }
        }

        let entry = self.entry(location)?;
        let size = entry.content.len() as u64;
        let (start, end) = parse_range_header(range_header)?;
        if start >= size || end.is_some_and(|end| end < start) {
            return Err(BackendError::UnsatisfiableRange {
                header: range_header.to_string(),
                size,
            });
        }
        let end = end.map_or(size - 1, |end| end.min(size - 1));
        Ok(entry.content.slice(start as usize..=end as usize))
    }

    fn list_objects(&self, container: &str) -> BackendResult<Vec<String>> {
        self.injected("list_objects")?;
        let objects = self.objects.read().expect("lock poisoned");
        let mut names: Vec<String> = objects
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn put_object(&self, location: &ObjectLocation, content_type: &str, body: Bytes) -> BackendResult<()> {
        self.injected("put_object")?;
        let object = StoredObject::from_bytes(location.name(), self.block_size, self.algorithm, &body)
            .map_err(|e| BackendError::Rejected {
                status: 400,
                message: e.to_string(),
            })?;
        self.store(location, object, content_type);
        Ok(())
    }

    fn upload_payload(&self, location: &ObjectLocation, payload: Bytes) -> BackendResult<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.injected("upload_payload")?;
        let codec = ObjectCodec::for_algorithm(self.algorithm);
        let mut object = codec
            .deserialize(Some(&payload))?
            .unwrap_or_else(|| StoredObject::new(location.name(), self.block_size, Vec::new()));
        // A lone block only tells its own length, not the block size.
        if object.block_count() <= 1 {
            object.block_size = self.block_size;
        }
        self.store(location, object, OCTET_STREAM);
        Ok(())
    }

    fn move_object(&self, container: &str, source: &str, destination: &str) -> BackendResult<()> {
        self.moves.fetch_add(1, Ordering::SeqCst);
        self.injected("move_object")?;
        if self
            .faults
            .lock()
            .expect("lock poisoned")
            .failing_moves
            .contains(source)
        {
            return Err(BackendError::Rejected {
                status: 409,
                message: format!("move of {source} refused"),
            });
        }
        let mut objects = self.objects.write().expect("lock poisoned");
        let entry = objects
            .remove(&(container.to_string(), source.to_string()))
            .ok_or_else(|| BackendError::NotFound(format!("{container}/{source}")))?;
        objects.insert((container.to_string(), destination.to_string()), entry);
        Ok(())
    }

    fn delete_object(&self, location: &ObjectLocation) -> BackendResult<()> {
        self.injected("delete_object")?;
        self.objects
            .write()
            .expect("lock poisoned")
            .remove(&key(location))
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(location.to_string()))
    }
}

fn key(location: &ObjectLocation) -> (String, String) {
    (location.container().to_string(), location.name().to_string())
}

/// Parse `bytes=<start>-<end>` or `bytes=<start>-`.
fn parse_range_header(header: &str) -> BackendResult<(u64, Option<u64>)> {
    let malformed = || BackendError::Rejected {
        status: 400,
        message: format!("malformed range header {header:?}"),
    };
    let spec = header.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
    let (start, end) = spec.split_once('-').ok_or_else(malformed)?;
    let start = start.trim().parse::<u64>().map_err(|_| malformed())?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse::<u64>().map_err(|_| malformed())?),
    };
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(path: &str) -> ObjectLocation {
        ObjectLocation::parse(path).unwrap()
    }

    fn backend() -> MemoryBackend {
        MemoryBackend::new(4, HashAlgorithm::Sha256)
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    #[test]
    fn hashmap_metadata_lists_blocks() {
        let b = backend();
        let l = loc("c/a");
        b.put_object(&l, OCTET_STREAM, Bytes::from_static(b"0123456789")).unwrap();

        let md = b.object_metadata(&l, true).unwrap();
        assert_eq!(md.content_length(), Some(10));
        assert_eq!(md.last_u64(headers::OBJECT_BLOCK_SIZE), Some(4));
        assert_eq!(md.values(headers::OBJECT_BLOCK_HASHES).unwrap().len(), 3);

        let plain = b.object_metadata(&l, false).unwrap();
        assert!(plain.values(headers::OBJECT_BLOCK_HASHES).is_none());
        assert!(plain.last_modified().is_some());
    }

    #[test]
    fn missing_object_is_not_found() {
        let err = backend().object_metadata(&loc("c/none"), true).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn container_reports_defaults() {
        let md = backend().container_metadata("c").unwrap();
        assert_eq!(md.last_u64(headers::CONTAINER_BLOCK_SIZE), Some(4));
        assert_eq!(md.first(headers::CONTAINER_BLOCK_HASH), Some("sha256"));
    }

    // -----------------------------------------------------------------------
    // Range reads
    // -----------------------------------------------------------------------

    #[test]
    fn closed_and_open_ranges() {
        let b = backend();
        let l = loc("c/a");
        b.put_object(&l, OCTET_STREAM, Bytes::from_static(b"0123456789")).unwrap();
        assert_eq!(b.range_read(&l, "bytes=2-4").unwrap().as_ref(), b"234");
        assert_eq!(b.range_read(&l, "bytes=7-").unwrap().as_ref(), b"789");
        assert_eq!(b.range_read(&l, "bytes=8-100").unwrap().as_ref(), b"89");
        assert_eq!(b.stats().range_reads, 3);
    }

    #[test]
    fn bad_ranges_rejected() {
        let b = backend();
        let l = loc("c/a");
        b.put_object(&l, OCTET_STREAM, Bytes::from_static(b"abc")).unwrap();
        assert!(matches!(
            b.range_read(&l, "bytes=3-"),
            Err(BackendError::UnsatisfiableRange { size: 3, .. })
        ));
        assert!(matches!(
            b.range_read(&l, "items=0-1"),
            Err(BackendError::Rejected { status: 400, .. })
        ));
        assert!(b.range_read(&l, "bytes=2-1").is_err());
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    #[test]
    fn upload_payload_keeps_hashes() {
        let b = backend();
        let obj = StoredObject::from_bytes("up", 3, HashAlgorithm::Sha256, b"abcdefg").unwrap();
        let payload = ObjectCodec::for_algorithm(HashAlgorithm::Sha256).serialize(&obj).unwrap();
        let l = loc("c/up");
        b.upload_payload(&l, Bytes::from(payload)).unwrap();

        assert_eq!(b.content(&l).unwrap().as_ref(), b"abcdefg");
        let md = b.object_metadata(&l, true).unwrap();
        assert_eq!(md.last_u64(headers::OBJECT_BLOCK_SIZE), Some(3));
        assert_eq!(b.stats().uploads, 1);
    }

    #[test]
    fn single_block_upload_reports_container_block_size() {
        let b = backend();
        let obj = StoredObject::from_bytes("s", 4, HashAlgorithm::Sha256, b"ab").unwrap();
        let payload = ObjectCodec::for_algorithm(HashAlgorithm::Sha256).serialize(&obj).unwrap();
        let l = loc("c/s");
        b.upload_payload(&l, Bytes::from(payload)).unwrap();
        let md = b.object_metadata(&l, true).unwrap();
        assert_eq!(md.last_u64(headers::OBJECT_BLOCK_SIZE), Some(4));
    }

    #[test]
    fn empty_payload_stores_empty_object() {
        let b = backend();
        let l = loc("c/empty");
        b.upload_payload(&l, Bytes::new()).unwrap();
        assert_eq!(b.object_metadata(&l, true).unwrap().content_length(), Some(0));
    }

    #[test]
    fn move_list_delete() {
        let b = backend();
        b.put_object(&loc("c/x/1"), OCTET_STREAM, Bytes::from_static(b"1")).unwrap();
        b.put_object(&loc("d/y"), OCTET_STREAM, Bytes::from_static(b"2")).unwrap();

        b.move_object("c", "x/1", "z/1").unwrap();
        assert_eq!(b.list_objects("c").unwrap(), vec!["z/1".to_string()]);
        assert!(b.move_object("c", "x/1", "z/2").unwrap_err().is_not_found());
        assert_eq!(b.stats().moves, 2);

        b.delete_object(&loc("c/z/1")).unwrap();
        assert!(b.list_objects("c").unwrap().is_empty());
        assert!(b.delete_object(&loc("c/z/1")).unwrap_err().is_not_found());
    }

    // -----------------------------------------------------------------------
    // Faults
    // -----------------------------------------------------------------------

    #[test]
    fn fail_next_then_recover() {
        let b = backend();
        b.fail_next(2);
        assert!(b.container_metadata("c").unwrap_err().is_retryable());
        assert!(b.list_objects("c").is_err());
        assert!(b.list_objects("c").is_ok());
    }

    #[test]
    fn failing_move_is_not_retryable() {
        let b = backend();
        b.put_object(&loc("c/a"), OCTET_STREAM, Bytes::from_static(b"a")).unwrap();
        b.fail_moves_of("a");
        let err = b.move_object("c", "a", "b").unwrap_err();
        assert!(!err.is_retryable());
        assert!(b.contains(&loc("c/a")));
    }
}
