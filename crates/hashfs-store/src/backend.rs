use bytes::Bytes;
use hashfs_types::ObjectLocation;

use crate::error::BackendResult;
use crate::metadata::Metadata;

/// The object store as hashfs sees it.
///
/// Transport, authentication and response decoding live behind this trait.
/// Implementations must be thread-safe; every call is a blocking
/// request/response.
pub trait ObjectBackend: Send + Sync {
    /// Container-level metadata (default block size, hash algorithm).
    fn container_metadata(&self, container: &str) -> BackendResult<Metadata>;

    /// Object metadata. With `hashmap` set the response also carries the
    /// object's block size and ordered block hashes.
    fn object_metadata(&self, location: &ObjectLocation, hashmap: bool) -> BackendResult<Metadata>;

    /// Read the bytes selected by a `Range` header value
    /// (`bytes=<start>-<end>` or `bytes=<start>-`).
    fn range_read(&self, location: &ObjectLocation, range_header: &str) -> BackendResult<Bytes>;

    /// Names of every object in `container`, directory markers included.
    fn list_objects(&self, container: &str) -> BackendResult<Vec<String>>;

    /// Store `body` as the whole content of `location`.
    fn put_object(&self, location: &ObjectLocation, content_type: &str, body: Bytes) -> BackendResult<()>;

    /// Store an object sent as one bulk wire-format payload.
    fn upload_payload(&self, location: &ObjectLocation, payload: Bytes) -> BackendResult<()>;

    /// Rename `source` to `destination` within `container`.
    ///
    /// Trusted to be atomic per object.
    fn move_object(&self, container: &str, source: &str, destination: &str) -> BackendResult<()>;

    fn delete_object(&self, location: &ObjectLocation) -> BackendResult<()>;
}

impl<B: ObjectBackend + ?Sized> ObjectBackend for std::sync::Arc<B> {
    fn container_metadata(&self, container: &str) -> BackendResult<Metadata> {
        (**self).container_metadata(container)
    }

    fn object_metadata(&self, location: &ObjectLocation, hashmap: bool) -> BackendResult<Metadata> {
        (**self).object_metadata(location, hashmap)
    }

    fn range_read(&self, location: &ObjectLocation, range_header: &str) -> BackendResult<Bytes> {
        (**self).range_read(location, range_header)
    }

    fn list_objects(&self, container: &str) -> BackendResult<Vec<String>> {
        (**self).list_objects(container)
    }

    fn put_object(&self, location: &ObjectLocation, content_type: &str, body: Bytes) -> BackendResult<()> {
        (**self).put_object(location, content_type, body)
    }

    fn upload_payload(&self, location: &ObjectLocation, payload: Bytes) -> BackendResult<()> {
        (**self).upload_payload(location, payload)
    }

    fn move_object(&self, container: &str, source: &str, destination: &str) -> BackendResult<()> {
        (**self).move_object(container, source, destination)
    }

    fn delete_object(&self, location: &ObjectLocation) -> BackendResult<()> {
        (**self).delete_object(location)
    }
}
