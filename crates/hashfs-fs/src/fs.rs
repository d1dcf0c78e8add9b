use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use hashfs_commit::{
    AttemptLister, CommitCoordinator, CommitError, CommitOutcome, CommitPhase, CommitResult,
};
use hashfs_store::{
    headers, BackendError, BlockStore, BlockStoreOptions, ObjectBackend, RetryingBackend,
};
use hashfs_types::{is_directory_content_type, FileStatus, ObjectLocation};
use tracing::{debug, info, warn};

use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::reader::BlockReader;
use crate::staging::StagedWrites;
use crate::writer::BlockWriter;

/// Content type written for directory markers.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/directory";

/// Byte-stream file operations over an object backend.
///
/// Paths are either `scheme://container/a/b`, which names the container, or
/// plain `a/b`, which lives in the configured default container.
pub struct FileSystem {
    config: FsConfig,
    backend: Arc<dyn ObjectBackend>,
    store: BlockStore,
    coordinator: CommitCoordinator,
    staging: Arc<StagedWrites>,
}

impl FileSystem {
    /// Build a facade over `backend`, wrapped in the configured retry policy.
    pub fn new(config: FsConfig, backend: Arc<dyn ObjectBackend>) -> FsResult<Self> {
        config.validate()?;
        let backend: Arc<dyn ObjectBackend> =
            Arc::new(RetryingBackend::new(backend, config.retry.policy()));
        let store = BlockStore::new(
            backend.clone(),
            BlockStoreOptions {
                algorithm: config.hash_algorithm,
                verify_blocks: config.verify_blocks,
            },
        );
        let coordinator =
            CommitCoordinator::new(config.temporary_segment.clone(), config.latch_scope);
        Ok(Self {
            config,
            backend,
            store,
            coordinator,
            staging: Arc::new(StagedWrites::new()),
        })
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn coordinator(&self) -> &CommitCoordinator {
        &self.coordinator
    }

    /// Resolve a path to an object location.
    pub fn resolve(&self, path: &str) -> FsResult<ObjectLocation> {
        if path.contains("://") {
            return Ok(ObjectLocation::parse(path)?);
        }
        Ok(ObjectLocation::new(self.config.default_container.clone(), path)?)
    }

    // ---- Streams ----

    pub fn open(&self, path: &str) -> FsResult<BlockReader> {
        let location = self.resolve(path)?;
        let snapshot = self.store.snapshot(&location)?;
        if snapshot.is_directory() {
            return Err(FsError::IsADirectory(location));
        }
        debug!(%location, size = snapshot.total_size, blocks = snapshot.block_count(), "open");
        Ok(BlockReader::new(self.store.clone(), snapshot))
    }

    /// Start writing `path`. The object appears when the writer is closed.
    pub fn create(&self, path: &str) -> FsResult<BlockWriter> {
        let location = self.resolve(path)?;
        let block_size = match self.config.block_size_override {
            Some(size) => size,
            None => self.store.container_block_size(location.container())?,
        };
        let staging = self
            .coordinator
            .is_attempt_path(&location)
            .then(|| self.staging.clone());
        debug!(%location, block_size, staged = staging.is_some(), "create");
        BlockWriter::new(
            self.backend.clone(),
            location,
            block_size,
            self.config.hash_algorithm,
            staging,
        )
    }

    // ---- Status ----

    /// Status of `path`.
    ///
    /// When `path` is an attempt directory holding a closed staged write,
    /// the first such query commits the attempt before answering.
    pub fn get_status(&self, path: &str) -> FsResult<FileStatus> {
        let location = self.resolve(path)?;
        self.commit_if_triggered(&location);
        self.status_of(&location)
    }

    pub fn exists(&self, path: &str) -> FsResult<bool> {
        match self.get_status(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Status of every immediate child of `path`.
    ///
    /// Listing a file yields that file alone.
    pub fn list(&self, path: &str) -> FsResult<Vec<FileStatus>> {
        let location = self.resolve(path)?;
        self.list_location(&location)
    }

    pub fn commit_phase(&self, path: &str) -> FsResult<CommitPhase> {
        Ok(self.coordinator.phase(&self.resolve(path)?))
    }

    // ---- Namespace ----

    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        let location = self.resolve(path)?;
        self.backend
            .put_object(&location, DIRECTORY_CONTENT_TYPE, Bytes::new())?;
        debug!(%location, "mkdir");
        Ok(())
    }

    /// Delete `path`. Returns `false` when nothing was there.
    ///
    /// A directory with children is only removed with `recursive`.
    pub fn delete(&self, path: &str, recursive: bool) -> FsResult<bool> {
        let location = self.resolve(path)?;
        let descendants = self.descendants(&location)?;
        if !descendants.is_empty() && !recursive {
            return Err(FsError::DirectoryNotEmpty(location));
        }
        for name in &descendants {
            let child = ObjectLocation::new(location.container(), name)?;
            ignore_not_found(self.backend.delete_object(&child))?;
        }
        let removed_self = if location.is_root() {
            false
        } else {
            ignore_not_found(self.backend.delete_object(&location))?
        };
        debug!(%location, children = descendants.len(), "delete");
        Ok(removed_self || !descendants.is_empty())
    }

    /// Move `source` to `destination`, children included for directories.
    pub fn rename(&self, source: &str, destination: &str) -> FsResult<()> {
        let from = self.resolve(source)?;
        let to = self.resolve(destination)?;
        if from.container() != to.container() {
            return Err(FsError::CrossContainer {
                source_location: from,
                destination: to,
            });
        }

        let descendants = self.descendants(&from)?;
        let mut moved = 0usize;
        for name in &descendants {
            let child = ObjectLocation::new(from.container(), name)?;
            if let Some(rel) = child.relative_to(&from) {
                let target = to.join(rel);
                self.backend
                    .move_object(from.container(), child.name(), target.name())?;
                moved += 1;
            }
        }
        match self
            .backend
            .move_object(from.container(), from.name(), to.name())
        {
            Ok(()) => moved += 1,
            Err(e) if e.is_not_found() && moved > 0 => {}
            Err(e) if e.is_not_found() => return Err(FsError::NotFound(from)),
            Err(e) => return Err(e.into()),
        }
        info!(from = %from, to = %to, objects = moved, "rename");
        Ok(())
    }

    // ---- Internals ----

    fn commit_if_triggered(&self, location: &ObjectLocation) {
        if !self
            .coordinator
            .is_trigger(location, self.staging.has_closed_in(location))
        {
            return;
        }
        match self.coordinator.commit(location, self, self.backend.as_ref()) {
            Ok(CommitOutcome::Committed(report)) => {
                for moved in &report.moved {
                    self.staging.forget(&moved.source);
                }
                if !report.is_complete() {
                    warn!(
                        attempt = %report.attempt_path,
                        failed = report.failed.len(),
                        "commit left files behind"
                    );
                }
            }
            Ok(CommitOutcome::AlreadyCommitted) => {}
            Err(e) => warn!(%location, error = %e, "commit did not run"),
        }
    }

    fn status_of(&self, location: &ObjectLocation) -> FsResult<FileStatus> {
        let metadata = match self.backend.object_metadata(location, true) {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => {
                return if self.is_implicit_directory(location)? {
                    Ok(FileStatus::directory(
                        location.clone(),
                        self.config.directory_block_size,
                    ))
                } else {
                    Err(FsError::NotFound(location.clone()))
                };
            }
            Err(e) => return Err(e.into()),
        };

        let is_directory = metadata
            .values(headers::CONTENT_TYPE)
            .unwrap_or_default()
            .iter()
            .any(|ct| is_directory_content_type(ct));
        if is_directory {
            return Ok(FileStatus::directory(
                location.clone(),
                self.config.directory_block_size,
            ));
        }

        let size = metadata.content_length().unwrap_or(0);
        let block_size = metadata
            .last_u64(headers::OBJECT_BLOCK_SIZE)
            .filter(|size| *size > 0)
            .unwrap_or(self.config.directory_block_size);
        let modified = metadata.last_modified().and_then(parse_last_modified);
        Ok(FileStatus::file(location.clone(), size, block_size, modified))
    }

    fn list_location(&self, location: &ObjectLocation) -> FsResult<Vec<FileStatus>> {
        let children = self.child_names(location)?;
        if children.is_empty() {
            let status = self.status_of(location)?;
            return Ok(if status.is_directory {
                Vec::new()
            } else {
                vec![status]
            });
        }
        let mut statuses = Vec::with_capacity(children.len());
        for name in children {
            let child = location.join(&name);
            self.commit_if_triggered(&child);
            match self.status_of(&child) {
                Ok(status) => statuses.push(status),
                // Moved away by a concurrent commit or delete.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(statuses)
    }

    /// Immediate child names of `dir`, implicit directories included.
    fn child_names(&self, dir: &ObjectLocation) -> FsResult<Vec<String>> {
        let mut children = BTreeSet::new();
        for name in self.backend.list_objects(dir.container())? {
            if let Some(rel) = relative_name(dir, &name) {
                if let Some(first) = rel.split('/').next().filter(|s| !s.is_empty()) {
                    children.insert(first.to_string());
                }
            }
        }
        Ok(children.into_iter().collect())
    }

    /// Every object name strictly below `dir`.
    fn descendants(&self, dir: &ObjectLocation) -> FsResult<Vec<String>> {
        Ok(self
            .backend
            .list_objects(dir.container())?
            .into_iter()
            .filter(|name| relative_name(dir, name).is_some_and(|rel| !rel.is_empty()))
            .collect())
    }

    fn is_implicit_directory(&self, location: &ObjectLocation) -> FsResult<bool> {
        if location.is_root() {
            return Ok(true);
        }
        Ok(!self.descendants(location)?.is_empty())
    }
}

impl AttemptLister for FileSystem {
    fn list_names(&self, dir: &ObjectLocation) -> CommitResult<Vec<String>> {
        let statuses = self.list_location(dir).map_err(|e| CommitError::Listing {
            location: dir.clone(),
            reason: e.to_string(),
        })?;
        Ok(statuses
            .iter()
            .filter(|s| &s.location != dir)
            .filter_map(|s| s.location.file_name().map(str::to_string))
            .collect())
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

/// `name` relative to `dir`, when `name` lies strictly below it.
fn relative_name<'a>(dir: &ObjectLocation, name: &'a str) -> Option<&'a str> {
    if dir.is_root() {
        return Some(name);
    }
    name.strip_prefix(dir.name())?.strip_prefix('/')
}

fn ignore_not_found(result: Result<(), BackendError>) -> FsResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Parse an HTTP `Last-Modified` date into milliseconds since the epoch.
pub fn parse_last_modified(value: &str) -> Option<i64> {
    match chrono::DateTime::parse_from_rfc2822(value.trim()) {
        Ok(date) => Some(date.timestamp_millis()),
        Err(e) => {
            debug!(value, error = %e, "unparsable Last-Modified");
            None
        }
    }
}
