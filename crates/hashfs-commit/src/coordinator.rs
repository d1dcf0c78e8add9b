use std::collections::HashMap;
use std::sync::Mutex;

use hashfs_store::{BackendError, ObjectBackend};
use hashfs_types::ObjectLocation;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CommitError, CommitResult};

/// Path segment that marks staged attempt output.
pub const DEFAULT_TEMPORARY_SEGMENT: &str = "_temporary";

/// How far one commit's latch reaches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatchScope {
    /// One latch per root output directory.
    #[default]
    PerOutput,
    /// One latch for the whole coordinator: after the first commit every
    /// later trigger is a no-op, whatever the path.
    Global,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitPhase {
    Pending,
    Committed,
}

/// Latch record of a commit that has fired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitState {
    /// Attempt directory the triggering status query named.
    pub attempt_path: ObjectLocation,
    /// `attempt_path` truncated at its first temporary segment.
    pub root_output: ObjectLocation,
    pub phase: CommitPhase,
}

/// Lists the immediate children of an attempt directory.
///
/// The file facade implements this with its own `list`, which queries status
/// of every child and so calls back into the coordinator.
pub trait AttemptLister {
    fn list_names(&self, dir: &ObjectLocation) -> CommitResult<Vec<String>>;
}

impl<F> AttemptLister for F
where
    F: Fn(&ObjectLocation) -> CommitResult<Vec<String>>,
{
    fn list_names(&self, dir: &ObjectLocation) -> CommitResult<Vec<String>> {
        self(dir)
    }
}

/// One file moved into the output directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovedFile {
    pub source: ObjectLocation,
    pub destination: ObjectLocation,
}

/// One file the backend refused to move.
#[derive(Debug)]
pub struct FailedMove {
    pub source: ObjectLocation,
    pub destination: ObjectLocation,
    pub error: BackendError,
}

/// Result of a commit that ran.
#[derive(Debug)]
pub struct CommitReport {
    pub attempt_path: ObjectLocation,
    pub root_output: ObjectLocation,
    pub moved: Vec<MovedFile>,
    pub failed: Vec<FailedMove>,
}

impl CommitReport {
    /// Every listed file reached the output directory.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub enum CommitOutcome {
    /// The latch was already set; nothing was listed or moved.
    AlreadyCommitted,
    Committed(CommitReport),
}

impl CommitOutcome {
    pub fn report(&self) -> Option<&CommitReport> {
        match self {
            Self::AlreadyCommitted => None,
            Self::Committed(report) => Some(report),
        }
    }
}

/// Promotes staged attempt output into its final directory exactly once.
///
/// Firing is two-phase. [`is_trigger`](Self::is_trigger) is a pure check on
/// the queried path; [`commit`](Self::commit) then sets the latch under a
/// lock before listing, so a listing that queries status again finds the
/// latch set and returns immediately.
#[derive(Debug)]
pub struct CommitCoordinator {
    temporary_segment: String,
    scope: LatchScope,
    latches: Mutex<HashMap<Option<ObjectLocation>, CommitState>>,
}

impl CommitCoordinator {
    pub fn new(temporary_segment: impl Into<String>, scope: LatchScope) -> Self {
        Self {
            temporary_segment: temporary_segment.into(),
            scope,
            latches: Mutex::new(HashMap::new()),
        }
    }

    pub fn temporary_segment(&self) -> &str {
        &self.temporary_segment
    }

    pub fn scope(&self) -> LatchScope {
        self.scope
    }

    /// Returns `true` if `path` lies below a temporary segment.
    pub fn is_attempt_path(&self, path: &ObjectLocation) -> bool {
        path.has_segment(&self.temporary_segment)
    }

    /// Whether a status query on `path` should fire the commit.
    ///
    /// `writer_closed` tells whether a staged writer under `path` has been
    /// closed. Does not consult the latch.
    pub fn is_trigger(&self, path: &ObjectLocation, writer_closed: bool) -> bool {
        writer_closed && self.is_attempt_path(path)
    }

    /// Final output directory of an attempt path.
    pub fn root_output(&self, attempt: &ObjectLocation) -> CommitResult<ObjectLocation> {
        attempt
            .truncate_at_segment(&self.temporary_segment)
            .ok_or_else(|| CommitError::NotAnAttemptPath {
                location: attempt.clone(),
                segment: self.temporary_segment.clone(),
            })
    }

    /// Latch phase governing `path`.
    pub fn phase(&self, path: &ObjectLocation) -> CommitPhase {
        match self.state(path) {
            Some(state) => state.phase,
            None => CommitPhase::Pending,
        }
    }

    pub fn state(&self, path: &ObjectLocation) -> Option<CommitState> {
        let root = self
            .root_output(path)
            .unwrap_or_else(|_| path.clone());
        self.latches
            .lock()
            .expect("lock poisoned")
            .get(&self.latch_key(&root))
            .cloned()
    }

    /// Move every file of `attempt` into its root output directory, once.
    ///
    /// Returns [`CommitOutcome::AlreadyCommitted`] when the latch for this
    /// attempt is already set. A failing move is recorded in the report and
    /// does not stop the remaining moves. If listing fails nothing has moved
    /// and the latch is released so a later trigger can try again.
    pub fn commit<L: AttemptLister + ?Sized>(
        &self,
        attempt: &ObjectLocation,
        lister: &L,
        backend: &dyn ObjectBackend,
    ) -> CommitResult<CommitOutcome> {
        let root_output = self.root_output(attempt)?;
        let key = self.latch_key(&root_output);

        {
            let mut latches = self.latches.lock().expect("lock poisoned");
            if latches.contains_key(&key) {
                debug!(%attempt, "commit latch already set");
                return Ok(CommitOutcome::AlreadyCommitted);
            }
            latches.insert(
                key.clone(),
                CommitState {
                    attempt_path: attempt.clone(),
                    root_output: root_output.clone(),
                    phase: CommitPhase::Committed,
                },
            );
        }

        let names = match lister.list_names(attempt) {
            Ok(names) => names,
            Err(err) => {
                self.latches.lock().expect("lock poisoned").remove(&key);
                warn!(%attempt, error = %err, "commit listing failed, latch released");
                return Err(err);
            }
        };

        let mut report = CommitReport {
            attempt_path: attempt.clone(),
            root_output: root_output.clone(),
            moved: Vec::with_capacity(names.len()),
            failed: Vec::new(),
        };

        for name in names {
            let source = attempt.join(&name);
            let destination = root_output.join(&name);
            match backend.move_object(attempt.container(), source.name(), destination.name()) {
                Ok(()) => {
                    info!(%source, %destination, "committed file");
                    report.moved.push(MovedFile { source, destination });
                }
                Err(error) => {
                    warn!(%source, %destination, %error, "commit move failed");
                    report.failed.push(FailedMove {
                        source,
                        destination,
                        error,
                    });
                }
            }
        }

        info!(
            %attempt,
            output = %root_output,
            moved = report.moved.len(),
            failed = report.failed.len(),
            "commit finished"
        );
        Ok(CommitOutcome::Committed(report))
    }

    fn latch_key(&self, root_output: &ObjectLocation) -> Option<ObjectLocation> {
        match self.scope {
            LatchScope::PerOutput => Some(root_output.clone()),
            LatchScope::Global => None,
        }
    }
}

impl Default for CommitCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPORARY_SEGMENT, LatchScope::default())
    }
}
