//! Output commit for staged writes.
//!
//! Writers stage their files under an attempt directory such as
//! `out/_temporary/0/task_01`. Once the staged writer is closed, the first
//! status query on the attempt path moves every file it holds up into the
//! root output directory `out`. The move runs once per latch, however many
//! status queries follow, including the ones the commit's own listing makes.

pub mod coordinator;
pub mod error;

pub use coordinator::{
    AttemptLister, CommitCoordinator, CommitOutcome, CommitPhase, CommitReport, CommitState,
    FailedMove, LatchScope, MovedFile, DEFAULT_TEMPORARY_SEGMENT,
};
pub use error::{CommitError, CommitResult};
