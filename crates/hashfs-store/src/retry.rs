//! Bounded retry with exponential backoff at the backend boundary.
//!
//! The block store and commit coordinator call the backend exactly once per
//! request and surface every failure. Retrying is a property of the
//! collaborator, so it lives in a wrapper around any [`ObjectBackend`].

use std::time::{Duration, Instant};

use bytes::Bytes;
use hashfs_types::ObjectLocation;
use tracing::warn;

use crate::backend::ObjectBackend;
use crate::error::{BackendError, BackendResult};
use crate::metadata::Metadata;

/// Retry settings for backend calls.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per call, the first one included. `1` disables retry.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Time allowed for the retries of one call. Checked before each backoff
    /// delay: a retry that would start past the budget fails with `Timeout`.
    /// A single attempt that hangs is not interrupted.
    pub retry_budget: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            retry_budget: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry budget.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            retry_budget: None,
            ..Self::default()
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        if capped.is_finite() && capped > 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            Duration::ZERO
        }
    }
}

/// Wraps a backend so transient failures are retried under a [`RetryPolicy`].
///
/// Only errors for which [`BackendError::is_retryable`] holds are retried.
/// Once the call budget is spent the last failure is replaced by
/// [`BackendError::Timeout`].
pub struct RetryingBackend<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: ObjectBackend> RetryingBackend<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn run<T>(&self, operation: &'static str, call: impl Fn(&B) -> BackendResult<T>) -> BackendResult<T> {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match call(&self.inner) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() || attempt >= max_attempts {
                return Err(err);
            }

            let delay = self.policy.backoff(attempt);
            if let Some(budget) = self.policy.retry_budget {
                if started.elapsed() + delay >= budget {
                    return Err(BackendError::Timeout {
                        operation,
                        elapsed: started.elapsed(),
                    });
                }
            }
            warn!(operation, attempt, ?delay, error = %err, "backend call failed, retrying");
            std::thread::sleep(delay);
        }
    }
}

impl<B: ObjectBackend> ObjectBackend for RetryingBackend<B> {
    fn container_metadata(&self, container: &str) -> BackendResult<Metadata> {
        self.run("container_metadata", |b| b.container_metadata(container))
    }

    fn object_metadata(&self, location: &ObjectLocation, hashmap: bool) -> BackendResult<Metadata> {
        self.run("object_metadata", |b| b.object_metadata(location, hashmap))
    }

    fn range_read(&self, location: &ObjectLocation, range_header: &str) -> BackendResult<Bytes> {
        self.run("range_read", |b| b.range_read(location, range_header))
    }

    fn list_objects(&self, container: &str) -> BackendResult<Vec<String>> {
        self.run("list_objects", |b| b.list_objects(container))
    }

    fn put_object(&self, location: &ObjectLocation, content_type: &str, body: Bytes) -> BackendResult<()> {
        self.run("put_object", |b| b.put_object(location, content_type, body.clone()))
    }

    fn upload_payload(&self, location: &ObjectLocation, payload: Bytes) -> BackendResult<()> {
        self.run("upload_payload", |b| b.upload_payload(location, payload.clone()))
    }

    fn move_object(&self, container: &str, source: &str, destination: &str) -> BackendResult<()> {
        self.run("move_object", |b| b.move_object(container, source, destination))
    }

    fn delete_object(&self, location: &ObjectLocation) -> BackendResult<()> {
        self.run("delete_object", |b| b.delete_object(location))
    }
}
