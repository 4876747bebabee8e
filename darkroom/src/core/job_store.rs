use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::core::job::{Job, JobKind, JobStats, JobStatus, NewJob, Transition};
use crate::core::{DateTime, Xid};

/// An interface to the durable job store. The store is the single source of truth for queue state.
///
/// ### Claiming
///
/// [`claim_batch`](JobStore::claim_batch) only reads. Moving a job to `processing` is a separate
/// [`transition`](JobStore::transition), so two dispatchers running against the same store in
/// different processes can pick up the same job. Run one dispatcher per store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new pending job created at the given instant. Jobs with `max_attempts == 0` could
    /// never be claimed and are rejected with [`StoreError::InvalidMaxAttempts`].
    async fn enqueue_at(&self, job: NewJob, now: DateTime) -> Result<Job, StoreError>;

    /// Store a new pending job created now.
    async fn enqueue(&self, job: NewJob) -> Result<Job, StoreError> {
        self.enqueue_at(job, Utc::now()).await
    }

    /// Up to `limit` pending jobs of the given kinds with attempts left, oldest first. Implementation
    /// should not change anything, if there is nothing return an empty vec.
    async fn claim_batch(&self, kinds: &[JobKind], limit: usize) -> Result<Vec<Job>, StoreError>;

    /// Apply a status change and return the updated job. Last writer wins, but a job that already
    /// reached a terminal status is never touched again.
    async fn transition(&self, jid: Xid, transition: Transition) -> Result<Job, StoreError>;

    /// Look a single job up.
    async fn get(&self, jid: Xid) -> Result<Option<Job>, StoreError>;

    /// Delete completed jobs processed before `cutoff`. Returns how many were deleted.
    async fn purge_completed_before(&self, cutoff: DateTime) -> Result<u64, StoreError>;

    /// Delete completed jobs processed more than `retention` ago.
    async fn purge_completed_older_than(
        &self,
        retention: chrono::Duration,
    ) -> Result<u64, StoreError> {
        self.purge_completed_before(Utc::now() - retention).await
    }

    /// Put jobs that have been `processing` since before `cutoff` back to `pending`, or to
    /// `failed` when they have no attempts left. Returns how many jobs were touched.
    async fn reclaim_stale(&self, cutoff: DateTime, now: DateTime) -> Result<u64, StoreError>;

    /// Job counts grouped by status.
    async fn stats(&self) -> Result<JobStats, StoreError>;
}

/// Message stored on jobs that were found stuck in `processing`.
pub const STALE_PROCESSING_ERROR: &str = "processing stalled and was reclaimed";

/// Errors related to job store operation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// Encountered an error when tried to serialize a job payload.
    #[error("Failed to serialize job payload")]
    EncodeError {
        #[from]
        source: bincode::error::EncodeError,
    },
    #[error("Job by that ID does not exist: {0}")]
    JobNotFound(Xid),
    #[error("Job {jid} is {from} and cannot become {to}")]
    InvalidTransition {
        jid: Xid,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,
    #[error("A job needs at least one attempt")]
    InvalidMaxAttempts,
    #[error("{0} must be a positive duration")]
    InvalidDuration(&'static str),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
