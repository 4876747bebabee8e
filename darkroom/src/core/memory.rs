use crate::core::job::{Job, JobKind, JobStats, JobStatus, NewJob, Transition};
use crate::core::job_store::{JobStore, StoreError, STALE_PROCESSING_ERROR};
use crate::core::{new_xid, DateTime, Xid};
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Job store that lives in process memory. Nothing survives a restart, so this is meant for tests
/// and for embedding the dispatcher where durability is handled elsewhere.
#[derive(Clone, Debug, Default)]
pub struct InMemoryJobStore {
    // Kept in insertion order, which breaks ties between jobs created at the same instant.
    jobs: Arc<RwLock<Vec<Job>>>,
}

impl InMemoryJobStore {
    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Job>>, StoreError> {
        self.jobs
            .read()
            .map_err(|_| anyhow!("Lock is poisoned").into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Job>>, StoreError> {
        self.jobs
            .write()
            .map_err(|_| anyhow!("Lock is poisoned").into())
    }

    /// Snapshot of every stored job.
    pub fn jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.read()?.clone())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue_at(&self, job: NewJob, now: DateTime) -> Result<Job, StoreError> {
        if job.max_attempts == 0 {
            return Err(StoreError::InvalidMaxAttempts);
        }
        let job = job.into_job(new_xid(), now);
        self.write()?.push(job.clone());
        Ok(job)
    }

    async fn claim_batch(&self, kinds: &[JobKind], limit: usize) -> Result<Vec<Job>, StoreError> {
        if limit == 0 {
            return Err(StoreError::InvalidBatchSize);
        }
        let jobs = self.read()?;
        let mut eligible: Vec<&Job> = jobs
            .iter()
            .filter(|job| job.is_eligible() && kinds.contains(&job.kind))
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        eligible.sort_by_key(|job| job.created_at);
        Ok(eligible.into_iter().take(limit).cloned().collect())
    }

    async fn transition(&self, jid: Xid, transition: Transition) -> Result<Job, StoreError> {
        let mut jobs = self.write()?;
        let job = jobs
            .iter_mut()
            .find(|job| job.id == jid)
            .ok_or(StoreError::JobNotFound(jid))?;
        if job.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                jid,
                from: job.status,
                to: transition.target(),
            });
        }
        transition.apply(job);
        Ok(job.clone())
    }

    async fn get(&self, jid: Xid) -> Result<Option<Job>, StoreError> {
        Ok(self.read()?.iter().find(|job| job.id == jid).cloned())
    }

    async fn purge_completed_before(&self, cutoff: DateTime) -> Result<u64, StoreError> {
        let mut jobs = self.write()?;
        let before = jobs.len();
        jobs.retain(|job| {
            !(job.status == JobStatus::Completed
                && job.processed_at.map_or(false, |at| at < cutoff))
        });
        Ok((before - jobs.len()) as u64)
    }

    async fn reclaim_stale(&self, cutoff: DateTime, now: DateTime) -> Result<u64, StoreError> {
        let mut jobs = self.write()?;
        let mut reclaimed = 0;
        for job in jobs
            .iter_mut()
            .filter(|job| job.status == JobStatus::Processing && job.updated_at < cutoff)
        {
            let error = STALE_PROCESSING_ERROR.to_string();
            let transition = if job.attempts_exhausted() {
                Transition::Fail { error, at: now }
            } else {
                Transition::Retry { error, at: now }
            };
            transition.apply(job);
            reclaimed += 1;
        }
        Ok(reclaimed)
    }

    async fn stats(&self) -> Result<JobStats, StoreError> {
        let jobs = self.read()?;
        let mut stats = JobStats::default();
        for job in jobs.iter() {
            stats.record(job.status, 1);
        }
        Ok(stats)
    }
}
