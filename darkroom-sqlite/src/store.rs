use crate::types::{to_millis, JobRow};
use anyhow::Context;
use async_trait::async_trait;
use darkroom::core::job::{Job, JobKind, JobStats, JobStatus, NewJob, Transition};
use darkroom::core::job_store::{JobStore, StoreError, STALE_PROCESSING_ERROR};
use darkroom::core::{new_xid, DateTime, Xid};
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::instrument;

/// An implementation of the JobStore backed by SQLite
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Use an existing pool. Run [`MIGRATOR`](crate::MIGRATOR) against it first.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch(&self, jid: Xid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query("SELECT * FROM darkroom_jobs WHERE jid = ?1")
            .bind(jid.to_string())
            .try_map(|row| JobRow::from_row(&row))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch job")?;
        Ok(row.map(|JobRow(job)| job))
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip_all, err, fields(subject_id = %job.subject_id, kind = %job.kind, payload_size = job.payload.len()))]
    async fn enqueue_at(&self, job: NewJob, now: DateTime) -> Result<Job, StoreError> {
        if job.max_attempts == 0 {
            return Err(StoreError::InvalidMaxAttempts);
        }
        let job = job.into_job(new_xid(), now);
        sqlx::query(
            "INSERT INTO darkroom_jobs \
             (jid, subject_id, kind, status, attempts, max_attempts, payload, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(job.id.to_string())
        .bind(job.subject_id.to_string())
        .bind(job.kind.as_str())
        .bind(job.status.as_str())
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.payload.as_ref())
        .bind(to_millis(job.created_at))
        .bind(to_millis(job.updated_at))
        .execute(&self.pool)
        .await
        .context("Failed to add job to the queue")?;
        Ok(job)
    }

    #[instrument(skip_all, err, fields(limit = limit))]
    async fn claim_batch(&self, kinds: &[JobKind], limit: usize) -> Result<Vec<Job>, StoreError> {
        if limit == 0 {
            return Err(StoreError::InvalidBatchSize);
        }
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT * FROM darkroom_jobs WHERE status = 'pending' AND attempts < max_attempts AND kind IN (",
        );
        {
            let mut separated = builder.separated(",");
            for kind in kinds {
                separated.push_bind(kind.as_str());
            }
        }
        builder.push(") ORDER BY created_at ASC, rowid ASC LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = builder
            .build()
            .try_map(|row| JobRow::from_row(&row))
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch pending jobs")?;
        Ok(rows.into_iter().map(|JobRow(job)| job).collect())
    }

    #[instrument(skip_all, err, fields(jid = %jid, to = %transition.target()))]
    async fn transition(&self, jid: Xid, transition: Transition) -> Result<Job, StoreError> {
        let jid_string = jid.to_string();
        let at = to_millis(transition.at());
        // Terminal rows are never matched, so nothing ever leaves `completed` or `failed`.
        let query = match &transition {
            Transition::Begin { .. } => sqlx::query(
                "UPDATE darkroom_jobs SET status = 'processing', attempts = attempts + 1, updated_at = ?2 \
                 WHERE jid = ?1 AND status NOT IN ('completed', 'failed') RETURNING *",
            )
            .bind(jid_string)
            .bind(at),
            Transition::Complete { .. } => sqlx::query(
                "UPDATE darkroom_jobs SET status = 'completed', processed_at = ?2, last_error = NULL, updated_at = ?2 \
                 WHERE jid = ?1 AND status NOT IN ('completed', 'failed') RETURNING *",
            )
            .bind(jid_string)
            .bind(at),
            Transition::Retry { error, .. } | Transition::Fail { error, .. } => sqlx::query(
                "UPDATE darkroom_jobs SET status = ?3, last_error = ?4, updated_at = ?2 \
                 WHERE jid = ?1 AND status NOT IN ('completed', 'failed') RETURNING *",
            )
            .bind(jid_string)
            .bind(at)
            .bind(transition.target().as_str())
            .bind(error.clone()),
        };

        let updated = query
            .try_map(|row| JobRow::from_row(&row))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update job status")?;

        match updated {
            Some(JobRow(job)) => Ok(job),
            None => match self.fetch(jid).await? {
                Some(job) => Err(StoreError::InvalidTransition {
                    jid,
                    from: job.status,
                    to: transition.target(),
                }),
                None => Err(StoreError::JobNotFound(jid)),
            },
        }
    }

    #[instrument(skip_all, err, fields(jid = %jid))]
    async fn get(&self, jid: Xid) -> Result<Option<Job>, StoreError> {
        self.fetch(jid).await
    }

    #[instrument(skip_all, err, ret)]
    async fn purge_completed_before(&self, cutoff: DateTime) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM darkroom_jobs WHERE status = 'completed' AND processed_at < ?1",
        )
        .bind(to_millis(cutoff))
        .execute(&self.pool)
        .await
        .context("Failed to purge completed jobs")?;
        Ok(result.rows_affected())
    }

    #[instrument(skip_all, err, ret)]
    async fn reclaim_stale(&self, cutoff: DateTime, now: DateTime) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE darkroom_jobs \
             SET status = CASE WHEN attempts >= max_attempts THEN 'failed' ELSE 'pending' END, \
                 last_error = ?3, updated_at = ?2 \
             WHERE status = 'processing' AND updated_at < ?1",
        )
        .bind(to_millis(cutoff))
        .bind(to_millis(now))
        .bind(STALE_PROCESSING_ERROR)
        .execute(&self.pool)
        .await
        .context("Failed to reclaim stale jobs")?;
        Ok(result.rows_affected())
    }

    #[instrument(skip_all, err)]
    async fn stats(&self) -> Result<JobStats, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM darkroom_jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .context("Failed to count jobs")?;
        let mut stats = JobStats::default();
        for row in rows {
            let status: String = row.try_get("status").context("Missing status column")?;
            let count: i64 = row.try_get("count").context("Missing count column")?;
            let status = JobStatus::from_str(&status).context("Unknown status in the queue")?;
            stats.record(status, count as u64);
        }
        Ok(stats)
    }
}
