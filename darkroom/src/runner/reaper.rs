use crate::core::job_store::{JobStore, StoreError};
use crate::core::DateTime;
use chrono::Duration;
use tracing::instrument;

/// How long completed jobs are kept around by default.
pub fn default_retention() -> Duration {
    Duration::hours(24)
}

/// Deletes completed jobs once they are older than the retention window. Failed jobs are kept for
/// inspection and never reaped.
#[derive(Debug, Clone, Copy)]
pub struct Reaper {
    retention: Duration,
}

impl Default for Reaper {
    fn default() -> Self {
        Self::new(default_retention())
    }
}

impl Reaper {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }

    /// Purge completed jobs whose `processed_at` is older than `now - retention`.
    #[instrument(skip_all, err, fields(retention_secs = self.retention.num_seconds()))]
    pub async fn reap<S>(&self, store: &S, now: DateTime) -> Result<u64, StoreError>
    where
        S: JobStore + ?Sized,
    {
        let purged = store.purge_completed_before(now - self.retention).await?;
        if purged > 0 {
            tracing::debug!(purged, "Reaped completed jobs");
        }
        Ok(purged)
    }
}
