use crate::core::analysis::AnalysisPayload;
use crate::core::job::{Job, JobKind, NewJob, DEFAULT_MAX_ATTEMPTS};
use crate::core::job_store::{JobStore, StoreError};
use crate::core::Xid;
use bincode::Encode;
use std::sync::Arc;
use tracing::instrument;

/// The enqueueing side of the queue. Used by whatever stores artifacts.
pub struct Producer<S> {
    store: Arc<S>,
    max_attempts: u32,
    bincode_config: bincode::config::Configuration,
}

impl<S> Clone for Producer<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            max_attempts: self.max_attempts,
            bincode_config: self.bincode_config,
        }
    }
}

impl<S: JobStore> Producer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            bincode_config: bincode::config::standard(),
        }
    }

    /// Attempts given to every job this producer submits.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Encode `payload` and store a pending job of `kind` for the subject.
    #[instrument(skip_all, err, fields(subject_id = %subject_id, kind = %kind, payload_size))]
    pub async fn submit<P: Encode>(
        &self,
        subject_id: Xid,
        kind: JobKind,
        payload: &P,
    ) -> Result<Job, StoreError> {
        let payload = bincode::encode_to_vec(payload, self.bincode_config)?;
        tracing::Span::current().record("payload_size", payload.len());
        let job = NewJob::new(subject_id, kind, payload).with_max_attempts(self.max_attempts);
        self.store.enqueue(job).await
    }

    /// Queue analysis for an artifact that was just durably stored.
    pub async fn artifact_stored(
        &self,
        subject_id: Xid,
        locator: impl Into<String>,
    ) -> Result<Job, StoreError> {
        let payload = AnalysisPayload::new(locator);
        self.submit(subject_id, JobKind::Analysis, &payload).await
    }

    /// Ask for an artifact to be analyzed again. Always creates a fresh job; earlier jobs for the
    /// subject, failed or not, are left alone.
    pub async fn reprocess(
        &self,
        subject_id: Xid,
        locator: impl Into<String>,
    ) -> Result<Job, StoreError> {
        tracing::info!(subject_id = %subject_id, "Reprocessing requested");
        self.artifact_stored(subject_id, locator).await
    }
}
