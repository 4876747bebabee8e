use super::wrapped_job::{BoxedJobProcessor, WrappedJobProcessor};
use crate::core::job::{Job, JobKind};
use crate::core::job_processor::{JobError, JobProcessor};
use bincode::{Decode, Encode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::instrument;

/// A job processor router. Matches job kind to job processor implementation.
/// This type requires that your payloads implement `Encode` + `Decode` from bincode. Those traits are re-exported in prelude.
///
/// ## Example
/// ```rust,ignore
/// use darkroom::prelude::*;
///
/// let router = {
///     let mut r = JobRouter::default();
///     r.add_job_processor(AnalysisJob::new(my_analyzer, artifacts.clone()));
///     r
/// };
/// assert_eq!(vec![JobKind::Analysis], router.kinds());
///```
#[derive(Default)]
pub struct JobRouter {
    jobs: BTreeMap<JobKind, BoxedJobProcessor>,
}

impl JobRouter {
    /// Register a job processor with the router. If a processor for that kind is already present,
    /// the first one stays.
    pub fn add_job_processor<J>(&mut self, job: J)
    where
        J: JobProcessor + 'static,
        J::Payload: Decode<()> + Encode,
        J::Error: Into<JobError>,
    {
        let kind = J::kind();
        let boxed = WrappedJobProcessor::new(job).boxed();
        self.jobs.entry(kind).or_insert(boxed);
    }

    /// Kinds the router can execute, in a stable order.
    pub fn kinds(&self) -> Vec<JobKind> {
        self.jobs.keys().copied().collect()
    }

    /// Run one attempt of an already claimed job, bounded by `timeout`.
    #[instrument(skip_all, err, fields(kind = %job.kind, jid = %job.id, attempts = job.attempts))]
    pub async fn execute(&self, job: &Job, timeout: Duration) -> Result<(), JobError> {
        let processor = self
            .jobs
            .get(&job.kind)
            .ok_or(JobError::UnknownKind(job.kind))?;
        tokio::time::timeout(
            timeout,
            processor.handle(job.id, job.subject_id, job.payload.clone()),
        )
        .await
        .map_err(|_| JobError::Timeout(timeout))?
    }
}
