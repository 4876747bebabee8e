use crate::core::analysis::AnalysisError;
use crate::core::job::JobKind;
use crate::core::Xid;
use async_trait::async_trait;
use std::convert::Infallible;
use thiserror::Error;

/// A job-handler interface. Your Payload should implement `bincode::{Decode, Encode}` if you're
/// planning to use it with the dispatcher and producer from this crate.
///
/// ## Example
/// ```rust,ignore
/// use darkroom::prelude::{Decode, Encode, JobKind, JobProcessor, Xid};
/// use async_trait::async_trait;
///
/// struct RenderThumbnail;
///
/// #[derive(Encode, Decode)]
/// struct ThumbnailPayload {
///     locator: String,
///     width: u32,
/// }
///
/// #[async_trait]
/// impl JobProcessor for RenderThumbnail {
///     type Payload = ThumbnailPayload;
///     type Error = anyhow::Error;
///
///     fn kind() -> JobKind {
///         JobKind::Thumbnail
///     }
///
///     async fn handle(&self, jid: Xid, subject_id: Xid, payload: Self::Payload) -> Result<(), Self::Error> {
///         // ..render and upload
///         Ok(())
///     }
/// }
/// ```
/// ## Services
/// If your job processor requires external services (i.e. an analysis client, artifact store, etc.),
/// add them directly as your struct fields.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// What is the input to this handler. If you want to use `JobRouter`, then this must implement `bincode::Decode` and `bincode::Encode`.
    type Payload: Send;
    /// What error is returned
    type Error: Send;

    /// Run one attempt of the job. The subject has already been resolved by the dispatcher.
    async fn handle(
        &self,
        jid: Xid,
        subject_id: Xid,
        payload: Self::Payload,
    ) -> Result<(), Self::Error>;

    /// Job kind, used to route claimed jobs to this processor.
    fn kind() -> JobKind
    where
        Self: Sized;
}

/// Error types returned by job processors and by the dispatcher while executing a job.
#[derive(Error, Debug)]
pub enum JobError {
    /// Encountered an error when tried to deserialize the payload.
    #[error("Failed to deserialize job payload")]
    DecodeError {
        #[from]
        source: bincode::error::DecodeError,
    },

    /// The subject went away. It will not come back, so this is never retried.
    #[error("subject not found")]
    SubjectNotFound,

    #[error("No processor is registered for job kind {0}")]
    UnknownKind(JobKind),

    #[error("Job failed to complete within {0:#?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Error originated in inner-job implementation
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobError {
    /// Permanent errors fail the job no matter how many attempts it has left.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            JobError::SubjectNotFound | JobError::UnknownKind(_) | JobError::DecodeError { .. }
        )
    }
}

impl From<Infallible> for JobError {
    fn from(_: Infallible) -> Self {
        unreachable!();
    }
}
