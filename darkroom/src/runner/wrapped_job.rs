use crate::core::job::JobKind;
use crate::core::job_processor::{JobError, JobProcessor};
use crate::core::Xid;
use async_trait::async_trait;
use bincode::{config::Configuration, Decode, Encode};
use bytes::Bytes;
use tracing::instrument;

/// Shorthand for boxed trait object for a WrappedJob.
pub type BoxedJobProcessor = Box<dyn JobProcessor<Payload = Bytes, Error = JobError>>;

/// Object-safe implementation of a job that can be used by the dispatcher. Generally speaking, you
/// don't need to directly use this type, JobRouter takes care of everything related to it.
pub struct WrappedJobProcessor<T: JobProcessor> {
    job: T,
    config: Configuration,
}

impl<J> WrappedJobProcessor<J>
where
    J: JobProcessor + 'static,
    J::Payload: Decode<()> + Encode,
    J::Error: Into<JobError>,
{
    pub fn new(job: J) -> Self {
        let config = bincode::config::standard();
        Self { job, config }
    }

    pub fn boxed(self) -> BoxedJobProcessor {
        Box::new(self) as BoxedJobProcessor
    }
}

#[async_trait]
impl<J> JobProcessor for WrappedJobProcessor<J>
where
    J: JobProcessor + 'static,
    J::Payload: Decode<()> + Encode,
    J::Error: Into<JobError>,
{
    type Payload = Bytes;
    type Error = JobError;

    #[instrument(skip_all, err, fields(jid = %jid, subject_id = %subject_id, kind = %Self::kind()))]
    async fn handle(
        &self,
        jid: Xid,
        subject_id: Xid,
        payload: Self::Payload,
    ) -> Result<(), Self::Error> {
        let (payload, _) = bincode::decode_from_slice(payload.as_ref(), self.config)?;
        self.job
            .handle(jid, subject_id, payload)
            .await
            .map_err(Into::into)
    }

    fn kind() -> JobKind {
        J::kind()
    }
}

impl<J> From<J> for WrappedJobProcessor<J>
where
    J: JobProcessor + 'static,
    J::Payload: Decode<()> + Encode,
    J::Error: Into<JobError>,
{
    fn from(job: J) -> Self {
        Self::new(job)
    }
}
