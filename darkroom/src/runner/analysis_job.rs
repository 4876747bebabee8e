use crate::core::analysis::{AnalysisPayload, Analyzer};
use crate::core::artifact::ArtifactStore;
use crate::core::job::JobKind;
use crate::core::job_processor::{JobError, JobProcessor};
use crate::core::Xid;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

/// Runs the analyzer against an artifact and writes the normalized results back onto it.
pub struct AnalysisJob<A> {
    analyzer: A,
    artifacts: Arc<dyn ArtifactStore>,
}

impl<A: Analyzer> AnalysisJob<A> {
    pub fn new(analyzer: A, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            analyzer,
            artifacts,
        }
    }
}

#[async_trait]
impl<A: Analyzer> JobProcessor for AnalysisJob<A> {
    type Payload = AnalysisPayload;
    type Error = JobError;

    async fn handle(
        &self,
        _jid: Xid,
        subject_id: Xid,
        payload: Self::Payload,
    ) -> Result<(), Self::Error> {
        let analysis = self.analyzer.analyze(&payload.locator).await?.normalized();
        self.artifacts
            .record_analysis(subject_id, &analysis)
            .await
            .context("Failed to write analysis onto the artifact")?;
        tracing::debug!(
            subject_id = %subject_id,
            category = %analysis.category,
            confidence = analysis.confidence,
            "Artifact analyzed"
        );
        Ok(())
    }

    fn kind() -> JobKind {
        JobKind::Analysis
    }
}
