use crate::core::analysis::Analysis;
use crate::core::Xid;
use anyhow::Context;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The externally owned record a job operates on, e.g. an uploaded image.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: Xid,
    /// Where the content can be retrieved from.
    pub locator: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub confidence: Option<f32>,
    pub tags: Vec<String>,
    pub is_processed: bool,
    pub processing_error: Option<String>,
}

impl Artifact {
    /// A freshly stored, not yet analyzed artifact.
    pub fn new(id: Xid, locator: impl Into<String>) -> Self {
        Self {
            id,
            locator: locator.into(),
            description: None,
            category: None,
            confidence: None,
            tags: Vec::new(),
            is_processed: false,
            processing_error: None,
        }
    }
}

/// Where the dispatcher resolves subjects and writes analysis results. Not owned by the queue;
/// the HTTP layer reads the same records while they are being updated.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Look the subject up. `Ok(None)` means it no longer exists.
    async fn find(&self, subject_id: Xid) -> anyhow::Result<Option<Artifact>>;

    /// Write analysis results onto the subject and mark it processed.
    async fn record_analysis(&self, subject_id: Xid, analysis: &Analysis) -> anyhow::Result<()>;

    /// Note why processing of the subject gave up.
    async fn record_failure(&self, subject_id: Xid, error: &str) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Arc<RwLock<HashMap<Xid, Artifact>>>,
}

impl InMemoryArtifactStore {
    pub fn insert(&self, artifact: Artifact) -> anyhow::Result<()> {
        let mut inner = self
            .artifacts
            .write()
            .map_err(|_| anyhow::anyhow!("Lock is poisoned"))?;
        inner.insert(artifact.id, artifact);
        Ok(())
    }

    fn update<F>(&self, subject_id: Xid, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Artifact),
    {
        let mut inner = self
            .artifacts
            .write()
            .map_err(|_| anyhow::anyhow!("Lock is poisoned"))?;
        let artifact = inner
            .get_mut(&subject_id)
            .with_context(|| format!("Artifact {} does not exist", subject_id))?;
        f(artifact);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn find(&self, subject_id: Xid) -> anyhow::Result<Option<Artifact>> {
        let inner = self
            .artifacts
            .read()
            .map_err(|_| anyhow::anyhow!("Lock is poisoned"))?;
        Ok(inner.get(&subject_id).cloned())
    }

    async fn record_analysis(&self, subject_id: Xid, analysis: &Analysis) -> anyhow::Result<()> {
        self.update(subject_id, |artifact| {
            artifact.description = Some(analysis.description.clone());
            artifact.category = Some(analysis.category.clone());
            artifact.confidence = Some(analysis.confidence);
            artifact.tags = analysis.tags.clone();
            artifact.is_processed = true;
            artifact.processing_error = None;
        })
    }

    async fn record_failure(&self, subject_id: Xid, error: &str) -> anyhow::Result<()> {
        self.update(subject_id, |artifact| {
            artifact.processing_error = Some(error.to_string());
        })
    }
}
