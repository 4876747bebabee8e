use super::job_router::JobRouter;
use super::reaper::{default_retention, Reaper};
use super::sweep_lock::SweepLock;
use crate::core::artifact::ArtifactStore;
use crate::core::job::{Job, Transition};
use crate::core::job_processor::JobError;
use crate::core::job_store::{JobStore, StoreError};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::instrument;

/// Tunables of a dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How many jobs one sweep picks up at most.
    pub batch_size: usize,
    /// Time budget for a single job attempt.
    pub job_timeout: std::time::Duration,
    /// Jobs `processing` for longer than this are assumed to belong to a crashed sweep.
    pub stale_after: Duration,
    /// How long completed jobs are kept.
    pub retention: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            job_timeout: std::time::Duration::from_secs(60),
            stale_after: Duration::minutes(10),
            retention: default_retention(),
        }
    }
}

impl DispatcherConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_job_timeout(mut self, job_timeout: std::time::Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.batch_size == 0 {
            return Err(StoreError::InvalidBatchSize);
        }
        if self.job_timeout.is_zero() {
            return Err(StoreError::InvalidDuration("job_timeout"));
        }
        if self.stale_after <= Duration::zero() {
            return Err(StoreError::InvalidDuration("stale_after"));
        }
        if self.retention <= Duration::zero() {
            return Err(StoreError::InvalidDuration("retention"));
        }
        Ok(())
    }
}

/// What happened to a job during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Failed, but will be picked up again by a later sweep.
    Retried,
    /// Failed for good.
    Failed,
}

/// Counters of a finished sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub reclaimed: u64,
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    /// Jobs whose status could not be written. They are left as they were.
    pub errored: usize,
    pub purged: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another sweep was already running, nothing was done.
    Skipped,
    Swept(SweepReport),
}

/// The single logical worker. Every call to [`run_sweep`](Dispatcher::run_sweep) reclaims stale
/// jobs, claims a batch of pending jobs, runs them one after another and reaps old completed
/// jobs.
///
/// Sweeps are serialized by a lock owned by this instance. Calling `run_sweep` while another
/// sweep is running returns [`SweepOutcome::Skipped`] without touching the store.
pub struct Dispatcher<S> {
    store: Arc<S>,
    artifacts: Arc<dyn ArtifactStore>,
    router: JobRouter,
    reaper: Reaper,
    config: DispatcherConfig,
    lock: SweepLock,
}

impl<S> Dispatcher<S>
where
    S: JobStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        artifacts: Arc<dyn ArtifactStore>,
        router: JobRouter,
        config: DispatcherConfig,
    ) -> Result<Self, StoreError> {
        config.validate()?;
        Ok(Self {
            store,
            artifacts,
            router,
            reaper: Reaper::new(config.retention),
            config,
            lock: SweepLock::default(),
        })
    }

    /// Whether a sweep is running right now.
    pub fn is_sweeping(&self) -> bool {
        self.lock.is_held()
    }

    /// Run one sweep. Errors are returned only when the store fails outside of a single job,
    /// e.g. while claiming the batch. Failures of individual jobs end up in the report.
    #[instrument(skip_all, err)]
    pub async fn run_sweep(&self) -> Result<SweepOutcome, StoreError> {
        let _permit = match self.lock.try_acquire() {
            Some(permit) => permit,
            None => {
                tracing::debug!("Sweep already in progress, skipping");
                return Ok(SweepOutcome::Skipped);
            }
        };

        let mut report = SweepReport::default();
        let now = Utc::now();
        report.reclaimed = self
            .store
            .reclaim_stale(now - self.config.stale_after, now)
            .await?;
        if report.reclaimed > 0 {
            tracing::warn!(reclaimed = report.reclaimed, "Reclaimed jobs stuck in processing");
        }

        let batch = self
            .store
            .claim_batch(&self.router.kinds(), self.config.batch_size)
            .await?;
        report.claimed = batch.len();
        if !batch.is_empty() {
            tracing::info!("Processing {} queued jobs", batch.len());
        }

        for job in batch {
            let jid = job.id;
            match self.process(job).await {
                Ok(JobOutcome::Completed) => report.completed += 1,
                Ok(JobOutcome::Retried) => report.retried += 1,
                Ok(JobOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    tracing::error!(jid = %jid, error = %e, "Failed to record job status");
                    report.errored += 1;
                }
            }
        }

        report.purged = self.reaper.reap(self.store.as_ref(), Utc::now()).await?;
        Ok(SweepOutcome::Swept(report))
    }

    /// Take a claimed job through one attempt. Only store failures escape.
    #[instrument(skip_all, err, fields(kind = %job.kind, jid = %job.id, subject_id = %job.subject_id))]
    async fn process(&self, job: Job) -> Result<JobOutcome, StoreError> {
        let job = self
            .store
            .transition(job.id, Transition::Begin { at: Utc::now() })
            .await?;

        match self.execute(&job).await {
            Ok(()) => {
                self.store
                    .transition(job.id, Transition::Complete { at: Utc::now() })
                    .await?;
                Ok(JobOutcome::Completed)
            }
            Err(e) if e.is_permanent() || job.attempts_exhausted() => {
                let error = e.to_string();
                tracing::warn!(attempts = job.attempts, error = %error, "Job failed permanently");
                self.store
                    .transition(
                        job.id,
                        Transition::Fail {
                            error: error.clone(),
                            at: Utc::now(),
                        },
                    )
                    .await?;
                if !matches!(e, JobError::SubjectNotFound) {
                    if let Err(e) = self.artifacts.record_failure(job.subject_id, &error).await {
                        tracing::warn!(error = %e, "Failed to note the failure on the artifact");
                    }
                }
                Ok(JobOutcome::Failed)
            }
            Err(e) => {
                tracing::error!(attempts = job.attempts, "Error during job processing: {}", e);
                self.store
                    .transition(
                        job.id,
                        Transition::Retry {
                            error: e.to_string(),
                            at: Utc::now(),
                        },
                    )
                    .await?;
                Ok(JobOutcome::Retried)
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<(), JobError> {
        if self.artifacts.find(job.subject_id).await?.is_none() {
            return Err(JobError::SubjectNotFound);
        }
        self.router.execute(job, self.config.job_timeout).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::analysis::{Analysis, AnalysisError, Analyzer};
    use crate::core::artifact::{Artifact, InMemoryArtifactStore};
    use crate::core::job::{JobStatus, JobStats};
    use crate::core::job_store::STALE_PROCESSING_ERROR;
    use crate::core::memory::InMemoryJobStore;
    use crate::core::producer::Producer;
    use crate::core::Xid;
    use crate::runner::analysis_job::AnalysisJob;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::{Notify, Semaphore};

    #[allow(dead_code)]
    pub fn setup_logger() {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .init();
    }

    fn sample_analysis() -> Analysis {
        Analysis {
            description: "A lighthouse on a rocky coast at sunset".into(),
            category: "landscape".into(),
            confidence: 0.93,
            tags: vec!["lighthouse".into(), "coast".into()],
        }
    }

    /// Replays scripted results, then succeeds forever.
    #[derive(Default)]
    struct ScriptedAnalyzer {
        script: Mutex<VecDeque<Result<Analysis, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedAnalyzer {
        fn new(script: Vec<Result<Analysis, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Analyzer for ScriptedAnalyzer {
        async fn analyze(&self, _locator: &str) -> Result<Analysis, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(analysis)) => Ok(analysis),
                Some(Err(message)) => Err(AnalysisError::Transport(message)),
                None => Ok(sample_analysis()),
            }
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Analyzer for AlwaysFails {
        async fn analyze(&self, locator: &str) -> Result<Analysis, AnalysisError> {
            Err(AnalysisError::Rejected(format!("cannot read {}", locator)))
        }
    }

    /// Blocks inside `analyze` until the test lets it go.
    struct Gate {
        entered: Notify,
        release: Semaphore,
    }

    #[async_trait]
    impl Analyzer for Gate {
        async fn analyze(&self, _locator: &str) -> Result<Analysis, AnalysisError> {
            self.entered.notify_one();
            let permit = self.release.acquire().await.unwrap();
            permit.forget();
            Ok(sample_analysis())
        }
    }

    /// Resolves artifacts but refuses to store analysis results on them.
    struct ReadOnlyArtifacts(Arc<InMemoryArtifactStore>);

    #[async_trait]
    impl ArtifactStore for ReadOnlyArtifacts {
        async fn find(&self, subject_id: Xid) -> anyhow::Result<Option<Artifact>> {
            self.0.find(subject_id).await
        }

        async fn record_analysis(&self, _subject_id: Xid, _analysis: &Analysis) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("artifact table is read-only"))
        }

        async fn record_failure(&self, subject_id: Xid, error: &str) -> anyhow::Result<()> {
            self.0.record_failure(subject_id, error).await
        }
    }

    struct Harness {
        store: Arc<InMemoryJobStore>,
        artifacts: Arc<InMemoryArtifactStore>,
        producer: Producer<InMemoryJobStore>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(InMemoryJobStore::default());
            Self {
                producer: Producer::new(store.clone()),
                store,
                artifacts: Arc::new(InMemoryArtifactStore::default()),
            }
        }

        fn dispatcher<A: Analyzer + 'static>(
            &self,
            analyzer: A,
            config: DispatcherConfig,
        ) -> Dispatcher<InMemoryJobStore> {
            let mut router = JobRouter::default();
            router.add_job_processor(AnalysisJob::new(analyzer, self.artifacts.clone()));
            Dispatcher::new(self.store.clone(), self.artifacts.clone(), router, config).unwrap()
        }

        async fn upload(&self) -> (Xid, Job) {
            let id = xid::new();
            let locator = format!("https://img.example/{}.jpg", id);
            self.artifacts.insert(Artifact::new(id, &locator)).unwrap();
            let job = self.producer.artifact_stored(id, locator).await.unwrap();
            (id, job)
        }

        async fn job(&self, jid: Xid) -> Job {
            self.store.get(jid).await.unwrap().unwrap()
        }

        async fn artifact(&self, id: Xid) -> Artifact {
            self.artifacts.find(id).await.unwrap().unwrap()
        }
    }

    fn swept(outcome: SweepOutcome) -> SweepReport {
        match outcome {
            SweepOutcome::Swept(report) => report,
            SweepOutcome::Skipped => panic!("sweep was skipped"),
        }
    }

    #[tokio::test]
    async fn successful_analysis_completes_job_and_updates_artifact() {
        let harness = Harness::new();
        let (subject, job) = harness.upload().await;
        let dispatcher = harness.dispatcher(
            Arc::new(ScriptedAnalyzer::default()),
            DispatcherConfig::default(),
        );

        let report = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(1, report.claimed);
        assert_eq!(1, report.completed);

        let job = harness.job(job.id).await;
        assert_eq!(JobStatus::Completed, job.status);
        assert_eq!(1, job.attempts);
        assert!(job.processed_at.is_some());
        assert!(job.last_error.is_none());

        let artifact = harness.artifact(subject).await;
        assert!(artifact.is_processed);
        assert_eq!(Some("landscape"), artifact.category.as_deref());
        assert_eq!(Some(0.93), artifact.confidence);
        assert_eq!(vec!["lighthouse", "coast"], artifact.tags);
    }

    #[tokio::test]
    async fn succeeds_on_second_attempt() {
        let harness = Harness::new();
        let (subject, job) = harness.upload().await;
        let analyzer = Arc::new(ScriptedAnalyzer::new(vec![
            Err("connection reset".into()),
            Ok(sample_analysis()),
        ]));
        let dispatcher = harness.dispatcher(analyzer.clone(), DispatcherConfig::default());

        let first = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(1, first.retried);
        let after_first = harness.job(job.id).await;
        assert_eq!(JobStatus::Pending, after_first.status);
        assert_eq!(1, after_first.attempts);
        assert!(after_first
            .last_error
            .as_deref()
            .unwrap()
            .contains("connection reset"));
        assert!(!harness.artifact(subject).await.is_processed);

        swept(dispatcher.run_sweep().await.unwrap());
        let job = harness.job(job.id).await;
        assert_eq!(JobStatus::Completed, job.status);
        assert_eq!(2, job.attempts);
        assert!(job.last_error.is_none());
        assert_eq!(2, analyzer.calls.load(Ordering::SeqCst));

        let artifact = harness.artifact(subject).await;
        assert!(artifact.is_processed);
        assert_eq!(
            Some("A lighthouse on a rocky coast at sunset"),
            artifact.description.as_deref()
        );
    }

    #[tokio::test]
    async fn always_failing_job_fails_after_max_attempts() {
        let harness = Harness::new();
        let (subject, job) = harness.upload().await;
        let dispatcher = harness.dispatcher(AlwaysFails, DispatcherConfig::default());

        for attempt in 1..=3 {
            swept(dispatcher.run_sweep().await.unwrap());
            let job = harness.job(job.id).await;
            assert_eq!(attempt, job.attempts);
            assert!(job.attempts <= job.max_attempts);
            let expected = if attempt < 3 {
                JobStatus::Pending
            } else {
                JobStatus::Failed
            };
            assert_eq!(expected, job.status);
        }

        let job = harness.job(job.id).await;
        let expected_error = format!(
            "Analysis service rejected the request: cannot read https://img.example/{}.jpg",
            subject
        );
        assert_eq!(Some(expected_error.as_str()), job.last_error.as_deref());

        // Nothing left to do, the failed job is never claimed again.
        let report = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(0, report.claimed);
        assert_eq!(3, harness.job(job.id).await.attempts);

        let artifact = harness.artifact(subject).await;
        assert!(!artifact.is_processed);
        assert_eq!(Some(expected_error), artifact.processing_error);
    }

    #[tokio::test]
    async fn missing_subject_fails_immediately() {
        let harness = Harness::new();
        let job = harness
            .producer
            .artifact_stored(xid::new(), "https://img.example/gone.jpg")
            .await
            .unwrap();
        let analyzer = Arc::new(ScriptedAnalyzer::default());
        let dispatcher = harness.dispatcher(analyzer.clone(), DispatcherConfig::default());

        let report = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(1, report.failed);

        let job = harness.job(job.id).await;
        assert_eq!(JobStatus::Failed, job.status);
        assert_eq!(Some("subject not found"), job.last_error.as_deref());
        assert_eq!(1, job.attempts);
        assert_eq!(0, analyzer.calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn batches_take_the_oldest_jobs_first() {
        let harness = Harness::new();
        let now = Utc::now();
        let mut ids = Vec::new();
        for age in (1..=7).rev() {
            let subject = xid::new();
            harness
                .artifacts
                .insert(Artifact::new(subject, "https://img.example/x.jpg"))
                .unwrap();
            let payload = bincode::encode_to_vec(
                crate::core::analysis::AnalysisPayload::new("https://img.example/x.jpg"),
                bincode::config::standard(),
            )
            .unwrap();
            let job = harness
                .store
                .enqueue_at(
                    crate::core::job::NewJob::new(
                        subject,
                        crate::core::job::JobKind::Analysis,
                        payload,
                    ),
                    now - Duration::minutes(age),
                )
                .await
                .unwrap();
            ids.push(job.id);
        }
        let dispatcher = harness.dispatcher(
            Arc::new(ScriptedAnalyzer::default()),
            DispatcherConfig::default(),
        );

        let first = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(5, first.claimed);
        for (i, jid) in ids.iter().enumerate() {
            let expected = if i < 5 {
                JobStatus::Completed
            } else {
                JobStatus::Pending
            };
            assert_eq!(expected, harness.job(*jid).await.status);
        }

        let second = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(2, second.claimed);
        assert_eq!(7, harness.store.stats().await.unwrap().completed);
    }

    #[tokio::test]
    async fn concurrent_sweep_is_a_no_op() {
        let harness = Harness::new();
        let (_, job) = harness.upload().await;
        let (_, other) = harness.upload().await;
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Semaphore::new(0),
        });
        let dispatcher = Arc::new(harness.dispatcher(gate.clone(), DispatcherConfig::default()));

        let running = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.run_sweep().await })
        };
        gate.entered.notified().await;
        assert!(dispatcher.is_sweeping());

        let before = harness.store.jobs().unwrap();
        assert_eq!(SweepOutcome::Skipped, dispatcher.run_sweep().await.unwrap());
        assert_eq!(before, harness.store.jobs().unwrap());
        assert_eq!(1, harness.job(job.id).await.attempts);
        assert_eq!(0, harness.job(other.id).await.attempts);

        gate.release.add_permits(2);
        let report = swept(running.await.unwrap().unwrap());
        assert_eq!(2, report.completed);
        assert!(!dispatcher.is_sweeping());
        assert_eq!(1, harness.job(other.id).await.attempts);
    }

    #[tokio::test]
    async fn reaps_old_completed_jobs_at_the_end_of_a_sweep() {
        let harness = Harness::new();
        let (_, old) = harness.upload().await;
        let (_, recent) = harness.upload().await;
        let (_, failed) = harness.upload().await;
        let long_ago = Utc::now() - Duration::hours(30);
        for (jid, last) in [
            (old.id, Transition::Complete { at: long_ago }),
            (recent.id, Transition::Complete { at: Utc::now() }),
            (
                failed.id,
                Transition::Fail {
                    error: "bad".into(),
                    at: long_ago,
                },
            ),
        ] {
            harness
                .store
                .transition(jid, Transition::Begin { at: long_ago })
                .await
                .unwrap();
            harness.store.transition(jid, last).await.unwrap();
        }
        let dispatcher = harness.dispatcher(
            Arc::new(ScriptedAnalyzer::default()),
            DispatcherConfig::default(),
        );

        let report = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(0, report.claimed);
        assert_eq!(1, report.purged);
        assert!(harness.store.get(old.id).await.unwrap().is_none());
        assert!(harness.store.get(recent.id).await.unwrap().is_some());
        assert!(harness.store.get(failed.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_processing_jobs_are_retried() {
        let harness = Harness::new();
        let (subject, job) = harness.upload().await;
        harness
            .store
            .transition(
                job.id,
                Transition::Begin {
                    at: Utc::now() - Duration::hours(1),
                },
            )
            .await
            .unwrap();
        let dispatcher = harness.dispatcher(
            Arc::new(ScriptedAnalyzer::default()),
            DispatcherConfig::default(),
        );

        let report = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(1, report.reclaimed);
        assert_eq!(1, report.completed);
        let job = harness.job(job.id).await;
        assert_eq!(JobStatus::Completed, job.status);
        assert_eq!(2, job.attempts);
        assert!(harness.artifact(subject).await.is_processed);

        let stats = harness.store.stats().await.unwrap();
        assert_eq!(
            JobStats {
                completed: 1,
                ..JobStats::default()
            },
            stats
        );
        assert_ne!(Some(STALE_PROCESSING_ERROR), job.last_error.as_deref());
    }

    #[tokio::test]
    async fn hung_analysis_times_out_and_is_retried() {
        struct Hangs;

        #[async_trait]
        impl Analyzer for Hangs {
            async fn analyze(&self, _locator: &str) -> Result<Analysis, AnalysisError> {
                futures::future::pending().await
            }
        }

        let harness = Harness::new();
        let (_, job) = harness.upload().await;
        let dispatcher = harness.dispatcher(
            Hangs,
            DispatcherConfig::default().with_job_timeout(std::time::Duration::from_millis(20)),
        );

        let report = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(1, report.retried);
        assert!(!dispatcher.is_sweeping());
        let job = harness.job(job.id).await;
        assert_eq!(JobStatus::Pending, job.status);
        assert!(job.last_error.unwrap().starts_with("Job failed to complete within"));
    }

    #[tokio::test]
    async fn artifact_write_failure_is_retried() {
        let harness = Harness::new();
        let (subject, job) = harness.upload().await;
        let artifacts: Arc<dyn ArtifactStore> =
            Arc::new(ReadOnlyArtifacts(harness.artifacts.clone()));
        let mut router = JobRouter::default();
        router.add_job_processor(AnalysisJob::new(ScriptedAnalyzer::default(), artifacts.clone()));
        let dispatcher = Dispatcher::new(
            harness.store.clone(),
            artifacts,
            router,
            DispatcherConfig::default(),
        )
        .unwrap();

        let report = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(1, report.claimed);
        assert_eq!(1, report.retried);
        assert_eq!(0, report.completed);

        let job = harness.job(job.id).await;
        assert_eq!(JobStatus::Pending, job.status);
        assert_eq!(1, job.attempts);
        assert!(job
            .last_error
            .unwrap()
            .contains("Failed to write analysis onto the artifact"));

        let artifact = harness.artifact(subject).await;
        assert!(!artifact.is_processed);
        assert!(artifact.description.is_none());
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let harness = Harness::new();
        let build = |config: DispatcherConfig| {
            Dispatcher::new(
                harness.store.clone(),
                harness.artifacts.clone(),
                JobRouter::default(),
                config,
            )
        };

        assert!(matches!(
            build(DispatcherConfig::default().with_batch_size(0)),
            Err(StoreError::InvalidBatchSize)
        ));
        assert!(matches!(
            build(DispatcherConfig::default().with_job_timeout(std::time::Duration::ZERO)),
            Err(StoreError::InvalidDuration("job_timeout"))
        ));
        assert!(matches!(
            build(DispatcherConfig::default().with_stale_after(Duration::minutes(-1))),
            Err(StoreError::InvalidDuration("stale_after"))
        ));
        assert!(matches!(
            build(DispatcherConfig::default().with_retention(Duration::zero())),
            Err(StoreError::InvalidDuration("retention"))
        ));
        assert!(build(DispatcherConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn jobs_without_attempts_are_never_queued() {
        let harness = Harness::new();
        let producer = Producer::new(harness.store.clone()).with_max_attempts(0);
        let result = producer
            .artifact_stored(xid::new(), "https://img.example/never.jpg")
            .await;
        assert!(matches!(result, Err(StoreError::InvalidMaxAttempts)));

        let dispatcher = harness.dispatcher(
            Arc::new(ScriptedAnalyzer::default()),
            DispatcherConfig::default(),
        );
        let report = swept(dispatcher.run_sweep().await.unwrap());
        assert_eq!(0, report.claimed);
        assert_eq!(JobStats::default(), harness.store.stats().await.unwrap());
    }
}
