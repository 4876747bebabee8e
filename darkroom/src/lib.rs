#![doc = include_str!("../README.md")]

pub mod core;

/// Default implementation of the dispatcher and its triggers.
#[cfg(feature = "runner")]
pub mod runner {
    pub mod analysis_job;
    pub mod dispatcher;
    pub mod job_router;
    pub mod reaper;
    pub mod scheduler;
    pub mod sweep_lock;
    pub mod wrapped_job;
}

/// Re-exports to simplify importing this crate types.
pub mod prelude {
    pub use super::core::{
        analysis::{Analysis, AnalysisError, AnalysisPayload, Analyzer},
        artifact::{Artifact, ArtifactStore, InMemoryArtifactStore},
        job::{Job, JobKind, JobStats, JobStatus, NewJob, Transition},
        job_processor::{JobError, JobProcessor},
        job_store::{JobStore, StoreError},
        memory::InMemoryJobStore,
        producer::Producer,
        Duration, Xid,
    };
    #[cfg(feature = "runner")]
    pub use super::runner::{
        analysis_job::AnalysisJob,
        dispatcher::{Dispatcher, DispatcherConfig, SweepOutcome, SweepReport},
        job_router::JobRouter,
        reaper::Reaper,
        scheduler::{Scheduler, SchedulerConfig, SchedulerError, SchedulerHandle},
    };
    pub use bincode::{Decode, Encode};
}
