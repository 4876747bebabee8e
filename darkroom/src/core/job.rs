use crate::core::{Bytes, DateTime, Xid};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Attempts a job gets unless the producer says otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What kind of work a job represents. Every kind is executed by the processor registered for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    /// Describe, categorize and tag an uploaded artifact.
    Analysis,
    /// Render a thumbnail for an uploaded artifact.
    Thumbnail,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Analysis, JobKind::Thumbnail];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Analysis => "analysis",
            JobKind::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(JobKind::Analysis),
            "thumbnail" => Ok(JobKind::Thumbnail),
            other => Err(ParseEnumError::new("job kind", other)),
        }
    }
}

/// Where a job is in its lifecycle.
///
/// ```text
/// pending ──► processing ──► completed
///    ▲            │
///    └── retry ◄──┼────────► failed
/// ```
///
/// `completed` and `failed` are terminal: nothing moves a job out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ParseEnumError::new("job status", other)),
        }
    }
}

/// Returned when a stored kind or status string is not one we know about.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {what}: {value}")]
pub struct ParseEnumError {
    what: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

/// A persisted unit of deferred work tied to a subject artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: Xid,
    /// The artifact this job operates on. Owned by someone else.
    pub subject_id: Xid,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Execution attempts made so far. Incremented when a sweep starts working on the job.
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub processed_at: Option<DateTime>,
    /// Bincode-encoded, kind-specific payload.
    pub payload: Bytes,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Job {
    /// Whether a sweep may pick this job up.
    pub fn is_eligible(&self) -> bool {
        self.status == JobStatus::Pending && self.attempts < self.max_attempts
    }

    /// Whether another failure would exhaust this job.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Everything a producer decides about a job before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub subject_id: Xid,
    pub kind: JobKind,
    pub payload: Bytes,
    pub max_attempts: u32,
}

impl NewJob {
    pub fn new(subject_id: Xid, kind: JobKind, payload: impl Into<Bytes>) -> Self {
        Self {
            subject_id,
            kind,
            payload: payload.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Turn the request into a pending job created at `now`.
    pub fn into_job(self, id: Xid, now: DateTime) -> Job {
        Job {
            id,
            subject_id: self.subject_id,
            kind: self.kind,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: self.max_attempts,
            last_error: None,
            processed_at: None,
            payload: self.payload,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A status change applied by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Start an attempt: move to `processing` and bump `attempts`.
    Begin { at: DateTime },
    /// The attempt succeeded.
    Complete { at: DateTime },
    /// The attempt failed but the job may run again.
    Retry { error: String, at: DateTime },
    /// The job will never run again.
    Fail { error: String, at: DateTime },
}

impl Transition {
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Begin { .. } => JobStatus::Processing,
            Transition::Complete { .. } => JobStatus::Completed,
            Transition::Retry { .. } => JobStatus::Pending,
            Transition::Fail { .. } => JobStatus::Failed,
        }
    }

    pub fn at(&self) -> DateTime {
        match self {
            Transition::Begin { at }
            | Transition::Complete { at }
            | Transition::Retry { at, .. }
            | Transition::Fail { at, .. } => *at,
        }
    }

    /// Apply this transition to an in-memory job record. Stores that keep rows elsewhere apply the
    /// same field changes in their own query language.
    pub fn apply(&self, job: &mut Job) {
        job.status = self.target();
        job.updated_at = self.at();
        match self {
            Transition::Begin { .. } => job.attempts += 1,
            Transition::Complete { at } => {
                job.processed_at = Some(*at);
                job.last_error = None;
            }
            Transition::Retry { error, .. } | Transition::Fail { error, .. } => {
                job.last_error = Some(error.clone());
            }
        }
    }
}

/// Job counts grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobStats {
    pub fn record(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
        }
    }

    /// Jobs that still have work ahead of them.
    pub fn outstanding(&self) -> u64 {
        self.pending + self.processing
    }

    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}
