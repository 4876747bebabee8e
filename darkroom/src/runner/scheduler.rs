use super::dispatcher::{Dispatcher, SweepOutcome};
use crate::core::job_store::JobStore;
use crate::core::mixins::LogError;
use chrono::Utc;
use cron::Schedule;
use futures::future::join_all;
use rand::seq::SliceRandom;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const JITTER_INTERVAL_MS: [u64; 10] = [0, 1, 1, 2, 3, 5, 8, 13, 21, 34];

/// When sweeps are triggered.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Period of the fixed interval trigger.
    pub interval: Duration,
    /// Cron expression (with seconds) of the calendar trigger.
    pub calendar: String,
    /// Delay before the one-off sweep after start.
    pub initial_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            calendar: String::from("0 * * * * *"),
            initial_delay: Duration::from_secs(5),
        }
    }
}

impl SchedulerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_calendar(mut self, calendar: impl Into<String>) -> Self {
        self.calendar = calendar.into();
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Interval must be greater than zero: {0:?}")]
    InvalidInterval(Duration),
    #[error("Invalid calendar expression {expression:?}: {reason}")]
    InvalidCalendar { expression: String, reason: String },
}

/// Which trigger started a sweep. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Startup,
    Interval,
    Calendar,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Startup => "startup",
            Trigger::Interval => "interval",
            Trigger::Calendar => "calendar",
        })
    }
}

/// Drives a dispatcher from two independent triggers, a fixed interval and a calendar schedule,
/// plus a single sweep shortly after start.
///
/// Triggers may fire at the same moment. All of them go through [`Dispatcher::run_sweep`], which
/// skips when a sweep is already running.
pub struct Scheduler<S> {
    dispatcher: Arc<Dispatcher<S>>,
    config: SchedulerConfig,
    calendar: Schedule,
}

impl<S> Scheduler<S>
where
    S: JobStore + 'static,
{
    pub fn new(
        dispatcher: Arc<Dispatcher<S>>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        if config.interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(config.interval));
        }
        let calendar =
            Schedule::from_str(&config.calendar).map_err(|e| SchedulerError::InvalidCalendar {
                expression: config.calendar.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            dispatcher,
            config,
            calendar,
        })
    }

    /// Spawn the triggers onto the current tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        tracing::info!(
            interval = ?self.config.interval,
            calendar = %self.config.calendar,
            initial_delay = ?self.config.initial_delay,
            "Starting queue processor"
        );
        let token = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(run_initial(
                self.dispatcher.clone(),
                self.config.initial_delay,
                token.clone(),
            )),
            tokio::spawn(run_interval(
                self.dispatcher.clone(),
                self.config.interval,
                token.clone(),
            )),
            tokio::spawn(run_calendar(self.dispatcher, self.calendar, token.clone())),
        ];
        SchedulerHandle { token, tasks }
    }
}

/// Handle to running triggers. Dropping it leaves them running; call
/// [`shutdown`](SchedulerHandle::shutdown) to stop them.
pub struct SchedulerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop all triggers. A sweep that is already running is allowed to finish first.
    pub async fn shutdown(self) {
        self.token.cancel();
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Trigger task ended abnormally");
            }
        }
        tracing::info!("Queue processor stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

async fn sweep<S: JobStore + 'static>(dispatcher: &Dispatcher<S>, trigger: Trigger) {
    if let Ok(outcome) = dispatcher
        .run_sweep()
        .await
        .log_error("Queue processing error")
    {
        match outcome {
            SweepOutcome::Skipped => tracing::debug!(%trigger, "Sweep skipped"),
            SweepOutcome::Swept(report) => tracing::debug!(%trigger, ?report, "Sweep finished"),
        }
    }
}

async fn run_initial<S: JobStore + 'static>(
    dispatcher: Arc<Dispatcher<S>>,
    delay: Duration,
    token: CancellationToken,
) {
    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::time::sleep(delay) => sweep(&dispatcher, Trigger::Startup).await,
    }
}

async fn run_interval<S: JobStore + 'static>(
    dispatcher: Arc<Dispatcher<S>>,
    period: Duration,
    token: CancellationToken,
) {
    // Jitter keeps this trigger from lining up exactly with the calendar one.
    let start = Instant::now() + period + get_random_jitter();
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => sweep(&dispatcher, Trigger::Interval).await,
        }
    }
}

async fn run_calendar<S: JobStore + 'static>(
    dispatcher: Arc<Dispatcher<S>>,
    calendar: Schedule,
    token: CancellationToken,
) {
    loop {
        let Some(next) = calendar.after(&Utc::now()).next() else {
            tracing::warn!("Calendar has no upcoming runs, calendar trigger stops");
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => sweep(&dispatcher, Trigger::Calendar).await,
        }
    }
}

fn get_random_jitter() -> Duration {
    JITTER_INTERVAL_MS
        .choose(&mut rand::thread_rng())
        .map(|ms| Duration::from_millis(*ms))
        .unwrap_or_else(|| Duration::from_millis(5)) // Always takes a happy path technically
}
