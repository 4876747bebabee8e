use anyhow::Context;
use async_trait::async_trait;
use darkroom::core::new_xid;
use darkroom::prelude::*;
use darkroom_sqlite::{SqliteJobStore, MIGRATOR};
use rand::Rng;
use sqlx::sqlite::SqlitePoolOptions;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Pretends to be a remote model that drops a share of the requests.
struct FlakyAnalyzer {
    failure_percent: u32,
    calls: AtomicUsize,
}

#[async_trait]
impl Analyzer for FlakyAnalyzer {
    async fn analyze(&self, locator: &str) -> Result<Analysis, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (latency_ms, roll) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(5..50), rng.gen_range(0..100))
        };
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        if roll < self.failure_percent {
            return Err(AnalysisError::Transport(format!(
                "upstream timed out while reading {}",
                locator
            )));
        }
        Ok(Analysis {
            description: format!("Synthetic photograph stored at {}", locator),
            category: String::from("synthetic"),
            confidence: 0.42 + roll as f32 / 100.0,
            tags: Vec::new(),
        })
    }
}

fn arg<T: FromStr>(position: usize, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::args().nth(position) {
        Some(raw) => T::from_str(&raw).with_context(|| format!("Invalid argument {:?}", raw)),
        None => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let count: usize = arg(1, 20)?;
    let failure_percent: u32 = arg(2, 20)?;
    let database_url: String = arg(3, String::from("sqlite::memory:"))?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(&database_url)
        .await
        .with_context(|| format!("Failed to open {}", database_url))?;
    MIGRATOR.run(&pool).await.context("Failed to migrate")?;
    let store = Arc::new(SqliteJobStore::with_pool(pool));

    let artifacts = Arc::new(InMemoryArtifactStore::default());
    let producer = Producer::new(store.clone());
    for i in 0..count {
        let id = new_xid();
        let locator = format!("https://cdn.example/uploads/{}/{}.jpg", i, id);
        artifacts.insert(Artifact::new(id, &locator))?;
        producer.artifact_stored(id, locator).await?;
    }
    // An upload that was deleted before it could be analyzed.
    producer
        .artifact_stored(new_xid(), "https://cdn.example/uploads/deleted.jpg")
        .await?;

    let analyzer = Arc::new(FlakyAnalyzer {
        failure_percent,
        calls: AtomicUsize::new(0),
    });
    let router = {
        let mut r = JobRouter::default();
        r.add_job_processor(AnalysisJob::new(analyzer.clone(), artifacts.clone()));
        r
    };
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        artifacts.clone(),
        router,
        DispatcherConfig::default().with_job_timeout(Duration::from_secs(5)),
    )?);
    let scheduler = Scheduler::new(
        dispatcher,
        SchedulerConfig::default()
            .with_interval(Duration::from_millis(250))
            .with_calendar("* * * * * *")
            .with_initial_delay(Duration::from_millis(10)),
    )?
    .start();

    let started = Instant::now();
    let stats = loop {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = store.stats().await?;
        if stats.outstanding() == 0 {
            break stats;
        }
    };
    scheduler.shutdown().await;

    println!("Jobs: {}", stats.total());
    println!("completed: {}", stats.completed);
    println!("failed: {}", stats.failed);
    println!("analyzer calls: {}", analyzer.calls.load(Ordering::SeqCst));
    println!("elapsed: {:?}", started.elapsed());
    Ok(())
}
