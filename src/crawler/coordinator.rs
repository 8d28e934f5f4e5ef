//! Work coordinator - sequential job orchestration
//!
//! This module contains the main loop that time-multiplexes the refresh job
//! and every vendor crawl job onto one executor, including:
//! - Running every due job to completion, one at a time
//! - Isolating job failures so one vendor cannot stall the others
//! - Sleeping until the next job becomes eligible
//! - Wiring configuration, storage, fetcher and adapters into a runner
//!
//! Only one job is ever in flight; each pass can hold many events in memory,
//! so peak memory is bounded by the largest single job.

use crate::config::{Config, ScheduleConfig};
use crate::crawler::scheduler::{JobKind, JobSchedule};
use crate::crawler::{CrawlSession, CrawlerRegistry, Fetcher};
use crate::model::VendorSearchListing;
use crate::refresh::{RefreshPolicy, Refresher};
use crate::storage::{open_storage, SqliteStorage, Storage};
use crate::Result;
use async_trait::async_trait;
use std::convert::Infallible;
use std::path::Path;
use std::time::Instant;

/// Executes one scheduled job to completion
#[async_trait]
pub trait JobRunner: Send {
    async fn run_job(&mut self, kind: JobKind) -> Result<()>;
}

/// Drives a [`JobSchedule`] against a [`JobRunner`]
pub struct WorkCoordinator {
    schedule: JobSchedule,
}

impl WorkCoordinator {
    pub fn new(schedule: JobSchedule) -> Self {
        Self { schedule }
    }

    /// Creates a coordinator with the configured intervals and vendors
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(JobSchedule::new(
            config.refresh_interval(),
            config.crawl_interval(),
            &config.crawl_vendors,
            config.safety_margin(),
        ))
    }

    pub fn schedule(&self) -> &JobSchedule {
        &self.schedule
    }

    /// Runs every job due right now, in table order
    ///
    /// A failing job is logged and its finish time is still recorded, so it
    /// is retried after its normal interval rather than immediately.
    ///
    /// # Returns
    ///
    /// The number of jobs that were run
    pub async fn run_due_jobs<R>(&mut self, runner: &mut R) -> usize
    where
        R: JobRunner + ?Sized,
    {
        let due = self.schedule.due_jobs(Instant::now());

        for kind in &due {
            tracing::info!("Starting {} job", kind);
            let started = Instant::now();

            match runner.run_job(*kind).await {
                Ok(()) => tracing::info!("Finished {} job in {:?}", kind, started.elapsed()),
                Err(e) => tracing::error!("{} job failed after {:?}: {}", kind, started.elapsed(), e),
            }

            self.schedule.record_finished(*kind, Instant::now());
        }

        due.len()
    }

    /// Runs the schedule forever
    pub async fn run<R>(&mut self, runner: &mut R) -> Infallible
    where
        R: JobRunner + ?Sized,
    {
        loop {
            self.run_due_jobs(runner).await;

            let sleep = self.schedule.sleep_duration(Instant::now());
            if !sleep.is_zero() {
                tracing::info!("Sleeping for {:?} until the next job is due", sleep);
                tokio::time::sleep(sleep).await;
            }
        }
    }
}

/// Production runner: crawls and refreshes against one storage backend
pub struct HarvestRunner<S: Storage> {
    registry: CrawlerRegistry,
    fetcher: Fetcher,
    storage: S,
    policy: RefreshPolicy,
}

impl<S: Storage> HarvestRunner<S> {
    pub fn new(registry: CrawlerRegistry, fetcher: Fetcher, storage: S, policy: RefreshPolicy) -> Self {
        Self {
            registry,
            fetcher,
            storage,
            policy,
        }
    }
}

impl HarvestRunner<SqliteStorage> {
    /// Builds the runner from configuration, opening and seeding storage
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            CrawlerRegistry::with_default_vendors(),
            Fetcher::new(&config.fetch)?,
            open_configured_storage(config)?,
            RefreshPolicy::from_config(&config.refresh),
        ))
    }
}

#[async_trait]
impl<S: Storage> JobRunner for HarvestRunner<S> {
    async fn run_job(&mut self, kind: JobKind) -> Result<()> {
        match kind {
            JobKind::Refresh => {
                Refresher::new(&self.registry, &self.fetcher, &mut self.storage, &self.policy)
                    .run_cycle()
                    .await?;
            }
            JobKind::Crawl(vendor_id) => {
                let crawler = self.registry.require(vendor_id)?;
                CrawlSession::new(crawler, &self.fetcher, &mut self.storage)
                    .run_pass()
                    .await?;
            }
        }
        Ok(())
    }
}

/// Opens the configured database and upserts the configured search listings
pub fn open_configured_storage(config: &Config) -> Result<SqliteStorage> {
    let due_after = chrono::Duration::minutes(config.storage.refresh_due_after_minutes as i64);
    let mut storage =
        open_storage(Path::new(&config.storage.database_path))?.with_refresh_due_after(due_after);

    for entry in &config.search_listings {
        storage.upsert_search_listing(&VendorSearchListing::from(entry))?;
    }
    tracing::info!(
        "Storage ready at {} with {} configured search listings",
        config.storage.database_path,
        config.search_listings.len()
    );

    Ok(storage)
}

/// Runs the harvester until the process is stopped
///
/// This is the main entry point for unattended operation. It will:
/// 1. Open storage and seed the configured search listings
/// 2. Build the HTTP fetcher and the vendor adapters
/// 3. Run the refresh job and every vendor crawl job on their intervals
///
/// # Returns
///
/// Only returns if setup fails
pub async fn run_harvest(config: Config) -> Result<Infallible> {
    let mut runner = HarvestRunner::from_config(&config)?;
    let mut coordinator = WorkCoordinator::from_config(&config.schedule);
    Ok(coordinator.run(&mut runner).await)
}
