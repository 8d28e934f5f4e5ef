//! Job schedule for the work coordinator
//!
//! This module handles:
//! - The fixed job table: one refresh job plus one crawl job per vendor
//! - Deciding which jobs are due at a given instant
//! - Computing how long to sleep until the next job becomes eligible
//!
//! The schedule never reads the clock itself; callers pass `now` in, which
//! keeps the policy deterministic under test.

use crate::model::VendorId;
use std::fmt;
use std::time::{Duration, Instant};

/// What a scheduled job does when it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Refresh,
    Crawl(VendorId),
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Refresh => write!(f, "refresh"),
            JobKind::Crawl(vendor_id) => write!(f, "crawl (vendor {})", vendor_id),
        }
    }
}

/// One row of the job table
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub kind: JobKind,

    /// Minimum time between the end of one run and the start of the next
    pub interval: Duration,

    /// When the last run finished; `None` means never run, so due at once
    pub last_finished: Option<Instant>,
}

impl ScheduledJob {
    pub fn new(kind: JobKind, interval: Duration) -> Self {
        Self {
            kind,
            interval,
            last_finished: None,
        }
    }

    /// Returns true if the job should run at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_eligible().map_or(true, |eligible| now >= eligible)
    }

    /// Earliest instant the job may run again, `None` if it never ran
    pub fn next_eligible(&self) -> Option<Instant> {
        self.last_finished.map(|finished| finished + self.interval)
    }
}

/// In-memory job table owned by the coordinator
///
/// Nothing is persisted: after a restart every job is immediately eligible.
#[derive(Debug, Clone)]
pub struct JobSchedule {
    jobs: Vec<ScheduledJob>,
    safety_margin: Duration,
}

impl JobSchedule {
    /// Creates the job table: the refresh job first, then one crawl job per
    /// vendor in the given order
    pub fn new(
        refresh_interval: Duration,
        crawl_interval: Duration,
        crawl_vendors: &[VendorId],
        safety_margin: Duration,
    ) -> Self {
        let mut jobs = vec![ScheduledJob::new(JobKind::Refresh, refresh_interval)];
        jobs.extend(
            crawl_vendors
                .iter()
                .map(|vendor_id| ScheduledJob::new(JobKind::Crawl(*vendor_id), crawl_interval)),
        );

        Self {
            jobs,
            safety_margin,
        }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Jobs due at `now`, in table order
    pub fn due_jobs(&self, now: Instant) -> Vec<JobKind> {
        self.jobs
            .iter()
            .filter(|job| job.is_due(now))
            .map(|job| job.kind)
            .collect()
    }

    /// Records that `kind` finished at `finished`
    pub fn record_finished(&mut self, kind: JobKind, finished: Instant) {
        if let Some(job) = self.jobs.iter_mut().find(|job| job.kind == kind) {
            job.last_finished = Some(finished);
        }
    }

    /// How long to sleep before the next job becomes eligible
    ///
    /// Zero when something is already due; otherwise the time until the
    /// earliest next-eligible instant plus the safety margin.
    pub fn sleep_duration(&self, now: Instant) -> Duration {
        if self.jobs.iter().any(|job| job.is_due(now)) {
            return Duration::ZERO;
        }

        self.jobs
            .iter()
            .filter_map(ScheduledJob::next_eligible)
            .min()
            .map_or(Duration::ZERO, |earliest| {
                earliest.saturating_duration_since(now) + self.safety_margin
            })
    }
}
