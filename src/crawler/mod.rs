//! Crawler module for vendor crawling and job coordination
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry-on-timeout
//! - Markup helpers shared by vendor adapters
//! - The vendor-agnostic crawl protocol and adapter registry
//! - Job scheduling and the sequential work coordinator

mod coordinator;
mod fetcher;
pub mod parser;
mod protocol;
mod registry;
mod scheduler;

pub use coordinator::{
    open_configured_storage, run_harvest, HarvestRunner, JobRunner, WorkCoordinator,
};
pub use fetcher::{build_http_client, Fetcher, RetryPolicy};
pub use protocol::{CrawlSession, CrawlStats, Crawler};
pub use registry::CrawlerRegistry;
pub use scheduler::{JobKind, JobSchedule, ScheduledJob};
