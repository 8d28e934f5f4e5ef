use crate::crawler::RetryPolicy;
use crate::model::{EventTypeId, VendorId, VendorSearchListing};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the ticket harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default, rename = "search-listing")]
    pub search_listings: Vec<SearchListingEntry>,
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Wait between attempts after a timeout (seconds)
    #[serde(rename = "retry-delay-secs", default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Attempts before a timeout is surfaced; absent retries forever
    #[serde(rename = "max-attempts", default)]
    pub max_attempts: Option<u32>,
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_secs(self.retry_delay_secs);
        match self.max_attempts {
            Some(max) => RetryPolicy::bounded(max, delay),
            None => RetryPolicy::unbounded(delay),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_attempts: None,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// How long after its last refresh an event is due again (minutes)
    #[serde(
        rename = "refresh-due-after-minutes",
        default = "default_refresh_due_after_minutes"
    )]
    pub refresh_due_after_minutes: u64,
}

/// Periodic job configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(
        rename = "refresh-interval-minutes",
        default = "default_refresh_interval_minutes"
    )]
    pub refresh_interval_minutes: u64,

    #[serde(
        rename = "crawl-interval-minutes",
        default = "default_crawl_interval_minutes"
    )]
    pub crawl_interval_minutes: u64,

    /// Added to every computed sleep so a job is never woken early
    #[serde(rename = "safety-margin-secs", default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,

    /// Vendors that get a crawl job, in execution order
    #[serde(rename = "crawl-vendors", default = "default_crawl_vendors")]
    pub crawl_vendors: Vec<VendorId>,
}

impl ScheduleConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes * 60)
    }

    pub fn crawl_interval(&self) -> Duration {
        Duration::from_secs(self.crawl_interval_minutes * 60)
    }

    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: default_refresh_interval_minutes(),
            crawl_interval_minutes: default_crawl_interval_minutes(),
            safety_margin_secs: default_safety_margin_secs(),
            crawl_vendors: default_crawl_vendors(),
        }
    }
}

/// What the refresh pass does with an event whose page now reads as invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidPolicy {
    /// Persist the event as a tombstone so it is never refreshed again
    #[default]
    Invalidate,

    /// Leave the event untouched; it stays due and is retried next pass
    Ignore,
}

/// Refresh reconciliation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(rename = "invalid-policy", default)]
    pub invalid_policy: InvalidPolicy,

    /// Vendors whose shrinking ticket lists never demote stored tiers to
    /// sold out
    #[serde(
        rename = "skip-sold-out-demotion",
        default = "default_skip_sold_out_demotion"
    )]
    pub skip_sold_out_demotion: Vec<VendorId>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            invalid_policy: InvalidPolicy::default(),
            skip_sold_out_demotion: default_skip_sold_out_demotion(),
        }
    }
}

/// One search page to crawl, as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct SearchListingEntry {
    #[serde(rename = "vendor-id")]
    pub vendor_id: VendorId,

    #[serde(rename = "event-type-id")]
    pub event_type_id: EventTypeId,

    #[serde(rename = "search-url")]
    pub search_url: String,

    #[serde(default)]
    pub paginated: bool,
}

impl From<&SearchListingEntry> for VendorSearchListing {
    fn from(entry: &SearchListingEntry) -> Self {
        VendorSearchListing::new(
            entry.vendor_id,
            entry.event_type_id,
            entry.search_url.clone(),
            entry.paginated,
        )
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retry_delay_secs() -> u64 {
    30
}

fn default_refresh_due_after_minutes() -> u64 {
    20
}

fn default_refresh_interval_minutes() -> u64 {
    20
}

fn default_crawl_interval_minutes() -> u64 {
    240
}

fn default_safety_margin_secs() -> u64 {
    1
}

fn default_crawl_vendors() -> Vec<VendorId> {
    vec![1, 2, 3]
}

fn default_skip_sold_out_demotion() -> Vec<VendorId> {
    vec![3]
}
