//! Vendor-agnostic crawl protocol
//!
//! A crawl pass turns every configured search page of one vendor into
//! persisted events and tickets:
//! 1. Load the vendor's search listings from storage
//! 2. Fetch each search page and reload the known-URL set
//! 3. Let the adapter pick out unseen events
//! 4. Fetch and extract each event's detail page, then persist it atomically
//! 5. Follow pagination links, reloading known URLs before every page
//!
//! Vendor adapters only supply the extraction steps through [`Crawler`].

use crate::crawler::Fetcher;
use crate::model::{EventInfo, EventTypeId, VendorId};
use crate::storage::Storage;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::ops::AddAssign;
use std::time::Duration;
use url::Url;

/// Capability contract every vendor adapter implements
///
/// Extraction methods are synchronous and take the page body as text, so
/// parsed documents never live across an await point.
#[async_trait]
pub trait Crawler: Send + Sync {
    // ===== Identity =====

    fn vendor_id(&self) -> VendorId;

    /// Short human-readable name used in logs and errors
    fn vendor_name(&self) -> &'static str;

    fn vendor_base_url(&self) -> &Url;

    // ===== Extension points =====

    /// Returns an `EventInfo` for every event on a search page whose URL is
    /// not in `known_urls`
    ///
    /// Fails when the page's expected structure is entirely absent.
    fn extract_new_events(
        &self,
        event_type_id: EventTypeId,
        known_urls: &HashSet<String>,
        page: &str,
    ) -> Result<Vec<EventInfo>>;

    /// Populates venue, date and tickets from a detail page, or marks the
    /// event invalid when the page carries nothing sellable
    fn extract_ticket_info(&self, event: &mut EventInfo, detail_page: &str) -> Result<()>;

    /// Returns the pagination links found on a search page
    fn extract_subsequent_urls(&self, page: &str) -> Result<Vec<String>>;

    /// Fetches an event detail page
    async fn fetch_event_url(&self, fetcher: &Fetcher, url: &str) -> Result<String> {
        fetcher.fetch(url).await
    }

    // ===== Helpers =====

    /// Re-derives an event's tickets from its detail page
    async fn load_tickets_for_event(&self, fetcher: &Fetcher, event: &mut EventInfo) -> Result<()> {
        let url = event.source_url.clone();
        let detail_page = self.fetch_event_url(fetcher, &url).await?;
        self.extract_ticket_info(event, &detail_page)
    }
}

/// Counters for one crawl pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Search pages fetched, including pagination pages
    pub pages: usize,

    /// Unseen events found on those pages
    pub discovered: usize,

    /// Events persisted with their tickets
    pub created: usize,

    /// Events persisted as invalid tombstones
    pub invalid: usize,
}

impl AddAssign for CrawlStats {
    fn add_assign(&mut self, other: Self) {
        self.pages += other.pages;
        self.discovered += other.discovered;
        self.created += other.created;
        self.invalid += other.invalid;
    }
}

impl fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} discovered, {} created, {} invalid",
            self.pages, self.discovered, self.created, self.invalid
        )
    }
}

/// Runs the crawl protocol for one vendor against one storage backend
pub struct CrawlSession<'a, S: Storage> {
    crawler: &'a dyn Crawler,
    fetcher: &'a Fetcher,
    storage: &'a mut S,
}

impl<'a, S: Storage> CrawlSession<'a, S> {
    pub fn new(crawler: &'a dyn Crawler, fetcher: &'a Fetcher, storage: &'a mut S) -> Self {
        Self {
            crawler,
            fetcher,
            storage,
        }
    }

    /// Performs one full crawl pass over the vendor's search listings
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStats)` - Every listing was processed
    /// * `Err(HarvestError)` - The first error aborts the rest of the pass
    pub async fn run_pass(&mut self) -> Result<CrawlStats> {
        let vendor_id = self.crawler.vendor_id();
        let listings = self.storage.get_search_urls(vendor_id)?;

        tracing::info!(
            "Starting {} crawl pass over {} search listings",
            self.crawler.vendor_name(),
            listings.len()
        );

        let mut stats = CrawlStats::default();
        for listing in &listings {
            stats += self
                .process_search_url(listing.event_type_id, &listing.search_url, listing.paginated)
                .await?;
        }
        drop(listings);

        tracing::info!(
            "Finished {} crawl pass: {}",
            self.crawler.vendor_name(),
            stats
        );
        Ok(stats)
    }

    /// Crawls forever, sleeping `interval` between passes
    ///
    /// Only returns when a pass fails.
    pub async fn run(&mut self, interval: Duration) -> Result<Infallible> {
        loop {
            self.run_pass().await?;
            tracing::info!(
                "{} crawler sleeping for {:?}",
                self.crawler.vendor_name(),
                interval
            );
            tokio::time::sleep(interval).await;
        }
    }

    /// Processes one search URL and, if `paginated`, every page it links to
    pub async fn process_search_url(
        &mut self,
        event_type_id: EventTypeId,
        search_url: &str,
        paginated: bool,
    ) -> Result<CrawlStats> {
        let mut stats = CrawlStats::default();

        let page = self.fetcher.fetch(search_url).await?;
        stats += self.process_page(event_type_id, &page).await?;

        if paginated {
            let subsequent_urls = self.crawler.extract_subsequent_urls(&page)?;
            drop(page);

            tracing::debug!("Following {} pagination links", subsequent_urls.len());
            for url in &subsequent_urls {
                let page = self.fetcher.fetch(url).await?;
                stats += self.process_page(event_type_id, &page).await?;
            }
        }

        Ok(stats)
    }

    /// Discovers unseen events on `page`, then fetches, extracts and
    /// persists each of them in discovery order
    ///
    /// Each event is created together with its tickets in one unit of work,
    /// so a failure never leaves an event without the tickets it was scraped
    /// with.
    pub async fn extract_event_and_ticket_info(
        &mut self,
        event_type_id: EventTypeId,
        known_urls: &HashSet<String>,
        page: &str,
    ) -> Result<CrawlStats> {
        let events = self
            .crawler
            .extract_new_events(event_type_id, known_urls, page)?;

        let mut stats = CrawlStats {
            discovered: events.len(),
            ..CrawlStats::default()
        };

        for mut event in events {
            let detail_page = self
                .crawler
                .fetch_event_url(self.fetcher, &event.source_url)
                .await?;
            self.crawler.extract_ticket_info(&mut event, &detail_page)?;
            drop(detail_page);

            let event_id = self.storage.unit_of_work(|storage: &mut S| -> Result<i64> {
                let id = storage.create_event(&event)?;
                event.assign_vendor_event_id(id)?;
                if !event.is_invalid() {
                    for ticket in &event.ticket_list {
                        storage.create_ticket(id, ticket)?;
                    }
                }
                Ok(id)
            })?;

            if event.is_invalid() {
                tracing::info!("Stored invalid event {} as {}", event, event_id);
                stats.invalid += 1;
            } else {
                tracing::info!(
                    "Created event {} as {} with {} tickets",
                    event,
                    event_id,
                    event.ticket_list.len()
                );
                stats.created += 1;
            }
        }

        Ok(stats)
    }

    async fn process_page(&mut self, event_type_id: EventTypeId, page: &str) -> Result<CrawlStats> {
        // Earlier pages of this pass may have inserted events
        let known_urls = self.storage.get_known_urls(self.crawler.vendor_id())?;

        let mut stats = self
            .extract_event_and_ticket_info(event_type_id, &known_urls, page)
            .await?;
        stats.pages += 1;
        Ok(stats)
    }
}
