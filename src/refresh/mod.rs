//! Refresh and reconciliation engine
//!
//! A refresh cycle re-checks every stored event that is due:
//! 1. Load due events with their stored tickets
//! 2. Re-run only the detail-page extraction through the owning adapter
//! 3. Apply the invalid policy, or reconcile stored against fresh tickets
//! 4. Mark every reconciled event refreshed in one batch
//!
//! Events are processed one at a time and their working sets are released
//! before the next one is loaded from the queue.

mod reconcile;

pub use reconcile::{reconcile, TicketChange};

use crate::config::{InvalidPolicy, RefreshConfig};
use crate::crawler::{CrawlerRegistry, Fetcher};
use crate::model::{EventInfo, VendorId};
use crate::storage::{group_refresh_rows, Storage};
use crate::Result;
use std::collections::HashSet;
use std::fmt;

/// Vendor-sensitive refresh behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub invalid_policy: InvalidPolicy,

    /// Vendors whose shrinking ticket lists never demote stored tiers
    ///
    /// For these vendors a shorter fresh list produces no writes at all, so
    /// price changes on the surviving tiers are also left alone until the
    /// list grows back to at least the stored length.
    pub skip_sold_out_demotion: HashSet<VendorId>,
}

impl RefreshPolicy {
    pub fn from_config(config: &RefreshConfig) -> Self {
        Self {
            invalid_policy: config.invalid_policy,
            skip_sold_out_demotion: config.skip_sold_out_demotion.iter().copied().collect(),
        }
    }

    pub fn allows_sold_out_demotion(&self, vendor_id: VendorId) -> bool {
        !self.skip_sold_out_demotion.contains(&vendor_id)
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::from_config(&RefreshConfig::default())
    }
}

/// Counters for one refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Events whose detail page was fetched and extracted
    pub checked: usize,
    pub tickets_updated: usize,
    pub tickets_created: usize,
    pub invalidated: usize,

    /// Events owned by a vendor with no registered adapter
    pub skipped: usize,

    /// Events whose detail page could not be fetched or extracted
    pub failed: usize,
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} checked, {} tickets updated, {} tickets created, {} invalidated, {} skipped, {} failed",
            self.checked,
            self.tickets_updated,
            self.tickets_created,
            self.invalidated,
            self.skipped,
            self.failed
        )
    }
}

/// Runs refresh cycles against one storage backend
pub struct Refresher<'a, S: Storage> {
    registry: &'a CrawlerRegistry,
    fetcher: &'a Fetcher,
    storage: &'a mut S,
    policy: &'a RefreshPolicy,
}

impl<'a, S: Storage> Refresher<'a, S> {
    pub fn new(
        registry: &'a CrawlerRegistry,
        fetcher: &'a Fetcher,
        storage: &'a mut S,
        policy: &'a RefreshPolicy,
    ) -> Self {
        Self {
            registry,
            fetcher,
            storage,
            policy,
        }
    }

    /// Performs one refresh cycle over every event currently due
    ///
    /// An event whose page cannot be fetched or extracted is logged, counted
    /// as failed and left due for the next cycle; the rest are still
    /// refreshed. If storage fails, the events reconciled before it are
    /// still marked refreshed and then the error is returned.
    pub async fn run_cycle(&mut self) -> Result<RefreshSummary> {
        tracing::info!("Commencing refresh cycle");

        let events = group_refresh_rows(self.storage.get_tickets_to_refresh()?);
        tracing::info!("{} events due for refresh", events.len());

        let mut summary = RefreshSummary::default();
        let mut refreshed = Vec::new();
        let outcome = self.refresh_events(events, &mut refreshed, &mut summary).await;

        if !refreshed.is_empty() {
            self.storage.mark_events_refreshed(&refreshed)?;
        }
        outcome?;

        tracing::info!("Finished refresh cycle: {}", summary);
        Ok(summary)
    }

    async fn refresh_events(
        &mut self,
        mut events: Vec<EventInfo>,
        refreshed: &mut Vec<i64>,
        summary: &mut RefreshSummary,
    ) -> Result<()> {
        let registry = self.registry;

        while let Some(stored) = events.pop() {
            let event_id = match stored.vendor_event_id() {
                Some(id) => id,
                None => continue,
            };

            let crawler = match registry.get(stored.vendor_id) {
                Some(crawler) => crawler,
                None => {
                    tracing::warn!(
                        "No crawler for vendor {}, skipping event {}",
                        stored.vendor_id,
                        event_id
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            let mut latest = stored.fresh_copy();
            if let Err(e) = crawler.load_tickets_for_event(self.fetcher, &mut latest).await {
                tracing::error!("Failed to refresh event {} ({}): {}", event_id, stored.source_url, e);
                summary.failed += 1;
                continue;
            }
            summary.checked += 1;

            if latest.is_invalid() {
                match self.policy.invalid_policy {
                    InvalidPolicy::Invalidate => {
                        self.storage.invalidate_event(event_id)?;
                        summary.invalidated += 1;
                        tracing::info!("Invalidated event {}", event_id);
                    }
                    InvalidPolicy::Ignore => {
                        tracing::info!("Event {} now reads as invalid, leaving it untouched", event_id);
                    }
                }
                continue;
            }

            let changes = reconcile(
                &stored.ticket_list,
                &latest.ticket_list,
                self.policy.allows_sold_out_demotion(stored.vendor_id),
            );
            drop(stored);
            drop(latest);

            self.apply_changes(event_id, &changes, summary)?;
            refreshed.push(event_id);
        }

        Ok(())
    }

    fn apply_changes(
        &mut self,
        event_id: i64,
        changes: &[TicketChange],
        summary: &mut RefreshSummary,
    ) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        self.storage.unit_of_work(|storage: &mut S| -> Result<()> {
            for change in changes {
                let ticket = change.ticket();
                tracing::debug!(
                    "Event {} ticket {} ({}): {:?}",
                    event_id,
                    ticket.ticket_num,
                    ticket.ticket_type,
                    change
                );
                match change {
                    TicketChange::Create(ticket) => storage.create_ticket(event_id, ticket)?,
                    TicketChange::Update(ticket) => storage.update_ticket(event_id, ticket)?,
                }
            }
            Ok(())
        })?;

        for change in changes {
            match change {
                TicketChange::Create(_) => summary.tickets_created += 1,
                TicketChange::Update(_) => summary.tickets_updated += 1,
            }
        }

        tracing::debug!("Applied {} ticket changes to event {}", changes.len(), event_id);
        Ok(())
    }
}
