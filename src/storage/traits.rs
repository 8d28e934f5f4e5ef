//! Storage traits and error types
//!
//! This module defines the persistence API the crawl protocol and the refresh
//! engine consume.

use crate::model::{EventInfo, TicketInfo, VendorId, VendorSearchListing};
use crate::storage::{EventRecord, RefreshRow};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Event not found: {0}")]
    EventNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Implementations are used by exactly one job at a time, so no internal
/// locking is required. Every mutating call is committed on its own unless it
/// runs inside [`Storage::unit_of_work`].
pub trait Storage: Send {
    // ===== Crawl =====

    /// Gets every source URL already stored for a vendor
    fn get_known_urls(&self, vendor_id: VendorId) -> StorageResult<HashSet<String>>;

    /// Gets the configured search entry points for a vendor
    fn get_search_urls(&self, vendor_id: VendorId) -> StorageResult<Vec<VendorSearchListing>>;

    /// Inserts a search listing, or updates its `paginated` flag if it exists
    fn upsert_search_listing(&mut self, listing: &VendorSearchListing) -> StorageResult<()>;

    /// Creates an event and returns its assigned id
    ///
    /// Persists, in order: vendor id, event type, name, venue state, start
    /// time, invalid flag, source URL.
    fn create_event(&mut self, event: &EventInfo) -> StorageResult<i64>;

    /// Creates one ticket tier for an event
    fn create_ticket(&mut self, event_id: i64, ticket: &TicketInfo) -> StorageResult<()>;

    // ===== Refresh =====

    /// Overwrites the stored tier at `ticket.ticket_num` with the given values
    fn update_ticket(&mut self, event_id: i64, ticket: &TicketInfo) -> StorageResult<()>;

    /// Flags a stored event as permanently invalid
    fn invalidate_event(&mut self, event_id: i64) -> StorageResult<()>;

    /// Gets one row per stored ticket of every event due for refresh
    ///
    /// Rows are ordered so that all rows of one event are contiguous and
    /// tickets appear in `ticket_num` order.
    fn get_tickets_to_refresh(&self) -> StorageResult<Vec<RefreshRow>>;

    /// Records that the given events were refreshed just now
    fn mark_events_refreshed(&mut self, event_ids: &[i64]) -> StorageResult<()>;

    // ===== Inspection =====

    /// Gets a stored event by its natural key
    fn get_event_by_url(&self, vendor_id: VendorId, url: &str)
        -> StorageResult<Option<EventRecord>>;

    /// Gets the stored tickets of an event in `ticket_num` order
    fn get_tickets(&self, event_id: i64) -> StorageResult<Vec<TicketInfo>>;

    // ===== Units of work =====

    /// Opens a unit of work
    fn begin_unit(&mut self) -> StorageResult<()>;

    /// Commits the open unit of work
    fn commit_unit(&mut self) -> StorageResult<()>;

    /// Discards the open unit of work
    fn rollback_unit(&mut self) -> StorageResult<()>;

    /// Runs `work` as one atomic unit: committed if it returns `Ok`, rolled
    /// back otherwise
    fn unit_of_work<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StorageError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.begin_unit()?;
        match work(self) {
            Ok(value) => {
                self.commit_unit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback_unit() {
                    tracing::error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}
