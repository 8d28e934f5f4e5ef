//! Storage module for persisting harvested data
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Search listing, event and ticket persistence
//! - Selecting the events due for refresh and recording refresh times

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::model::{EventInfo, EventTypeId, TicketInfo, VendorId};
use crate::HarvestError;
use chrono::NaiveDateTime;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Represents a stored event
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: i64,
    pub vendor_id: VendorId,
    pub event_type_id: Option<EventTypeId>,
    pub event_name: Option<String>,
    pub venue_state: Option<String>,
    pub event_datetime: Option<NaiveDateTime>,
    pub invalid: bool,
    pub url: String,
    pub last_refreshed_at: Option<i64>,
}

/// One row of the refresh result set
///
/// `ticket` is `None` for an event that has no stored tickets yet.
#[derive(Debug, Clone)]
pub struct RefreshRow {
    pub event_id: i64,
    pub vendor_id: VendorId,
    pub event_datetime: Option<NaiveDateTime>,
    pub url: String,
    pub ticket: Option<TicketInfo>,
}

/// Groups contiguous refresh rows into one `EventInfo` per stored event
///
/// Relies on the result set ordering guaranteed by
/// [`Storage::get_tickets_to_refresh`]: a change of event id starts a new
/// event.
pub fn group_refresh_rows(rows: Vec<RefreshRow>) -> Vec<EventInfo> {
    let mut events: Vec<EventInfo> = Vec::new();

    for row in rows {
        let starts_new_event = events
            .last()
            .map_or(true, |current| current.vendor_event_id() != Some(row.event_id));

        if starts_new_event {
            events.push(EventInfo::stored(
                row.event_id,
                row.vendor_id,
                row.url,
                row.event_datetime,
            ));
        }

        if let (Some(current), Some(ticket)) = (events.last_mut(), row.ticket) {
            current.ticket_list.push(ticket);
        }
    }

    events
}
