//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{from_db_flag, to_db_flag, EventInfo, TicketInfo, VendorId, VendorSearchListing};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{EventRecord, RefreshRow};
use crate::HarvestError;
use chrono::{Duration, Local, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Default time after its last refresh before an event is due again
const DEFAULT_REFRESH_DUE_AFTER_MINUTES: i64 = 20;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    refresh_due_after: Duration,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            refresh_due_after: Duration::minutes(DEFAULT_REFRESH_DUE_AFTER_MINUTES),
        })
    }

    /// Creates an in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            refresh_due_after: Duration::minutes(DEFAULT_REFRESH_DUE_AFTER_MINUTES),
        })
    }

    /// Sets how long after its last refresh an event becomes due again
    pub fn with_refresh_due_after(mut self, due_after: Duration) -> Self {
        self.refresh_due_after = due_after;
        self
    }
}

/// Reads a decimal stored as exact text
fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a ticket starting at column `first`
fn ticket_columns(row: &Row<'_>, first: usize) -> rusqlite::Result<TicketInfo> {
    Ok(TicketInfo {
        ticket_num: row.get(first)?,
        ticket_type: row.get(first + 1)?,
        ticket_price: decimal_column(row, first + 2)?,
        booking_fee: decimal_column(row, first + 3)?,
        sold_out: from_db_flag(row.get::<_, Option<String>>(first + 4)?.as_deref()),
    })
}

impl Storage for SqliteStorage {
    // ===== Crawl =====

    fn get_known_urls(&self, vendor_id: VendorId) -> StorageResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM events WHERE vendor_id = ?1")?;

        let urls = stmt
            .query_map(params![vendor_id], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;

        Ok(urls)
    }

    fn get_search_urls(&self, vendor_id: VendorId) -> StorageResult<Vec<VendorSearchListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT vendor_id, event_type_id, search_url, paginated
             FROM search_listings WHERE vendor_id = ?1 ORDER BY id",
        )?;

        let listings = stmt
            .query_map(params![vendor_id], |row| {
                Ok(VendorSearchListing {
                    vendor_id: row.get(0)?,
                    event_type_id: row.get(1)?,
                    search_url: row.get(2)?,
                    paginated: from_db_flag(row.get::<_, Option<String>>(3)?.as_deref()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(listings)
    }

    fn upsert_search_listing(&mut self, listing: &VendorSearchListing) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO search_listings (vendor_id, event_type_id, search_url, paginated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(vendor_id, event_type_id, search_url)
             DO UPDATE SET paginated = excluded.paginated",
            params![
                listing.vendor_id,
                listing.event_type_id,
                listing.search_url,
                to_db_flag(listing.paginated)
            ],
        )?;
        Ok(())
    }

    fn create_event(&mut self, event: &EventInfo) -> StorageResult<i64> {
        let now = Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO events
             (vendor_id, event_type_id, event_name, venue_state, event_datetime, invalid, url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.vendor_id,
                event.event_type_id,
                event.event_name,
                event.venue_state,
                event.event_datetime,
                to_db_flag(event.is_invalid()),
                event.source_url,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_ticket(&mut self, event_id: i64, ticket: &TicketInfo) -> StorageResult<()> {
        let now = Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO tickets
             (event_id, ticket_num, ticket_type, ticket_price, booking_fee, sold_out, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event_id,
                ticket.ticket_num,
                ticket.ticket_type,
                ticket.ticket_price.to_string(),
                ticket.booking_fee.to_string(),
                to_db_flag(ticket.sold_out),
                now
            ],
        )?;
        Ok(())
    }

    // ===== Refresh =====

    fn update_ticket(&mut self, event_id: i64, ticket: &TicketInfo) -> StorageResult<()> {
        let now = Utc::now().timestamp();
        self.conn.execute(
            "UPDATE tickets SET ticket_type = ?3, ticket_price = ?4, booking_fee = ?5,
             sold_out = ?6, updated_at = ?7
             WHERE event_id = ?1 AND ticket_num = ?2",
            params![
                event_id,
                ticket.ticket_num,
                ticket.ticket_type,
                ticket.ticket_price.to_string(),
                ticket.booking_fee.to_string(),
                to_db_flag(ticket.sold_out),
                now
            ],
        )?;
        Ok(())
    }

    fn invalidate_event(&mut self, event_id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE events SET invalid = 'Y' WHERE id = ?1",
            params![event_id],
        )?;

        if changed == 0 {
            return Err(StorageError::EventNotFound(event_id));
        }

        Ok(())
    }

    fn get_tickets_to_refresh(&self) -> StorageResult<Vec<RefreshRow>> {
        let now = Local::now().naive_local();
        let stale_before = Utc::now().timestamp() - self.refresh_due_after.num_seconds();

        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.vendor_id, e.event_datetime, e.url,
                    t.ticket_num, t.ticket_type, t.ticket_price, t.booking_fee, t.sold_out
             FROM events e
             LEFT JOIN tickets t ON t.event_id = e.id
             WHERE e.invalid IS NULL
               AND (e.event_datetime IS NULL OR e.event_datetime >= ?1)
               AND (e.last_refreshed_at IS NULL OR e.last_refreshed_at <= ?2)
             ORDER BY e.id, t.ticket_num",
        )?;

        let rows = stmt
            .query_map(params![now, stale_before], |row| {
                let ticket_num: Option<u32> = row.get(4)?;
                let ticket = match ticket_num {
                    Some(_) => Some(ticket_columns(row, 4)?),
                    None => None,
                };

                Ok(RefreshRow {
                    event_id: row.get(0)?,
                    vendor_id: row.get(1)?,
                    event_datetime: row.get(2)?,
                    url: row.get(3)?,
                    ticket,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn mark_events_refreshed(&mut self, event_ids: &[i64]) -> StorageResult<()> {
        let now = Utc::now().timestamp();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE events SET last_refreshed_at = ?1 WHERE id = ?2")?;
            for event_id in event_ids {
                stmt.execute(params![now, event_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Inspection =====

    fn get_event_by_url(
        &self,
        vendor_id: VendorId,
        url: &str,
    ) -> StorageResult<Option<EventRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, vendor_id, event_type_id, event_name, venue_state, event_datetime,
             invalid, url, last_refreshed_at
             FROM events WHERE vendor_id = ?1 AND url = ?2",
        )?;

        let event = stmt
            .query_row(params![vendor_id, url], |row| {
                Ok(EventRecord {
                    id: row.get(0)?,
                    vendor_id: row.get(1)?,
                    event_type_id: row.get(2)?,
                    event_name: row.get(3)?,
                    venue_state: row.get(4)?,
                    event_datetime: row.get(5)?,
                    invalid: from_db_flag(row.get::<_, Option<String>>(6)?.as_deref()),
                    url: row.get(7)?,
                    last_refreshed_at: row.get(8)?,
                })
            })
            .optional()?;

        Ok(event)
    }

    fn get_tickets(&self, event_id: i64) -> StorageResult<Vec<TicketInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT ticket_num, ticket_type, ticket_price, booking_fee, sold_out
             FROM tickets WHERE event_id = ?1 ORDER BY ticket_num",
        )?;

        let tickets = stmt
            .query_map(params![event_id], |row| ticket_columns(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tickets)
    }

    // ===== Units of work =====

    fn begin_unit(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit_unit(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback_unit(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
