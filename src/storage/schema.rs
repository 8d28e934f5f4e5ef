//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvester database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Search entry points per vendor
CREATE TABLE IF NOT EXISTS search_listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    vendor_id INTEGER NOT NULL,
    event_type_id INTEGER NOT NULL,
    search_url TEXT NOT NULL,
    paginated TEXT,
    UNIQUE(vendor_id, event_type_id, search_url)
);

CREATE INDEX IF NOT EXISTS idx_search_listings_vendor ON search_listings(vendor_id);

-- One row per vendor event, including invalid tombstones
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    vendor_id INTEGER NOT NULL,
    event_type_id INTEGER,
    event_name TEXT,
    venue_state TEXT,
    event_datetime TEXT,
    invalid TEXT,
    url TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    last_refreshed_at INTEGER,
    UNIQUE(vendor_id, url)
);

CREATE INDEX IF NOT EXISTS idx_events_vendor ON events(vendor_id);
CREATE INDEX IF NOT EXISTS idx_events_refresh ON events(invalid, last_refreshed_at);

-- Ticket tiers, keyed by display position within the event
CREATE TABLE IF NOT EXISTS tickets (
    event_id INTEGER NOT NULL REFERENCES events(id),
    ticket_num INTEGER NOT NULL,
    ticket_type TEXT NOT NULL,
    ticket_price TEXT NOT NULL,
    booking_fee TEXT NOT NULL,
    sold_out TEXT,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (event_id, ticket_num)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
