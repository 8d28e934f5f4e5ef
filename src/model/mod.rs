//! Domain model shared by the crawl protocol, the vendor adapters and the
//! refresh engine
//!
//! # Components
//!
//! - `EventInfo`: one vendor event and the ticket tiers scraped for it
//! - `TicketInfo`: one ticket tier, the unit the refresh engine reconciles
//! - `VendorSearchListing`: one configured search entry point for a vendor

mod event;
mod listing;
mod ticket;

pub use event::EventInfo;
pub use listing::VendorSearchListing;
pub use ticket::TicketInfo;

/// Identifies which vendor adapter produced or owns a record
pub type VendorId = i32;

/// Vendor-scoped event category
pub type EventTypeId = i32;

/// Converts a boolean flag to the `'Y'`/NULL representation used in storage
pub fn to_db_flag(flag: bool) -> Option<&'static str> {
    if flag {
        Some("Y")
    } else {
        None
    }
}

/// Parses a stored `'Y'`/NULL flag; anything other than `Y` reads as false
pub fn from_db_flag(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v.eq_ignore_ascii_case("y"))
}
