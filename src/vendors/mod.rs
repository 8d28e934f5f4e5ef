//! Vendor extraction adapters
//!
//! Each adapter implements [`Crawler`](crate::crawler::Crawler) against one
//! vendor's markup or JSON shape and date grammar:
//! - `Moshtix`: markup search results, paginated, seven-column ticket table
//! - `Oztix`: state-grouped markup results, cookie-primed detail pages
//! - `Ticketmaster`: JSON search results, two ticket extraction strategies

mod moshtix;
mod oztix;
mod ticketmaster;

pub use moshtix::Moshtix;
pub use oztix::Oztix;
pub use ticketmaster::Ticketmaster;

use crate::model::VendorId;
use crate::HarvestError;
use chrono::NaiveDateTime;

pub const MOSHTIX_VENDOR_ID: VendorId = 1;
pub const OZTIX_VENDOR_ID: VendorId = 2;
pub const TICKETMASTER_VENDOR_ID: VendorId = 3;

/// Returns true if a built-in adapter exists for `vendor_id`
pub fn is_known_vendor(vendor_id: VendorId) -> bool {
    matches!(
        vendor_id,
        MOSHTIX_VENDOR_ID | OZTIX_VENDOR_ID | TICKETMASTER_VENDOR_ID
    )
}

/// Parses a normalized date/time string, keeping the original input in the
/// error
fn parse_datetime(normalized: &str, format: &str, original: &str) -> Result<NaiveDateTime, HarvestError> {
    NaiveDateTime::parse_from_str(normalized, format).map_err(|e| HarvestError::DateParse {
        input: original.to_string(),
        message: format!("'{}' does not match '{}': {}", normalized, format, e),
    })
}
