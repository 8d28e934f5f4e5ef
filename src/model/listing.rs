use crate::model::{EventTypeId, VendorId};
use std::fmt;

/// One configured search entry point for a vendor
///
/// Listings are loaded from storage at the start of every crawl pass and are
/// never modified by the crawler itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorSearchListing {
    pub vendor_id: VendorId,
    pub event_type_id: EventTypeId,
    pub search_url: String,
    /// Whether pagination links on the first results page should be followed
    pub paginated: bool,
}

impl VendorSearchListing {
    pub fn new(
        vendor_id: VendorId,
        event_type_id: EventTypeId,
        search_url: impl Into<String>,
        paginated: bool,
    ) -> Self {
        Self {
            vendor_id,
            event_type_id,
            search_url: search_url.into(),
            paginated,
        }
    }
}

impl fmt::Display for VendorSearchListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vendor {} / type {}: {}{}",
            self.vendor_id,
            self.event_type_id,
            self.search_url,
            if self.paginated { " (paginated)" } else { "" }
        )
    }
}
