use crate::model::{EventTypeId, TicketInfo, VendorId};
use crate::HarvestError;
use chrono::NaiveDateTime;
use std::fmt;

/// One vendor event
///
/// An `EventInfo` is created either during crawl discovery (no id yet) or
/// while loading events due for refresh (id already assigned). It owns its
/// ticket list for the lifetime of one extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EventInfo {
    pub vendor_id: VendorId,
    pub event_type_id: Option<EventTypeId>,
    pub event_name: Option<String>,

    /// Natural key together with `vendor_id`
    pub source_url: String,

    pub venue_name: Option<String>,
    pub venue_state: Option<String>,
    pub event_datetime: Option<NaiveDateTime>,

    /// Tri-state: `None` until extraction decides, `Some(true)` means the
    /// event is a permanently ignored tombstone
    pub invalid: Option<bool>,

    vendor_event_id: Option<i64>,

    /// Ticket tiers in vendor display order
    pub ticket_list: Vec<TicketInfo>,
}

impl EventInfo {
    /// Creates an event discovered on a search results page
    pub fn discovered(
        vendor_id: VendorId,
        event_type_id: EventTypeId,
        event_name: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            vendor_id,
            event_type_id: Some(event_type_id),
            event_name: Some(event_name.into()),
            source_url: source_url.into(),
            venue_name: None,
            venue_state: None,
            event_datetime: None,
            invalid: None,
            vendor_event_id: None,
            ticket_list: Vec::new(),
        }
    }

    /// Creates an event loaded back from storage for a refresh
    pub fn stored(
        vendor_event_id: i64,
        vendor_id: VendorId,
        source_url: impl Into<String>,
        event_datetime: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            vendor_id,
            event_type_id: None,
            event_name: None,
            source_url: source_url.into(),
            venue_name: None,
            venue_state: None,
            event_datetime,
            invalid: None,
            vendor_event_id: Some(vendor_event_id),
            ticket_list: Vec::new(),
        }
    }

    /// Builds an empty copy carrying only the identity fields, ready for a
    /// fresh ticket extraction
    pub fn fresh_copy(&self) -> Self {
        Self {
            vendor_id: self.vendor_id,
            event_type_id: self.event_type_id,
            event_name: self.event_name.clone(),
            source_url: self.source_url.clone(),
            venue_name: None,
            venue_state: None,
            event_datetime: None,
            invalid: None,
            vendor_event_id: self.vendor_event_id,
            ticket_list: Vec::new(),
        }
    }

    pub fn vendor_event_id(&self) -> Option<i64> {
        self.vendor_event_id
    }

    /// Records the id assigned by storage on first creation
    ///
    /// The id can only be set once; a second assignment is an error.
    pub fn assign_vendor_event_id(&mut self, id: i64) -> Result<(), HarvestError> {
        match self.vendor_event_id {
            Some(existing) => Err(HarvestError::IdentityReassigned { event_id: existing }),
            None => {
                self.vendor_event_id = Some(id);
                Ok(())
            }
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid == Some(true)
    }

    pub fn mark_invalid(&mut self) {
        self.invalid = Some(true);
    }

    /// Marks the event invalid when extraction produced no tickets
    ///
    /// Persisting such an event as a tombstone stops the crawler from
    /// re-scraping the same dead page on every pass.
    pub fn invalidate_if_ticketless(&mut self) {
        if self.ticket_list.is_empty() {
            self.mark_invalid();
        }
    }

    /// Appends a ticket numbered after the ones already extracted
    pub fn push_ticket(
        &mut self,
        ticket_type: impl Into<String>,
        ticket_price: rust_decimal::Decimal,
        booking_fee: rust_decimal::Decimal,
        sold_out: bool,
    ) {
        let ticket_num = self.ticket_list.len() as u32 + 1;
        self.ticket_list.push(TicketInfo::new(
            ticket_num,
            ticket_type,
            ticket_price,
            booking_fee,
            sold_out,
        ));
    }
}

impl fmt::Display for EventInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[vendor {}] {} <{}>",
            self.vendor_id,
            self.event_name.as_deref().unwrap_or("(unnamed)"),
            self.source_url
        )
    }
}
