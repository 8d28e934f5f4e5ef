use rust_decimal::Decimal;

/// One ticket tier within an event
///
/// Instances are built fresh on every extraction pass and never mutated in
/// place by the refresh engine; changes are detected by comparing two
/// independently scraped instances with [`TicketInfo::has_been_updated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketInfo {
    /// 1-based position among the event's ticket rows
    pub ticket_num: u32,

    /// Free-text tier label, the only identity that survives between fetches
    pub ticket_type: String,

    pub ticket_price: Decimal,

    pub booking_fee: Decimal,

    pub sold_out: bool,
}

impl TicketInfo {
    pub fn new(
        ticket_num: u32,
        ticket_type: impl Into<String>,
        ticket_price: Decimal,
        booking_fee: Decimal,
        sold_out: bool,
    ) -> Self {
        Self {
            ticket_num,
            ticket_type: ticket_type.into(),
            ticket_price,
            booking_fee,
            sold_out,
        }
    }

    /// Returns true if any vendor-visible detail differs between the two tickets
    ///
    /// `ticket_num` is deliberately not compared: it is a storage position, not
    /// something the vendor reports.
    pub fn has_been_updated(&self, other: &TicketInfo) -> bool {
        self.ticket_type != other.ticket_type
            || self.ticket_price != other.ticket_price
            || self.booking_fee != other.booking_fee
            || self.sold_out != other.sold_out
    }

    /// Returns a copy of this ticket stored under a different position
    pub fn renumbered(&self, ticket_num: u32) -> Self {
        Self {
            ticket_num,
            ..self.clone()
        }
    }

    /// Returns a copy of this ticket flagged as sold out
    pub fn as_sold_out(&self) -> Self {
        Self {
            sold_out: true,
            ..self.clone()
        }
    }
}
