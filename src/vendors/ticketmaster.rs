//! Ticketmaster adapter
//!
//! Search results arrive as one JSON document covering every match, so there
//! is no pagination. Detail pages are markup and are read with two
//! independent strategies, tried in order.
//!
//! A detail page with no tickets does not invalidate the event: the vendor
//! regularly switches sales off for a while on events that are still live.

use crate::crawler::parser::{
    child_elements, clean_name, find_text, inner_text, is_unclassed, parse_price,
};
use crate::crawler::Crawler;
use crate::model::{EventInfo, EventTypeId, VendorId};
use crate::vendors::{parse_datetime, TICKETMASTER_VENDOR_ID};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use url::Url;

const VENDOR_NAME: &str = "Ticketmaster";
const HANDLING_FEE_MARKER: &str = "A Handling Fee from";
const DELETED_EVENT_MARKER: &str = "this event no longer exists";
const NOT_AVAILABLE_MARKER: &str = "Tickets are not currently available";
const PROMOTIONS_ROW: &str = "special offers and promotions";

static BASE_URL: Lazy<Url> = Lazy::new(|| {
    Url::parse("http://www.ticketmaster.com.au").expect("valid Ticketmaster base URL")
});
static SEAT_SELECTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[id^="event_seat_selection"]"#).expect("valid selector"));
static TICKET_TYPE_BLOCK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[id^="classic_ticket_type"]"#).expect("valid selector"));
static WIDGET_WRAPPER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.widget-wrapper").expect("valid selector"));
static PRICE_LIST: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("ul.widget-dropdown-list.module-js-ignore").expect("valid selector")
});
static PRICE_RANGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div#price-range-popup div.eventInfoMax").expect("valid selector"));
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").expect("valid selector"));
static ITEM_PRICE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"span[itemprop="price"]"#).expect("valid selector"));

/// Vendor JSON sometimes quotes numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

impl NumberOrText {
    fn to_text(&self) -> String {
        match self {
            NumberOrText::Number(n) => n.to_string(),
            NumberOrText::Text(s) => s.trim().to_string(),
        }
    }

    fn to_count(&self) -> Result<i64> {
        match self {
            NumberOrText::Number(n) => Ok(*n),
            NumberOrText::Text(s) => s.trim().parse().map_err(|_| {
                HarvestError::extraction(VENDOR_NAME, format!("numFound is not a number: {}", s))
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "numFound")]
    num_found: NumberOrText,
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    #[serde(rename = "EventSEOName")]
    event_seo_name: String,
    #[serde(rename = "EventId")]
    event_id: NumberOrText,
    #[serde(rename = "EventName")]
    event_name: String,
    #[serde(rename = "VenueState", default)]
    venue_state: Option<String>,
    #[serde(rename = "PostProcessedData")]
    post_processed: PostProcessedData,
}

#[derive(Debug, Deserialize)]
struct PostProcessedData {
    #[serde(rename = "LocalEventDate")]
    local_event_date: String,
}

pub struct Ticketmaster {
    base_url: Url,
}

impl Ticketmaster {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.clone())
    }

    pub fn with_base_url(base_url: Url) -> Self {
        Self { base_url }
    }

    fn event_url(&self, seo_name: &str, event_id: &str) -> String {
        format!(
            "{}/{}/event/{}",
            self.base_url.as_str().trim_end_matches('/'),
            seo_name,
            event_id
        )
    }
}

impl Default for Ticketmaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a local event date such as `"2014-01-12T12:00:00+11:00"`,
/// discarding the offset
pub fn parse_event_date(input: &str) -> Result<NaiveDateTime> {
    let local = input.split('+').next().unwrap_or(input).trim();
    parse_datetime(local, "%Y-%m-%dT%H:%M:%S", input)
}

/// Reads the per-ticket handling fee, zero when the page states none
fn parse_booking_fee(document: &Html) -> Result<Decimal> {
    let text = match find_text(document, HANDLING_FEE_MARKER) {
        Some(text) => text,
        None => return Ok(Decimal::ZERO),
    };

    let amount = text.find('$').and_then(|dollar| {
        let rest = &text[dollar + 1..];
        rest.find("per").map(|per| &rest[..per])
    });

    match amount {
        Some(amount) => parse_price(amount),
        None => Err(HarvestError::extraction(
            VENDOR_NAME,
            format!("malformed handling fee text: {}", text),
        )),
    }
}

fn is_promotions_row(ticket_type: &str) -> bool {
    ticket_type.to_lowercase() == PROMOTIONS_ROW
}

/// Seat-selection widget: one block per ticket type, each with a price
/// dropdown
fn extract_tickets_from_seat_selection(
    document: &Html,
    booking_fee: Decimal,
    event: &mut EventInfo,
) -> Result<bool> {
    tracing::debug!("Extracting Ticketmaster tickets from the seat selection widget");

    let seat_selection = match document.select(&SEAT_SELECTION).next() {
        Some(container) => container,
        None => return Ok(false),
    };

    let mut found = false;
    for block in seat_selection.select(&TICKET_TYPE_BLOCK) {
        let ticket_type = match child_elements(block).next() {
            Some(label) => clean_name(&inner_text(label)),
            None => continue,
        };
        if ticket_type.is_empty() || is_promotions_row(&ticket_type) {
            continue;
        }

        let price_list = match block
            .select(&WIDGET_WRAPPER)
            .nth(1)
            .and_then(|wrapper| wrapper.select(&PRICE_LIST).next())
        {
            Some(list) => list,
            None => {
                tracing::error!("No price dropdown for Ticketmaster ticket type {}", ticket_type);
                continue;
            }
        };

        let price_text = match price_list
            .text()
            .map(str::trim_start)
            .find(|text| text.starts_with("AU"))
        {
            Some(text) => text,
            None => {
                tracing::error!("No AU price for Ticketmaster ticket type {}", ticket_type);
                continue;
            }
        };

        event.push_ticket(ticket_type, parse_price(price_text)?, booking_fee, false);
        found = true;
    }

    Ok(found)
}

/// Price-range popup: parallel lists of type labels and prices
fn extract_tickets_from_price_range(
    document: &Html,
    booking_fee: Decimal,
    event: &mut EventInfo,
) -> Result<bool> {
    tracing::debug!("Extracting Ticketmaster tickets from the price range popup");

    let content = match document
        .select(&PRICE_RANGE)
        .next()
        .and_then(|info| child_elements(info).next())
    {
        Some(content) => content,
        None => {
            tracing::error!("No price range popup found on {}", event.source_url);
            return Ok(false);
        }
    };

    let types: Vec<String> = content
        .select(&DIV)
        .filter(|div| is_unclassed(*div))
        .map(|div| clean_name(&inner_text(div)))
        .collect();
    let prices: Vec<String> = content.select(&ITEM_PRICE).map(inner_text).collect();

    if types.is_empty() || types.len() != prices.len() {
        tracing::error!(
            "Ticket type & price length mismatch: {} types, {} prices",
            types.len(),
            prices.len()
        );
        return Ok(false);
    }

    let mut found = false;
    for (ticket_type, price) in types.into_iter().zip(prices) {
        if is_promotions_row(&ticket_type) {
            continue;
        }
        event.push_ticket(ticket_type, parse_price(&price)?, booking_fee, false);
        found = true;
    }

    Ok(found)
}

#[async_trait]
impl Crawler for Ticketmaster {
    fn vendor_id(&self) -> VendorId {
        TICKETMASTER_VENDOR_ID
    }

    fn vendor_name(&self) -> &'static str {
        VENDOR_NAME
    }

    fn vendor_base_url(&self) -> &Url {
        &self.base_url
    }

    fn extract_new_events(
        &self,
        event_type_id: EventTypeId,
        known_urls: &HashSet<String>,
        page: &str,
    ) -> Result<Vec<EventInfo>> {
        let results: SearchResults = serde_json::from_str(page)?;
        let response = results.response;

        if response.num_found.to_count()? <= 0 {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut events = Vec::new();

        for doc in response.docs {
            let url = self.event_url(&doc.event_seo_name, &doc.event_id.to_text());
            if known_urls.contains(&url) || !seen.insert(url.clone()) {
                continue;
            }

            let mut event = EventInfo::discovered(
                TICKETMASTER_VENDOR_ID,
                event_type_id,
                clean_name(&doc.event_name),
                url,
            );
            event.venue_state = doc.venue_state;
            event.event_datetime = Some(parse_event_date(&doc.post_processed.local_event_date)?);
            events.push(event);
        }

        tracing::debug!("Ticketmaster search yielded {} unseen events", events.len());
        Ok(events)
    }

    fn extract_ticket_info(&self, event: &mut EventInfo, detail_page: &str) -> Result<()> {
        tracing::info!("Now processing: {}", event.source_url);
        let document = Html::parse_document(detail_page);
        let booking_fee = parse_booking_fee(&document)?;

        if extract_tickets_from_seat_selection(&document, booking_fee, event)? {
            return Ok(());
        }

        if find_text(&document, DELETED_EVENT_MARKER).is_some() {
            event.mark_invalid();
            return Ok(());
        }

        if extract_tickets_from_price_range(&document, booking_fee, event)? {
            return Ok(());
        }

        if find_text(&document, NOT_AVAILABLE_MARKER).is_some() {
            tracing::info!("Tickets not currently available for {}", event.source_url);
            return Ok(());
        }

        Err(HarvestError::extraction(
            VENDOR_NAME,
            format!(
                "no seat selection, price range, deleted or not-available marker on {}",
                event.source_url
            ),
        ))
    }

    fn extract_subsequent_urls(&self, _page: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
