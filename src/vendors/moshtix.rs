//! Moshtix adapter
//!
//! Search results are `div.searchresult_content` blocks, paginated through a
//! `section.pagination` link list. Detail pages carry the date and venue as
//! data attributes and list tickets in a seven-column table.

use crate::crawler::parser::{
    child_elements, clean_name, clean_text, inner_text, own_text, parse_price, resolve_link,
};
use crate::crawler::Crawler;
use crate::model::{EventInfo, EventTypeId, VendorId};
use crate::vendors::{parse_datetime, MOSHTIX_VENDOR_ID};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

const VENDOR_NAME: &str = "Moshtix";
const TICKET_COLUMNS: usize = 7;

static BASE_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("http://www.moshtix.com.au").expect("valid Moshtix base URL"));
static SEARCH_RESULT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.searchresult_content").expect("valid selector"));
static PAGINATION_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("section.pagination a[href]").expect("valid selector"));
static EVENT_SUMMARY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div#event-summary-block").expect("valid selector"));
static TICKET_TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table#event-tickettypetable").expect("valid selector"));
static TICKET_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").expect("valid selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));

pub struct Moshtix {
    base_url: Url,
}

impl Moshtix {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.clone())
    }

    pub fn with_base_url(base_url: Url) -> Self {
        Self { base_url }
    }
}

impl Default for Moshtix {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses the start of a Moshtix event date
///
/// Accepts `"5:00pm, Fri 4th October, 2013"` and ranges such as
/// `"9:00pm, Fri 20th December, 2013 - 4:00am, Sat 28th December, 2013"`,
/// where only the start is kept. Month names may be short or long.
pub fn parse_event_date(input: &str) -> Result<NaiveDateTime> {
    let start = input.split('-').next().unwrap_or(input);
    let tokens: Vec<&str> = start.split(',').map(str::trim).collect();

    let bad_shape = || HarvestError::DateParse {
        input: input.to_string(),
        message: "expected '<time>, <weekday> <day> <month>, <year>'".to_string(),
    };

    if tokens.len() < 3 {
        return Err(bad_shape());
    }

    let day_month: Vec<&str> = tokens[1].split_whitespace().collect();
    if day_month.len() < 3 {
        return Err(bad_shape());
    }

    // The weekday is skipped; "4th" -> "4"
    let day = day_month[1].trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let normalized = format!("{} {} {} {}", tokens[0], day, day_month[2], tokens[2]);

    parse_datetime(&normalized, "%I:%M%p %d %B %Y", input)
}

/// Splits `"Venue, Suburb, STATE"` into the venue name and state
fn parse_venue(venue: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = venue.split(',').map(str::trim).collect();
    if tokens.len() < 2 {
        return None;
    }
    let state = tokens[tokens.len() - 1];
    if state.is_empty() {
        return None;
    }
    Some((tokens[0].to_string(), state.to_string()))
}

#[async_trait]
impl Crawler for Moshtix {
    fn vendor_id(&self) -> VendorId {
        MOSHTIX_VENDOR_ID
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
        let document = Html::parse_document(page);
        let mut results = document.select(&SEARCH_RESULT).peekable();

        if results.peek().is_none() {
            return Err(HarvestError::extraction(
                VENDOR_NAME,
                "no searchresult_content blocks found",
            ));
        }

        let mut seen = HashSet::new();
        let mut events = Vec::new();

        for result in results {
            let mut children = child_elements(result);

            let href = children
                .next()
                .and_then(|link| link.value().attr("href"))
                .ok_or_else(|| HarvestError::extraction(VENDOR_NAME, "search result without a link"))?;
            let name = children
                .next()
                .map(inner_text)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| HarvestError::extraction(VENDOR_NAME, "search result without a name"))?;

            let url = match resolve_link(href, &self.base_url) {
                Some(url) => url,
                None => {
                    tracing::warn!("Skipping unusable Moshtix link: {}", href);
                    continue;
                }
            };

            if known_urls.contains(&url) || !seen.insert(url.clone()) {
                continue;
            }

            events.push(EventInfo::discovered(
                MOSHTIX_VENDOR_ID,
                event_type_id,
                clean_name(&name),
                url,
            ));
        }

        tracing::debug!("Moshtix page yielded {} unseen events", events.len());
        Ok(events)
    }

    fn extract_ticket_info(&self, event: &mut EventInfo, detail_page: &str) -> Result<()> {
        tracing::info!("Now processing: {}", event.source_url);
        let document = Html::parse_document(detail_page);

        if let Some(summary) = document.select(&EVENT_SUMMARY).next() {
            if let Some(date) = summary.value().attr("data-event-date") {
                event.event_datetime = Some(parse_event_date(&clean_text(date))?);
            }
            if let Some((venue_name, venue_state)) =
                summary.value().attr("data-event-venue").and_then(parse_venue)
            {
                event.venue_name = Some(venue_name);
                event.venue_state = Some(venue_state);
            }
        }

        if event.event_datetime.is_none() {
            return Err(HarvestError::extraction(
                VENDOR_NAME,
                format!("failed to parse event date/time from {}", event.source_url),
            ));
        }
        if event.venue_state.is_none() {
            return Err(HarvestError::extraction(
                VENDOR_NAME,
                format!("failed to parse venue state from {}", event.source_url),
            ));
        }

        let table = match document.select(&TICKET_TABLE).next() {
            Some(table) => table,
            None => {
                event.mark_invalid();
                return Ok(());
            }
        };

        for row in table.select(&TICKET_ROW) {
            let cells: Vec<_> = row.select(&CELL).collect();
            if cells.len() != TICKET_COLUMNS {
                return Err(HarvestError::extraction(
                    VENDOR_NAME,
                    format!(
                        "expected {} ticket columns, found {} on {}",
                        TICKET_COLUMNS,
                        cells.len(),
                        event.source_url
                    ),
                ));
            }

            let ticket_type = match own_text(cells[0]) {
                text if text.is_empty() => inner_text(cells[0]),
                text => text,
            };
            let price = parse_price(&inner_text(cells[2]))?;
            let fee = parse_price(&inner_text(cells[4]))?;
            let sold_out = inner_text(cells[6]).eq_ignore_ascii_case("allocation exhausted");

            event.push_ticket(clean_name(&ticket_type), price, fee, sold_out);
        }

        event.invalidate_if_ticketless();
        Ok(())
    }

    fn extract_subsequent_urls(&self, page: &str) -> Result<Vec<String>> {
        let document = Html::parse_document(page);
        let mut seen = HashSet::new();

        let urls = document
            .select(&PAGINATION_LINK)
            .filter(|link| link.value().attr("class").is_none())
            .filter_map(|link| link.value().attr("href"))
            .filter_map(|href| resolve_link(href, &self.base_url))
            .filter(|url| seen.insert(url.clone()))
            .collect();

        Ok(urls)
    }
}
