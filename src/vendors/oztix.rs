//! Oztix adapter
//!
//! One unpaginated results page per category, grouped under state header
//! blocks. Detail pages hide behind a cookie-check redirect, so they are
//! fetched with primed cookies.

use crate::crawler::parser::{
    child_elements, clean_name, clean_text, has_class, inner_text, next_sibling_elements,
    parse_price, previous_sibling_element, resolve_link,
};
use crate::crawler::{Crawler, Fetcher};
use crate::model::{EventInfo, EventTypeId, VendorId};
use crate::vendors::{parse_datetime, OZTIX_VENDOR_ID};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

const VENDOR_NAME: &str = "Oztix";
const DATE_FORMAT: &str = "%d %B %Y";
const RANGE_SEPARATORS: [char; 3] = ['-', '\u{2013}', '\u{2014}'];

static BASE_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("http://oztix.com.au").expect("valid Oztix base URL"));
static STATE_HEADER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.state_header").expect("valid selector"));
static STATE_ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[name]").expect("valid selector"));
static GIG_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse("div.gigname").expect("valid selector"));
static VENUE_PANEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "div.venueInfo div#ctl00_ContentPlaceHolder1_WucShowsMain1_WucEventsDetail1_pnl_venue",
    )
    .expect("valid selector")
});
static RESERVE_TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"table[tsclass="ReserveTable"]"#).expect("valid selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));

pub struct Oztix {
    base_url: Url,
}

impl Oztix {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.clone())
    }

    pub fn with_base_url(base_url: Url) -> Self {
        Self { base_url }
    }
}

impl Default for Oztix {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses the start of an Oztix event date
///
/// Handled shapes include:
/// - `"Tuesday 31 December 2013  (opening 8:00pm)"`
/// - `"Saturday 04 January 2014 (opening 1pm)"`
/// - `"Tuesday 31 December 2013  to Friday 03 January 2014"` (midnight)
/// - `"Wednesday 01 January 2014  (opening Midday-10.30pm)"`
/// - `"Saturday 28 December 2013   4.00 PM"`
/// - `"Tuesday 07 January 2014 12:30:00"`
///
/// A date without any time parses to midnight.
pub fn parse_event_date(input: &str) -> Result<NaiveDateTime> {
    let mut text = input
        .replace("(opening", "")
        .replace(')', "")
        .replace("Midday", "12:00pm")
        .replace('.', ":");

    let date_only = match text.find(" to ") {
        Some(idx) => {
            text.truncate(idx);
            true
        }
        None => false,
    };

    for separator in RANGE_SEPARATORS {
        if let Some(idx) = text.find(separator) {
            text.truncate(idx);
        }
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(HarvestError::DateParse {
            input: input.to_string(),
            message: "expected '<weekday> <day> <month> <year> [<time>]'".to_string(),
        });
    }

    // The weekday name is not checked against the date
    let date = tokens[1..4].join(" ");
    if date_only || tokens.len() == 4 {
        return parse_date_only(&date, input);
    }

    // "4:00 PM" arrives as two tokens
    let mut normalized = format!("{} {}", date, tokens[4]);
    if tokens.len() >= 6 {
        normalized.push_str(tokens[5]);
    }

    match normalized.matches(':').count() {
        1 => parse_datetime(&normalized, "%d %B %Y %I:%M%p", input),
        2 => parse_datetime(&normalized, "%d %B %Y %H:%M:%S", input),
        _ => parse_datetime(&with_zero_minutes(&normalized), "%d %B %Y %I:%M%p", input),
    }
}

fn parse_date_only(text: &str, input: &str) -> Result<NaiveDateTime> {
    let bad_date = |message: String| HarvestError::DateParse {
        input: input.to_string(),
        message,
    };

    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| bad_date(format!("'{}' does not match '{}': {}", text, DATE_FORMAT, e)))?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| bad_date(format!("no midnight on '{}'", text)))
}

/// Rewrites an hour-only time such as `8pm` as `8:00pm`
fn with_zero_minutes(normalized: &str) -> String {
    match normalized.rfind(' ') {
        Some(idx) => {
            let (date, time) = normalized.split_at(idx + 1);
            let digits = time.chars().take_while(char::is_ascii_digit).count();
            format!("{}{}:00{}", date, &time[..digits], &time[digits..])
        }
        None => normalized.to_string(),
    }
}

/// Text of a cell's first child node, e.g. the label before a `<br/>`
fn leading_text(cell: ElementRef<'_>) -> String {
    match cell.children().next() {
        Some(node) => match ElementRef::wrap(node) {
            Some(element) => inner_text(element),
            None => node.value().as_text().map(|t| clean_text(t)).unwrap_or_default(),
        },
        None => String::new(),
    }
}

#[async_trait]
impl Crawler for Oztix {
    fn vendor_id(&self) -> VendorId {
        OZTIX_VENDOR_ID
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
        let headers: Vec<_> = document.select(&STATE_HEADER).collect();

        if headers.is_empty() {
            return Err(HarvestError::extraction(VENDOR_NAME, "no state header blocks found"));
        }

        let mut seen = HashSet::new();
        let mut events = Vec::new();

        for header in headers {
            let venue_state = header
                .select(&STATE_ANCHOR)
                .next()
                .and_then(|anchor| anchor.value().attr("name"))
                .map(str::trim)
                .filter(|state| !state.is_empty())
                .ok_or_else(|| {
                    HarvestError::extraction(VENDOR_NAME, "venue state not found in state header")
                })?;

            let siblings = next_sibling_elements(header).filter(|e| e.value().name() == "div");
            for sibling in siblings {
                if has_class(sibling, "state_header") {
                    break;
                }

                let is_gigtable = sibling.value().attr("class").is_none()
                    && sibling.value().id() == Some("gigtable");
                if !is_gigtable {
                    return Err(HarvestError::extraction(
                        VENDOR_NAME,
                        format!("unexpected block after {} state header: {}", venue_state, sibling.html()),
                    ));
                }

                let mut gigs = sibling.select(&GIG_NAME).peekable();
                if gigs.peek().is_none() {
                    return Err(HarvestError::extraction(VENDOR_NAME, "gigtable without gigname entries"));
                }

                for gig in gigs {
                    let link = child_elements(gig)
                        .find(|e| e.value().name() == "a")
                        .ok_or_else(|| HarvestError::extraction(VENDOR_NAME, "gigname without a link"))?;
                    let href = link.value().attr("href").unwrap_or_default();
                    let name = inner_text(link);

                    if href.is_empty() || name.is_empty() {
                        return Err(HarvestError::extraction(
                            VENDOR_NAME,
                            "failed to read url or event name from gigname",
                        ));
                    }

                    let url = match resolve_link(href, &self.base_url) {
                        Some(url) => url,
                        None => continue,
                    };
                    if known_urls.contains(&url) || !seen.insert(url.clone()) {
                        continue;
                    }

                    let mut event =
                        EventInfo::discovered(OZTIX_VENDOR_ID, event_type_id, clean_name(&name), url);
                    event.venue_state = Some(venue_state.to_string());
                    events.push(event);
                }
            }
        }

        tracing::debug!("Oztix page yielded {} unseen events", events.len());
        Ok(events)
    }

    fn extract_ticket_info(&self, event: &mut EventInfo, detail_page: &str) -> Result<()> {
        tracing::info!("Now processing: {}", event.source_url);
        let document = Html::parse_document(detail_page);

        // The date sits just before the venue panel, behind a varying number
        // of other blocks, so it is found by walking backwards
        let date_text = document
            .select(&VENUE_PANEL)
            .next()
            .and_then(previous_sibling_element)
            .map(inner_text)
            .filter(|text| !text.is_empty());

        match date_text {
            Some(text) => event.event_datetime = Some(parse_event_date(&text)?),
            None => {
                event.mark_invalid();
                return Ok(());
            }
        }

        let table = match document.select(&RESERVE_TABLE).next() {
            Some(table) => table,
            None => {
                event.mark_invalid();
                return Ok(());
            }
        };

        for row in table.select(&ROW) {
            let cells: Vec<_> = row.select(&CELL).collect();
            if cells.len() < 2 {
                continue;
            }

            let ticket_type = leading_text(cells[0]);
            if ticket_type.is_empty() {
                continue;
            }

            // Promotional rows are interspersed with real ones
            let price = match parse_price(&inner_text(cells[1])) {
                Ok(price) => price,
                Err(_) => continue,
            };

            let sold_out = cells
                .get(2)
                .map_or(false, |cell| leading_text(*cell).eq_ignore_ascii_case("sold out"));

            // Prices already include the booking fee
            event.push_ticket(clean_name(&ticket_type), price, rust_decimal::Decimal::ZERO, sold_out);
        }

        event.invalidate_if_ticketless();
        Ok(())
    }

    fn extract_subsequent_urls(&self, _page: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn fetch_event_url(&self, fetcher: &Fetcher, url: &str) -> Result<String> {
        fetcher.fetch_with_primed_cookies(url).await
    }
}
