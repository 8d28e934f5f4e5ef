//! Markup helpers shared by the vendor adapters
//!
//! Vendor pages are loosely structured, so adapters navigate them by element
//! position as much as by selector. This module collects the small pieces
//! they all need:
//! - Whitespace-normalized text extraction
//! - Sibling and child element navigation
//! - Link resolution against a vendor base URL
//! - Exact decimal price parsing from currency strings

use crate::HarvestError;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html};
use std::str::FromStr;
use url::Url;

static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid price regex"));

/// Collapses runs of whitespace into single spaces and trims the ends
pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the whitespace-normalized text of an element and its descendants
pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Returns only the text nodes that are direct children of `element`
///
/// Useful for cells that mix a label with nested markup, e.g.
/// `<td><input/><span>info</span> General Admission</td>`.
pub fn own_text(element: ElementRef<'_>) -> String {
    let text = element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect::<Vec<_>>()
        .join(" ");
    clean_text(&text)
}

/// Iterates over the element children of `element`, skipping text nodes
pub fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

/// Iterates over the element siblings following `element`
pub fn next_sibling_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.next_siblings().filter_map(ElementRef::wrap)
}

/// Returns the closest element sibling before `element`
pub fn previous_sibling_element<'a>(element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.prev_siblings().find_map(ElementRef::wrap)
}

/// Returns true if the element carries the given class
pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Returns true if the element has no class attribute, or an empty one
pub fn is_unclassed(element: ElementRef<'_>) -> bool {
    element
        .value()
        .attr("class")
        .map_or(true, |class| class.trim().is_empty())
}

/// Finds the first text node in the document containing `needle`
pub fn find_text(document: &Html, needle: &str) -> Option<String> {
    document
        .root_element()
        .text()
        .find(|text| text.contains(needle))
        .map(clean_text)
}

/// Cleans an event or ticket name scraped from markup
///
/// Some vendors double-escape apostrophes, which survive HTML decoding as a
/// literal `&#39;`.
pub fn clean_name(input: &str) -> String {
    clean_text(&input.replace("&#39;", "'"))
}

/// Resolves a link href against the vendor base URL
///
/// Returns None for empty hrefs, fragment-only links and non-HTTP schemes.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Parses the first amount found in a currency string as an exact decimal
///
/// Accepts forms such as `$45.00`, `$1,234.50`, `AU $ 45.00` and `45`.
/// Thousands separators are dropped.
pub fn parse_price(text: &str) -> Result<Decimal, HarvestError> {
    let amount = PRICE_RE
        .find(text)
        .ok_or_else(|| HarvestError::PriceParse(text.to_string()))?;

    Decimal::from_str(&amount.as_str().replace(',', ""))
        .map_err(|_| HarvestError::PriceParse(text.to_string()))
}
