//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for vendor sites and an in-memory
//! SQLite database, and drive the crawl and refresh cycles end-to-end.

mod crawl_tests;
mod fetch_tests;
mod refresh_tests;

use ticket_harvester::config::FetchConfig;
use ticket_harvester::crawler::Fetcher;

/// Fetcher that gives up quickly instead of retrying forever
pub fn test_fetcher() -> Fetcher {
    let config = FetchConfig {
        timeout_secs: 5,
        retry_delay_secs: 0,
        max_attempts: Some(1),
        ..FetchConfig::default()
    };
    Fetcher::new(&config).expect("Failed to build fetcher")
}

/// Builds a Moshtix search page linking to `events` and to `next_pages`
pub fn moshtix_search_page(events: &[(&str, &str)], next_pages: &[&str]) -> String {
    let mut page = String::from("<html><body>\n");
    for (href, name) in events {
        page.push_str(&format!(
            "<div class=\"searchresult_content\"><a href=\"{href}\">{name}</a><h2><a href=\"{href}\">{name}</a></h2></div>\n"
        ));
    }
    page.push_str("<section class=\"pagination\"><a class=\"current\" href=\"#\">1</a>");
    for href in next_pages {
        page.push_str(&format!("<a href=\"{href}\">more</a>"));
    }
    page.push_str("</section>\n</body></html>");
    page
}

/// Builds a Moshtix detail page for a 2099 show with the given
/// (type, price, sold out) ticket rows
pub fn moshtix_detail_page(tickets: &[(&str, &str, bool)]) -> String {
    let mut page = String::from(
        r#"<html><body>
        <div id="event-summary-block"
             data-event-date="8:00pm, Thu 1st January, 2099"
             data-event-venue="Corner Hotel, Richmond, VIC"></div>
        <table id="event-tickettypetable"><tbody>
        "#,
    );
    for (ticket_type, price, sold_out) in tickets {
        let status = if *sold_out {
            "Allocation Exhausted"
        } else {
            "<select><option>1</option></select>"
        };
        page.push_str(&format!(
            "<tr><td>{ticket_type}</td><td>On sale</td><td>{price}</td><td>+</td><td>$2.50</td><td>-</td><td>{status}</td></tr>\n"
        ));
    }
    page.push_str("</tbody></table></body></html>");
    page
}
