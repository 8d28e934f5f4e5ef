//! Crawl passes against a mock vendor site

use rust_decimal::Decimal;
use ticket_harvester::crawler::CrawlSession;
use ticket_harvester::storage::{SqliteStorage, Storage};
use ticket_harvester::vendors::{Moshtix, Oztix, Ticketmaster};
use ticket_harvester::VendorSearchListing;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::{moshtix_detail_page, moshtix_search_page, test_fetcher};

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn seeded_storage(search_url: &str, paginated: bool) -> SqliteStorage {
    let mut storage = SqliteStorage::open_in_memory().expect("Failed to open storage");
    storage
        .upsert_search_listing(&VendorSearchListing::new(1, 7, search_url, paginated))
        .expect("Failed to seed search listing");
    storage
}

#[tokio::test]
async fn test_paginated_crawl_persists_each_event_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/search",
        moshtix_search_page(
            &[("/event/a", "Alpha"), ("/event/b", "Bravo")],
            &["/search/2", "/search/2"],
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/search/2",
        moshtix_search_page(&[("/event/a", "Alpha"), ("/event/c", "Charlie")], &[]),
    )
    .await;

    // Alpha is listed on both pages but must only be fetched once
    Mock::given(method("GET"))
        .and(path("/event/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(moshtix_detail_page(&[
            ("General Admission", "$45.00", false),
            ("Early Bird", "$30.00", true),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/event/b", moshtix_detail_page(&[])).await;
    mount_page(
        &mock_server,
        "/event/c",
        moshtix_detail_page(&[("Standing", "$20.00", false)]),
    )
    .await;

    let crawler = Moshtix::with_base_url(Url::parse(&base_url).unwrap());
    let fetcher = test_fetcher();
    let mut storage = seeded_storage(&format!("{}/search", base_url), true);

    let stats = CrawlSession::new(&crawler, &fetcher, &mut storage)
        .run_pass()
        .await
        .expect("Crawl pass should succeed");

    assert_eq!(stats.pages, 2);
    assert_eq!(stats.discovered, 3);
    assert_eq!(stats.created, 2);
    assert_eq!(stats.invalid, 1);
    assert_eq!(storage.get_known_urls(1).unwrap().len(), 3);

    let alpha = storage
        .get_event_by_url(1, &format!("{}/event/a", base_url))
        .unwrap()
        .expect("Alpha should be stored");
    assert_eq!(alpha.event_name.as_deref(), Some("Alpha"));
    assert_eq!(alpha.event_type_id, Some(7));
    assert_eq!(alpha.venue_state.as_deref(), Some("VIC"));
    assert!(!alpha.invalid);

    let tickets = storage.get_tickets(alpha.id).unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].ticket_num, 1);
    assert_eq!(tickets[0].ticket_type, "General Admission");
    assert_eq!(tickets[0].ticket_price, Decimal::new(4500, 2));
    assert_eq!(tickets[0].booking_fee, Decimal::new(250, 2));
    assert!(tickets[1].sold_out);

    let bravo = storage
        .get_event_by_url(1, &format!("{}/event/b", base_url))
        .unwrap()
        .expect("Ticketless events are kept as invalid tombstones");
    assert!(bravo.invalid);
    assert!(storage.get_tickets(bravo.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_second_pass_skips_known_events() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/search",
        moshtix_search_page(&[("/event/a", "Alpha")], &[]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/event/a"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(moshtix_detail_page(&[("GA", "$10.00", false)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let crawler = Moshtix::with_base_url(Url::parse(&base_url).unwrap());
    let fetcher = test_fetcher();
    let mut storage = seeded_storage(&format!("{}/search", base_url), false);

    let mut session = CrawlSession::new(&crawler, &fetcher, &mut storage);
    let first = session.run_pass().await.unwrap();
    let second = session.run_pass().await.unwrap();

    assert_eq!(first.created, 1);
    assert_eq!(second.pages, 1);
    assert_eq!(second.discovered, 0);
}

#[tokio::test]
async fn test_extraction_failure_aborts_pass_without_partial_event() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/search",
        moshtix_search_page(&[("/event/a", "Alpha"), ("/event/broken", "Broken")], &[]),
    )
    .await;
    mount_page(
        &mock_server,
        "/event/a",
        moshtix_detail_page(&[("GA", "$10.00", false)]),
    )
    .await;
    mount_page(
        &mock_server,
        "/event/broken",
        "<html><body>Something went wrong</body></html>".to_string(),
    )
    .await;

    let crawler = Moshtix::with_base_url(Url::parse(&base_url).unwrap());
    let fetcher = test_fetcher();
    let mut storage = seeded_storage(&format!("{}/search", base_url), false);

    let result = CrawlSession::new(&crawler, &fetcher, &mut storage)
        .run_pass()
        .await;

    assert!(result.is_err());
    let known = storage.get_known_urls(1).unwrap();
    assert!(known.contains(&format!("{}/event/a", base_url)));
    assert!(!known.contains(&format!("{}/event/broken", base_url)));
}

#[tokio::test]
async fn test_redesigned_search_page_is_an_error() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/search",
        "<html><body>New look!</body></html>".to_string(),
    )
    .await;

    let crawler = Moshtix::with_base_url(Url::parse(&base_url).unwrap());
    let fetcher = test_fetcher();
    let mut storage = seeded_storage(&format!("{}/search", base_url), true);

    let result = CrawlSession::new(&crawler, &fetcher, &mut storage)
        .run_pass()
        .await;

    assert!(result.is_err());
    assert!(storage.get_known_urls(1).unwrap().is_empty());
}

#[tokio::test]
async fn test_oztix_crawl_uses_primed_cookies() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/music",
        r#"<html><body>
        <div class="state_header"><a name="NSW"></a>New South Wales</div>
        <div id="gigtable">
            <div class="gigname"><a href="/Event/101/Default.aspx">Beach Party</a></div>
        </div>
        <div class="state_header"><a name="QLD"></a>Queensland</div>
        <div id="gigtable">
            <div class="gigname"><a href="/Event/102/Default.aspx">Sunshine Fest</a></div>
        </div>
        </body></html>"#
            .to_string(),
    )
    .await;

    let detail = |ticket_type: &str| {
        format!(
            r#"<html><body>
            <div class="venueInfo">
                <div>Monday 02 January 2099 8pm</div>
                <div id="ctl00_ContentPlaceHolder1_WucShowsMain1_WucEventsDetail1_pnl_venue"></div>
            </div>
            <table tsClass="ReserveTable">
                <tr><td>{}</td><td>AUD 55.00</td><td>Buy</td></tr>
                <tr><td>VIP</td><td>AUD 120.00</td><td>SOLD OUT</td></tr>
            </table>
            </body></html>"#,
            ticket_type
        )
    };

    // Detail pages only answer once the session cookie is replayed
    for (event_path, ticket_type) in [
        ("/Event/101/Default.aspx", "General Admission"),
        ("/Event/102/Default.aspx", "Standing"),
    ] {
        Mock::given(method("GET"))
            .and(path(event_path))
            .and(header("cookie", "ASP.NET_SessionId=oz42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail(ticket_type)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("set-cookie", "ASP.NET_SessionId=oz42; path=/; HttpOnly")
                .insert_header("location", "/cookiecheck"),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let crawler = Oztix::with_base_url(Url::parse(&base_url).unwrap());
    let fetcher = test_fetcher();
    let mut storage = SqliteStorage::open_in_memory().unwrap();
    storage
        .upsert_search_listing(&VendorSearchListing::new(
            2,
            1,
            &format!("{}/music", base_url),
            false,
        ))
        .unwrap();

    let stats = CrawlSession::new(&crawler, &fetcher, &mut storage)
        .run_pass()
        .await
        .expect("Oztix crawl should succeed");

    assert_eq!(stats.discovered, 2);
    assert_eq!(stats.created, 2);

    let sunshine = storage
        .get_event_by_url(2, &format!("{}/Event/102/Default.aspx", base_url))
        .unwrap()
        .expect("Sunshine Fest should be stored");
    assert_eq!(sunshine.venue_state.as_deref(), Some("QLD"));
    assert!(!sunshine.invalid);

    let tickets = storage.get_tickets(sunshine.id).unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].ticket_type, "Standing");
    assert_eq!(tickets[0].ticket_price, Decimal::new(5500, 2));
    assert_eq!(tickets[0].booking_fee, Decimal::ZERO);
    assert!(tickets[1].sold_out);
}

#[tokio::test]
async fn test_ticketmaster_event_without_tickets_stays_valid() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/json/search",
        r#"{
            "response": {
                "numFound": 2,
                "docs": [
                    {
                        "EventSEOName": "paused-show",
                        "EventId": 10,
                        "EventName": "Paused Show",
                        "VenueState": "VIC",
                        "PostProcessedData": { "LocalEventDate": "2099-03-01T20:00:00+11:00" }
                    },
                    {
                        "EventSEOName": "big-show",
                        "EventId": "11",
                        "EventName": "Big Show",
                        "VenueState": "NSW",
                        "PostProcessedData": { "LocalEventDate": "2099-03-02T19:30:00+11:00" }
                    }
                ]
            }
        }"#
        .to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/paused-show/event/10",
        "<html><body><p>Tickets are not currently available online.</p></body></html>".to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/big-show/event/11",
        r#"<html><body>
        <p>A Handling Fee from $4.10 per transaction applies.</p>
        <div id="price-range-popup">
            <div class="eventInfoMax">
                <div class="prices">
                    <div>Reserved Seating</div><span itemprop="price">120.00</span>
                    <div>General Admission</div><span itemprop="price">79.50</span>
                </div>
            </div>
        </div>
        </body></html>"#
            .to_string(),
    )
    .await;

    let crawler = Ticketmaster::with_base_url(Url::parse(&base_url).unwrap());
    let fetcher = test_fetcher();
    let mut storage = SqliteStorage::open_in_memory().unwrap();
    storage
        .upsert_search_listing(&VendorSearchListing::new(
            3,
            1,
            &format!("{}/json/search", base_url),
            false,
        ))
        .unwrap();

    let stats = CrawlSession::new(&crawler, &fetcher, &mut storage)
        .run_pass()
        .await
        .expect("Ticketmaster crawl should succeed");

    assert_eq!(stats.created, 2);
    assert_eq!(stats.invalid, 0);

    let paused = storage
        .get_event_by_url(3, &format!("{}/paused-show/event/10", base_url))
        .unwrap()
        .expect("Paused Show should be stored");
    assert!(!paused.invalid);
    assert!(storage.get_tickets(paused.id).unwrap().is_empty());

    let big = storage
        .get_event_by_url(3, &format!("{}/big-show/event/11", base_url))
        .unwrap()
        .expect("Big Show should be stored");
    let tickets = storage.get_tickets(big.id).unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[1].ticket_type, "General Admission");
    assert_eq!(tickets[1].ticket_price, Decimal::new(7950, 2));
    assert_eq!(tickets[1].booking_fee, Decimal::new(410, 2));

    // Zero-ticket events stay in the refresh set
    let due = storage.get_tickets_to_refresh().unwrap();
    assert!(due.iter().any(|row| row.event_id == paused.id && row.ticket.is_none()));
}
