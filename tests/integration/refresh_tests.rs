//! Refresh cycles over events stored by an earlier crawl

use rust_decimal::Decimal;
use ticket_harvester::config::InvalidPolicy;
use ticket_harvester::crawler::{CrawlSession, CrawlerRegistry};
use ticket_harvester::refresh::{RefreshPolicy, Refresher};
use ticket_harvester::storage::{SqliteStorage, Storage};
use ticket_harvester::vendors::Moshtix;
use ticket_harvester::VendorSearchListing;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::{moshtix_detail_page, moshtix_search_page, test_fetcher};

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Crawls two events into a fresh database
async fn crawled_storage(mock_server: &MockServer) -> SqliteStorage {
    let base_url = mock_server.uri();

    mount_page(
        mock_server,
        "/search",
        moshtix_search_page(&[("/event/a", "Alpha"), ("/event/c", "Charlie")], &[]),
    )
    .await;
    mount_page(
        mock_server,
        "/event/a",
        moshtix_detail_page(&[
            ("General Admission", "$45.00", false),
            ("Early Bird", "$30.00", false),
            ("VIP", "$99.00", false),
        ]),
    )
    .await;
    mount_page(
        mock_server,
        "/event/c",
        moshtix_detail_page(&[("Standing", "$20.00", false)]),
    )
    .await;

    let crawler = Moshtix::with_base_url(Url::parse(&base_url).unwrap());
    let fetcher = test_fetcher();
    let mut storage = SqliteStorage::open_in_memory().unwrap();
    storage
        .upsert_search_listing(&VendorSearchListing::new(
            1,
            1,
            &format!("{}/search", base_url),
            false,
        ))
        .unwrap();

    let stats = CrawlSession::new(&crawler, &fetcher, &mut storage)
        .run_pass()
        .await
        .expect("Seed crawl should succeed");
    assert_eq!(stats.created, 2);

    storage
}

/// Replaces every mock with the post-change detail pages: Alpha's general
/// admission went up and its early bird tier disappeared, Charlie sold
/// everything and dropped its ticket table
async fn mount_changed_pages(mock_server: &MockServer) {
    mock_server.reset().await;
    mount_page(
        mock_server,
        "/event/a",
        moshtix_detail_page(&[
            ("General Admission", "$50.00", false),
            ("VIP", "$99.00", false),
        ]),
    )
    .await;
    mount_page(mock_server, "/event/c", moshtix_detail_page(&[])).await;
}

fn registry_for(mock_server: &MockServer) -> CrawlerRegistry {
    let mut registry = CrawlerRegistry::new();
    registry.register(Box::new(Moshtix::with_base_url(
        Url::parse(&mock_server.uri()).unwrap(),
    )));
    registry
}

#[tokio::test]
async fn test_refresh_applies_price_changes_and_invalidations() {
    let mock_server = MockServer::start().await;
    let mut storage = crawled_storage(&mock_server).await;
    mount_changed_pages(&mock_server).await;

    let registry = registry_for(&mock_server);
    let fetcher = test_fetcher();
    let policy = RefreshPolicy::default();

    let summary = Refresher::new(&registry, &fetcher, &mut storage, &policy)
        .run_cycle()
        .await
        .expect("Refresh should succeed");

    assert_eq!(summary.checked, 2);
    assert_eq!(summary.tickets_updated, 2);
    assert_eq!(summary.tickets_created, 0);
    assert_eq!(summary.invalidated, 1);

    let alpha = storage
        .get_event_by_url(1, &format!("{}/event/a", mock_server.uri()))
        .unwrap()
        .unwrap();
    assert!(alpha.last_refreshed_at.is_some());

    let tickets = storage.get_tickets(alpha.id).unwrap();
    assert_eq!(tickets.len(), 3);
    assert_eq!(tickets[0].ticket_type, "General Admission");
    assert_eq!(tickets[0].ticket_price, Decimal::new(5000, 2));
    assert!(!tickets[0].sold_out);
    assert_eq!(tickets[1].ticket_type, "Early Bird");
    assert_eq!(tickets[1].ticket_price, Decimal::new(3000, 2));
    assert!(tickets[1].sold_out);
    assert_eq!(tickets[2].ticket_type, "VIP");
    assert!(!tickets[2].sold_out);

    let charlie = storage
        .get_event_by_url(1, &format!("{}/event/c", mock_server.uri()))
        .unwrap()
        .unwrap();
    assert!(charlie.invalid);
    assert_eq!(storage.get_tickets(charlie.id).unwrap().len(), 1);

    // Both events are now either fresh or invalid
    let again = Refresher::new(&registry, &fetcher, &mut storage, &policy)
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(again.checked, 0);
}

#[tokio::test]
async fn test_ignore_policy_leaves_invalid_reads_untouched() {
    let mock_server = MockServer::start().await;
    let mut storage = crawled_storage(&mock_server).await;
    mount_changed_pages(&mock_server).await;

    let registry = registry_for(&mock_server);
    let fetcher = test_fetcher();
    let policy = RefreshPolicy {
        invalid_policy: InvalidPolicy::Ignore,
        ..RefreshPolicy::default()
    };

    let summary = Refresher::new(&registry, &fetcher, &mut storage, &policy)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(summary.invalidated, 0);

    let charlie = storage
        .get_event_by_url(1, &format!("{}/event/c", mock_server.uri()))
        .unwrap()
        .unwrap();
    assert!(!charlie.invalid);
    assert!(charlie.last_refreshed_at.is_none());
}

#[tokio::test]
async fn test_vendor_without_demotion_keeps_vanished_tiers() {
    let mock_server = MockServer::start().await;
    let mut storage = crawled_storage(&mock_server).await;
    mount_changed_pages(&mock_server).await;

    let registry = registry_for(&mock_server);
    let fetcher = test_fetcher();
    let policy = RefreshPolicy {
        skip_sold_out_demotion: [1].into(),
        ..RefreshPolicy::default()
    };

    let summary = Refresher::new(&registry, &fetcher, &mut storage, &policy)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(summary.tickets_updated, 0);

    let alpha = storage
        .get_event_by_url(1, &format!("{}/event/a", mock_server.uri()))
        .unwrap()
        .unwrap();
    let tickets = storage.get_tickets(alpha.id).unwrap();
    assert_eq!(tickets[0].ticket_price, Decimal::new(4500, 2));
    assert!(tickets.iter().all(|ticket| !ticket.sold_out));
}

#[tokio::test]
async fn test_events_without_an_adapter_are_skipped() {
    let mock_server = MockServer::start().await;
    let mut storage = crawled_storage(&mock_server).await;

    let registry = CrawlerRegistry::new();
    let fetcher = test_fetcher();
    let policy = RefreshPolicy::default();

    let summary = Refresher::new(&registry, &fetcher, &mut storage, &policy)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(summary.checked, 0);
    assert_eq!(summary.skipped, 2);
}

#[tokio::test]
async fn test_broken_page_does_not_block_other_events() {
    let mock_server = MockServer::start().await;
    let mut storage = crawled_storage(&mock_server).await;

    mock_server.reset().await;
    mount_page(
        &mock_server,
        "/event/a",
        moshtix_detail_page(&[
            ("General Admission", "$47.00", false),
            ("Early Bird", "$30.00", false),
            ("VIP", "$99.00", false),
        ]),
    )
    .await;
    mount_page(
        &mock_server,
        "/event/c",
        "<html>maintenance</html>".to_string(),
    )
    .await;

    let registry = registry_for(&mock_server);
    let fetcher = test_fetcher();
    let policy = RefreshPolicy::default();

    let summary = Refresher::new(&registry, &fetcher, &mut storage, &policy)
        .run_cycle()
        .await
        .expect("A broken page must not fail the cycle");

    assert_eq!(summary.checked, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.tickets_updated, 1);

    let alpha = storage
        .get_event_by_url(1, &format!("{}/event/a", mock_server.uri()))
        .unwrap()
        .unwrap();
    assert!(alpha.last_refreshed_at.is_some());
    assert_eq!(
        storage.get_tickets(alpha.id).unwrap()[0].ticket_price,
        Decimal::new(4700, 2)
    );

    let charlie = storage
        .get_event_by_url(1, &format!("{}/event/c", mock_server.uri()))
        .unwrap()
        .unwrap();
    assert!(!charlie.invalid);
    assert!(charlie.last_refreshed_at.is_none());

    // Still due, still failing, and still not in the way
    let again = Refresher::new(&registry, &fetcher, &mut storage, &policy)
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(again.checked, 0);
    assert_eq!(again.failed, 1);
}

#[tokio::test]
async fn test_new_tiers_are_created_after_the_highest_number() {
    let mock_server = MockServer::start().await;
    let mut storage = crawled_storage(&mock_server).await;

    mock_server.reset().await;
    mount_page(
        &mock_server,
        "/event/a",
        moshtix_detail_page(&[
            ("General Admission", "$45.00", false),
            ("Early Bird", "$30.00", true),
            ("VIP", "$99.00", false),
            ("Late Entry", "$15.00", false),
        ]),
    )
    .await;
    mount_page(
        &mock_server,
        "/event/c",
        moshtix_detail_page(&[("Standing", "$20.00", false)]),
    )
    .await;

    let registry = registry_for(&mock_server);
    let fetcher = test_fetcher();
    let policy = RefreshPolicy::default();

    let summary = Refresher::new(&registry, &fetcher, &mut storage, &policy)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(summary.checked, 2);
    assert_eq!(summary.tickets_created, 1);
    assert_eq!(summary.tickets_updated, 1);

    let alpha = storage
        .get_event_by_url(1, &format!("{}/event/a", mock_server.uri()))
        .unwrap()
        .unwrap();
    let tickets = storage.get_tickets(alpha.id).unwrap();
    assert_eq!(tickets.len(), 4);
    assert!(tickets[1].sold_out);
    assert_eq!(tickets[3].ticket_num, 4);
    assert_eq!(tickets[3].ticket_type, "Late Entry");
    assert_eq!(tickets[3].ticket_price, Decimal::new(1500, 2));
}
