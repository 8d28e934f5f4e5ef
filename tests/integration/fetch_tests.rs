//! Fetcher behavior against a live mock server

use std::time::Duration;
use ticket_harvester::config::FetchConfig;
use ticket_harvester::crawler::Fetcher;
use ticket_harvester::HarvestError;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::test_fetcher;

#[tokio::test]
async fn test_fetch_sends_configured_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(header("user-agent", "Mozilla/5.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let body = test_fetcher()
        .fetch(&format!("{}/search", mock_server.uri()))
        .await
        .expect("Fetch should succeed");

    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn test_error_status_still_returns_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Event not found"))
        .mount(&mock_server)
        .await;

    let body = test_fetcher()
        .fetch(&format!("{}/gone", mock_server.uri()))
        .await
        .expect("Non-2xx responses are not transport errors");

    assert_eq!(body, "Event not found");
}

#[tokio::test]
async fn test_timeouts_are_retried_until_the_attempt_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(3)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = FetchConfig {
        timeout_secs: 1,
        retry_delay_secs: 0,
        max_attempts: Some(2),
        ..FetchConfig::default()
    };
    let fetcher = Fetcher::new(&config).unwrap();

    let err = fetcher
        .fetch(&format!("{}/slow", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Timeout { attempts: 2, .. }));
}

#[tokio::test]
async fn test_connection_failure_is_not_retried() {
    let err = test_fetcher()
        .fetch("http://127.0.0.1:1/unreachable")
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Http { .. }));
}

#[tokio::test]
async fn test_primed_cookies_are_replayed() {
    let mock_server = MockServer::start().await;

    // Mounted first so it wins once the cookie is present
    Mock::given(method("GET"))
        .and(path("/event/42"))
        .and(header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("event details"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/event/42"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("set-cookie", "session=abc123; Path=/; HttpOnly")
                .insert_header("location", "/queue"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let body = test_fetcher()
        .fetch_with_primed_cookies(&format!("{}/event/42", mock_server.uri()))
        .await
        .expect("Primed fetch should succeed");

    assert_eq!(body, "event details");
}
