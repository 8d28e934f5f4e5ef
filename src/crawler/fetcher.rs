//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made to vendor sites, including:
//! - Building HTTP clients with the configured user agent
//! - Retrying requests that time out, with a fixed delay between attempts
//! - The two-step cookie-priming fetch some vendors require

use crate::config::FetchConfig;
use crate::HarvestError;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{redirect::Policy, Client, Response};
use std::future::Future;
use std::time::Duration;

/// How often and how patiently a timed-out request is retried
///
/// Only timeouts are retried. Every other transport error is returned to the
/// caller on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts before giving up; `None` retries forever
    pub max_attempts: Option<u32>,

    /// Fixed wait between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retries forever, waiting `delay` between attempts
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    /// Gives up after `max_attempts` attempts
    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay,
        }
    }

    /// Returns true if another attempt is allowed after `attempts` have failed
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(30))
    }
}

/// Retrying HTTP GET shared by every vendor adapter
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    no_redirect_client: Client,
    policy: RetryPolicy,
}

/// Builds an HTTP client with the configured user agent and timeouts
///
/// # Arguments
///
/// * `config` - The fetch configuration
/// * `redirect` - Redirect policy for this client
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig, redirect: Policy) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(redirect)
        .gzip(true)
        .brotli(true)
        .build()
}

impl Fetcher {
    /// Creates a fetcher from the fetch configuration
    pub fn new(config: &FetchConfig) -> Result<Self, HarvestError> {
        Ok(Self {
            client: build_http_client(config, Policy::default())?,
            no_redirect_client: build_http_client(config, Policy::none())?,
            policy: config.retry_policy(),
        })
    }

    /// Fetches a URL and returns its body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Timeout | Wait `policy.delay`, retry (forever by default) |
    /// | Other transport error | Immediate → `HarvestError::Http` |
    /// | Non-2xx status | Logged, body returned |
    pub async fn fetch(&self, url: &str) -> Result<String, HarvestError> {
        let client = &self.client;
        self.with_retry(url, move || async move {
            tracing::info!("Opening URL: {}", url);
            let response = client.get(url).send().await?;
            read_body(url, response).await
        })
        .await
    }

    /// Fetches a URL after priming the vendor's session cookies
    ///
    /// The first GET does not follow redirects and only captures the
    /// `Set-Cookie` headers; the second GET replays them. The pair is retried
    /// as a unit when either request times out.
    pub async fn fetch_with_primed_cookies(&self, url: &str) -> Result<String, HarvestError> {
        let client = &self.client;
        let no_redirect_client = &self.no_redirect_client;
        self.with_retry(url, move || async move {
            tracing::info!("Opening URL with primed cookies: {}", url);
            let priming = no_redirect_client.get(url).send().await?;
            let cookies = collect_cookies(&priming);
            drop(priming);

            let mut request = client.get(url);
            if !cookies.is_empty() {
                request = request.header(COOKIE, cookies);
            }
            let response = request.send().await?;
            read_body(url, response).await
        })
        .await
    }

    async fn with_retry<F, Fut>(&self, url: &str, mut attempt: F) -> Result<String, HarvestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, reqwest::Error>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;
            match attempt().await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_timeout() => {
                    if !self.policy.allows_retry(attempts) {
                        return Err(HarvestError::Timeout {
                            url: url.to_string(),
                            attempts,
                        });
                    }
                    tracing::warn!(
                        "Received timeout for {}, retrying in {:?}...",
                        url,
                        self.policy.delay
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(e) => {
                    return Err(HarvestError::Http {
                        url: url.to_string(),
                        source: e,
                    })
                }
            }
        }
    }
}

async fn read_body(url: &str, response: Response) -> Result<String, reqwest::Error> {
    let status = response.status();
    if !status.is_success() {
        tracing::warn!("{} answered HTTP {}", url, status.as_u16());
    }
    response.text().await
}

/// Joins every `Set-Cookie` name=value pair into one `Cookie` header value
fn collect_cookies(response: &Response) -> String {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}
