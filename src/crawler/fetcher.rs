//! HTTP fetcher implementation
//!
//! This module performs the single GETs the crawler needs:
//! - Building one HTTP client with the configured browser identity
//! - Applying a per-request timeout
//! - Classifying failures as timeout, transport or HTTP status errors
//!
//! There is no retry here; the coordinator decides whether a failed
//! chapter is attempted again.

use crate::config::Config;
use crate::FetchError;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Stateless GET client shared by the catalog fetch and every worker
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    /// Builds a fetcher from the crawler configuration
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let timeout = config.crawler.request_timeout();
        let client = build_http_client(&config.user_agent.value, timeout)?;
        Ok(Self { client, timeout })
    }

    /// Fetches `url` with the configured timeout
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        fetch_url(&self.client, url, self.timeout).await
    }
}

/// Builds an HTTP client with the outbound identity header set
///
/// No cookie store and no auth: every request is an anonymous GET.
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and returns its decoded body
///
/// # Error Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | Timeout (connect, headers or body) | `FetchError::Timeout` |
/// | Non-2xx status | `FetchError::HttpStatus(code)` |
/// | DNS, connection, TLS, decode failures | `FetchError::Transport` |
pub async fn fetch_url(client: &Client, url: &str, timeout: Duration) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(classify_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    response.text().await.map_err(classify_error)
}

fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Transport(format!("connection failed: {}", e))
    } else {
        FetchError::Transport(e.to_string())
    }
}
