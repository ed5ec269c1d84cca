//! Shared HTTP plumbing for providers.
//!
//! Features:
//! - Separate timeouts for metadata requests and byte downloads.
//! - Automatic retry on HTTP 429 with `Retry-After` header support, bounded by
//!   the request timeout.
//! - Optional token-bucket rate limiting via [`governor`].
//! - Every failure mapped onto [`FetchError`].

use std::num::NonZeroU32;
use std::time::Duration;

use bytes::Bytes;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nekoview_common::{FetchError, FetchResult};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::HttpConfig;

/// HTTP client shared by a provider's metadata and download requests.
pub struct HttpClient {
    client: reqwest::Client,
    metadata_timeout: Duration,
    download_timeout: Duration,
    max_retries: u32,
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl HttpClient {
    /// Build a client from the `[http]` config, optionally sending a fixed
    /// `User-Agent`.
    pub fn new(config: &HttpConfig, user_agent: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            metadata_timeout: Duration::from_secs(config.metadata_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            max_retries: config.max_retries,
            rate_limiter: None,
        })
    }

    /// Limit outgoing requests to `per_second`.
    pub fn with_rate_limit(mut self, per_second: NonZeroU32) -> Self {
        self.rate_limiter = Some(RateLimiter::direct(Quota::per_second(per_second)));
        self
    }

    /// GET `url` and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> FetchResult<T> {
        let resp = self.get(url, self.metadata_timeout).await?;
        let body = resp.bytes().await.map_err(|e| transport_error(url, &e))?;
        serde_json::from_slice(&body)
            .map_err(|e| FetchError::parse(format!("unexpected response from {url}: {e}")))
    }

    /// GET `url` and return the body verbatim.
    pub async fn get_bytes(&self, url: &str) -> FetchResult<Bytes> {
        let resp = self.get(url, self.download_timeout).await?;
        resp.bytes().await.map_err(|e| transport_error(url, &e))
    }

    /// Execute a GET request with rate limiting and 429-retry logic.
    ///
    /// `timeout` bounds the whole call, retries and back-off included. A
    /// `Retry-After` that would overrun it fails the request with the 429.
    async fn get(&self, url: &str, timeout: Duration) -> FetchResult<reqwest::Response> {
        let deadline = Instant::now().checked_add(timeout);
        let remaining = || match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => timeout,
        };

        let mut retries = 0u32;
        loop {
            if let Some(limiter) = &self.rate_limiter {
                limiter.until_ready().await;
            }

            let budget = remaining();
            if budget.is_zero() {
                return Err(FetchError::network(format!("request to {url} timed out")));
            }

            debug!(url = %url, "HTTP GET");
            let resp = self
                .client
                .get(url)
                .timeout(budget)
                .send()
                .await
                .map_err(|e| transport_error(url, &e))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && retries < self.max_retries {
                let wait = Duration::from_secs(
                    resp.headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(1),
                );
                if wait >= remaining() {
                    warn!(
                        url = %url,
                        wait_secs = wait.as_secs(),
                        "Provider asked to wait past the request timeout; giving up"
                    );
                    return Err(FetchError::status(status.as_u16(), url));
                }

                retries += 1;
                warn!(
                    url = %url,
                    retry = retries,
                    wait_secs = wait.as_secs(),
                    "Provider returned 429, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::status(status.as_u16(), url));
            }

            return Ok(resp);
        }
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::network(format!("request to {url} timed out"))
    } else {
        FetchError::network(format!("request to {url} failed: {err}"))
    }
}

/// Build `{base}{path}?{params}` with proper query encoding.
pub fn build_url(base: &str, path: &str, params: &[(&str, &str)]) -> FetchResult<String> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    let mut url = reqwest::Url::parse(&raw)
        .map_err(|e| FetchError::network(format!("invalid request URL {raw}: {e}")))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url.into())
}
