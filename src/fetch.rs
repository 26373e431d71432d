//! HTTP fetching with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`Fetch`]: Core trait for "give me the body at this URL"
//! - [`HttpFetcher`]: `reqwest` implementation; non-success statuses are errors
//! - [`RetryFetch`]: Decorator that adds bounded retry to any [`Fetch`]
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
//! ```
//!
//! After `max_retries` failed retries the last error is returned and the
//! caller skips that URL. [`with_retry`] applies the same policy to any
//! fallible async operation, e.g. fetch-then-parse in the poller.

use crate::config::RetryConfig;
use rand::{Rng, rng};
use reqwest::Client;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Something that can fetch the text body of a URL.
pub trait Fetch {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

impl<T: Fetch> Fetch for &T {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        (**self).fetch(url).await
    }
}

/// Plain HTTP GET with a user agent and request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: StdDuration) -> Result<Self, Box<dyn Error>> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("status is not good: {status}").into());
        }
        let body = response.text().await?;
        debug!(
            %status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u128,
            "Fetched"
        );
        Ok(body)
    }
}

/// Backoff parameters for [`RetryFetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry; doubles on each attempt.
    pub base_delay: StdDuration,
    pub max_delay: StdDuration,
    pub max_jitter: StdDuration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: StdDuration::from_millis(config.base_delay_ms),
            max_delay: StdDuration::from_millis(config.max_delay_ms),
            max_jitter: StdDuration::from_millis(config.jitter_ms),
        }
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`] implementation.
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Fetch> RetryFetch<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T: Fetch> Fetch for RetryFetch<T> {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        with_retry(&self.policy, || self.inner.fetch(url)).await
    }
}

/// Run `op` until it succeeds or `policy.max_retries` retries have failed,
/// sleeping with backoff and jitter between attempts. The last error is
/// returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, Box<dyn Error>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Box<dyn Error>>>,
{
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                let total_dt = total_t0.elapsed();

                if attempt > policy.max_retries {
                    error!(
                        attempt,
                        max = policy.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        error = %e,
                        "exhausted retries"
                    );
                    return Err(e);
                }

                let jitter_ms = policy.max_jitter.as_millis() as u64;
                let jitter_ms: u64 = rng().random_range(0..=jitter_ms);
                let delay = policy.backoff(attempt) + StdDuration::from_millis(jitter_ms);

                warn!(
                    attempt,
                    max = policy.max_retries,
                    elapsed_ms_total = total_dt.as_millis() as u128,
                    ?delay,
                    error = %e,
                    "attempt failed; backing off"
                );
                sleep(delay).await;
            }
        }
    }
}
