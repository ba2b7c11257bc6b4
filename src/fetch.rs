//! Rate-limited fetch session.
//!
//! The site tolerates slow, polite crawlers: every request waits out a
//! minimum delay, and a hard per-session cap bounds how much one run may
//! pull. `keep_going()` is the cooperative stop signal the drain loop checks
//! between items — when the budget is gone, whatever is left in the queue
//! simply stays stale until the next run. Transient upstream errors (429,
//! 5xx) retry with exponential backoff.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::warn;

const BASE_URL: &str = "https://www.cagematch.net/";
const DEFAULT_DELAY_SECS: f64 = 1.0;
const DEFAULT_MAX_REQUESTS: u32 = 100;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// Results pages paginate in blocks of 100 rows.
pub const PAGE_SIZE: usize = 100;

pub struct FetchSession {
    client: reqwest::Client,
    delay: Duration,
    max_requests: u32,
    requests_made: u32,
}

impl FetchSession {
    pub fn new() -> Result<Self> {
        Self::with_limits(DEFAULT_DELAY_SECS, DEFAULT_MAX_REQUESTS)
    }

    /// `max_requests = u32::MAX` effectively removes the session cap; pair it
    /// with a generous delay.
    pub fn with_limits(delay_secs: f64, max_requests: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ringside/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            delay: Duration::from_secs_f64(delay_secs),
            max_requests,
            requests_made: 0,
        })
    }

    /// May the caller keep draining? False once the session budget is spent.
    pub fn keep_going(&self) -> bool {
        if self.requests_made >= self.max_requests {
            warn!("out of requests for this session");
            return false;
        }
        true
    }

    pub fn requests_made(&self) -> u32 {
        self.requests_made
    }

    pub fn profile_url(&self, id: i64) -> String {
        format!("{BASE_URL}?id=2&nr={id}")
    }

    pub fn matches_url(&self, id: i64, year: Option<i32>, offset: usize) -> String {
        let mut url = format!("{BASE_URL}?id=2&nr={id}&page=4");
        if let Some(year) = year {
            url.push_str(&format!("&year={year}"));
        }
        if offset > 0 {
            url.push_str(&format!("&s={offset}"));
        }
        url
    }

    pub fn promotion_url(&self, id: i64) -> String {
        format!("{BASE_URL}?id=8&nr={id}")
    }

    /// Fetch a page, honoring the inter-request delay and retrying transient
    /// upstream errors with exponential backoff.
    pub async fn fetch(&mut self, url: &str) -> Result<String> {
        for attempt in 0..=MAX_RETRIES {
            tokio::time::sleep(self.delay).await;
            self.requests_made += 1;

            let response = self.client.get(url).send().await;
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.text().await.context("reading response body")?);
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt == MAX_RETRIES {
                        bail!("{url} returned {status}");
                    }
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "{} (attempt {}/{}), backing off {:.1}s",
                        status,
                        attempt + 1,
                        MAX_RETRIES,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    if attempt == MAX_RETRIES {
                        return Err(e).context(format!("fetching {url}"));
                    }
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "request error (attempt {}/{}): {}, backing off {:.1}s",
                        attempt + 1,
                        MAX_RETRIES,
                        e,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        unreachable!("retry loop always returns")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_budget_gates_keep_going() {
        let mut session = FetchSession::with_limits(0.0, 2).unwrap();
        assert!(session.keep_going());
        session.requests_made = 2;
        assert!(!session.keep_going());
    }

    #[test]
    fn url_builders() {
        let s = FetchSession::new().unwrap();
        assert_eq!(s.profile_url(4629), "https://www.cagematch.net/?id=2&nr=4629");
        assert_eq!(
            s.matches_url(4629, Some(2025), 0),
            "https://www.cagematch.net/?id=2&nr=4629&page=4&year=2025"
        );
        assert_eq!(
            s.matches_url(4629, Some(2025), 100),
            "https://www.cagematch.net/?id=2&nr=4629&page=4&year=2025&s=100"
        );
        assert_eq!(
            s.matches_url(4629, None, 0),
            "https://www.cagematch.net/?id=2&nr=4629&page=4"
        );
        assert_eq!(s.promotion_url(1467), "https://www.cagematch.net/?id=8&nr=1467");
    }
}
