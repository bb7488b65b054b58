use std::{future::Future, time::Duration};

use reqwest::{
    Response,
    header::{HeaderMap, HeaderValue, REFERER},
};
use tracing::{debug, error, warn};

use crate::section::{SectionExtractor, SectionState};

pub static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The ticketing site being scraped: its base URL and the headers sent with
/// every page request.
#[derive(Clone, Debug)]
pub struct Site {
    host: String,
    headers: HeaderMap,
}

impl Site {
    pub fn new(host: &str) -> Self {
        let host = host.trim().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        if let Ok(referer) = HeaderValue::from_str(&format!("{host}/")) {
            headers.insert(REFERER, referer);
        }
        Self { host, headers }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    pub delay: Duration,
    /// Per attempt, covering the body read as well.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: 2, delay: Duration::from_millis(500), timeout: Duration::from_secs(10) }
    }
}

/// HTTP access for one scrape invocation. Owns its connection pool, which is
/// released when the fetcher is dropped.
///
/// Fetch failures are not errors here: after the retries run out the caller
/// gets `None` and decides what a missing page means.
pub struct Fetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
    max_concurrent: usize,
}

impl Fetcher {
    pub fn new(policy: RetryPolicy, max_concurrent: usize) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client, policy, max_concurrent: max_concurrent.max(1) })
    }

    /// Fan-out width for per-entity enrichment.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub async fn fetch(&self, url: &str, headers: &HeaderMap) -> Option<String> {
        self.with_retries(url, headers, |response| response.text()).await
    }

    /// Streams `url` and returns only the text from `start` up to (not
    /// including) `end`, dropping the connection as soon as `end` is seen.
    pub async fn fetch_section(
        &self,
        url: &str,
        headers: &HeaderMap,
        start: &str,
        end: &str,
    ) -> Option<String> {
        self.with_retries(url, headers, |mut response| async move {
            let mut section = SectionExtractor::new(start, end);
            while let Some(bytes) = response.chunk().await? {
                if section.push(&bytes) {
                    debug!(url = %response.url(), "section end reached, abandoning body");
                    break;
                }
            }
            if section.state() == SectionState::Searching {
                debug!(url = %response.url(), "section start marker not found");
            }
            Ok(section.finish())
        })
        .await
    }

    async fn with_retries<T, F, Fut>(&self, url: &str, headers: &HeaderMap, read: F) -> Option<T>
    where
        F: Fn(Response) -> Fut,
        Fut: Future<Output = reqwest::Result<T>>,
    {
        for attempt in 0..=self.policy.retries {
            let result = async {
                let response = self
                    .client
                    .get(url)
                    .headers(headers.clone())
                    .timeout(self.policy.timeout)
                    .send()
                    .await?
                    .error_for_status()?;
                read(response).await
            }
            .await;

            match result {
                Ok(body) => return Some(body),
                Err(err) if attempt < self.policy.retries => {
                    warn!(attempt = attempt, url = %url, error = %err, "failed to fetch, retrying");
                    tokio::time::sleep(self.policy.delay).await;
                },
                Err(err) => {
                    error!(url = %url, error = %err, "all attempts failed");
                },
            }
        }
        None
    }
}
