use std::future::Future;
use std::time::Duration;

use url::Url;

use crate::config::SiteConfig;
use crate::error::AppError;

/// A fetched page: its final URL (after redirects) and rendered DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    url: Url,
    html: String,
}

impl RenderedPage {
    pub fn new(url: Url, html: String) -> Self {
        Self { url, html }
    }

    /// Base URL for resolving relative links on this page.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn rendered_html(&self) -> &str {
        &self.html
    }

    /// True when the document carries no markup worth parsing.
    pub fn is_blank(&self) -> bool {
        self.html.trim().is_empty()
    }
}

/// One browsing session against a single site.
///
/// Sessions are stateful and not shared: the collection loop owns its driver
/// exclusively and calls [`SiteDriver::close`] on every exit path.
pub trait SiteDriver: Send {
    /// Load `url` and return its rendered DOM. Timeouts and unreachable pages
    /// surface as [`AppError::NavigationError`].
    fn open(&mut self, url: &str) -> impl Future<Output = Result<RenderedPage, AppError>> + Send;

    /// Tear the session down.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Acquires a fresh [`SiteDriver`] session per site.
pub trait DriverFactory: Send + Sync {
    type Driver: SiteDriver;

    fn launch(&self, site: &SiteConfig) -> impl Future<Output = Result<Self::Driver, AppError>> + Send;
}

/// Bounded retry for page loads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

/// Open `url`, retrying retryable failures up to `policy.attempts` times.
pub async fn open_with_retry<D: SiteDriver>(
    driver: &mut D,
    url: &str,
    policy: &RetryPolicy,
) -> Result<RenderedPage, AppError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match driver.open(url).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::debug!(%url, attempt, error = %e, "Page load failed, retrying");
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
