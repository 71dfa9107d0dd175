use std::time::Duration;

use reqwest::Client;
use scout_core::config::SiteConfig;
use scout_core::driver::{DriverFactory, RenderedPage, SiteDriver};
use scout_core::error::AppError;

const USER_AGENT: &str = "Scout/0.1 (job collector)";

/// Launches one [`HttpDriver`] per site.
///
/// Static HTML only: pages that build their listings with JavaScript need the
/// `browser` feature.
#[derive(Debug, Clone)]
pub struct HttpDriverFactory {
    timeout: Duration,
    user_agent: String,
}

impl HttpDriverFactory {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpDriverFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverFactory for HttpDriverFactory {
    type Driver = HttpDriver;

    async fn launch(&self, site: &SiteConfig) -> Result<HttpDriver, AppError> {
        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout)
            .build()
            .map_err(|e| AppError::BrowserError(format!("HTTP client for '{}': {e}", site.name)))?;
        tracing::debug!(site = %site.name, "HTTP session ready");
        Ok(HttpDriver {
            client,
            timeout: self.timeout,
        })
    }
}

/// Plain HTTP session backed by a reqwest client.
pub struct HttpDriver {
    client: Client,
    timeout: Duration,
}

impl SiteDriver for HttpDriver {
    async fn open(&mut self, url: &str) -> Result<RenderedPage, AppError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::navigation(url, format!("timed out after {}s", self.timeout.as_secs()))
            } else if e.is_connect() {
                AppError::navigation(url, format!("connection failed: {e}"))
            } else {
                AppError::navigation(url, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::navigation(url, format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| AppError::navigation(url, format!("failed to read response body: {e}")))?;

        Ok(RenderedPage::new(final_url, html))
    }

    async fn close(self) {}
}
