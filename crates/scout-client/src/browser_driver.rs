use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use scout_core::config::SiteConfig;
use scout_core::driver::{DriverFactory, RenderedPage, SiteDriver};
use scout_core::error::AppError;
use tokio::task::JoinHandle;
use url::Url;

/// Launches one headless Chromium per site.
///
/// Unlike [`crate::HttpDriverFactory`], pages are rendered with JavaScript
/// before extraction, so SPA job boards and lazy-loaded listings work.
#[derive(Debug, Clone)]
pub struct BrowserDriverFactory {
    timeout: Duration,
}

impl BrowserDriverFactory {
    /// Factory with a **30 s** navigation timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// `CHROME_BIN` wins when it points at an existing file. The snap wrapper
    /// at `/snap/bin/chromium` strips headless flags, so the binary inside
    /// the snap is preferred over it. `None` lets `chromiumoxide` search.
    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(path = %p, "CHROME_BIN does not exist, falling back to known locations");
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    fn browser_config(&self) -> Result<BrowserConfig, AppError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .request_timeout(self.timeout);

        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("browser config: {e}")))
    }
}

impl Default for BrowserDriverFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverFactory for BrowserDriverFactory {
    type Driver = BrowserDriver;

    async fn launch(&self, site: &SiteConfig) -> Result<BrowserDriver, AppError> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("failed to launch browser: {e}")))?;

        // The CDP handler must be polled for the connection to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(AppError::BrowserError(format!("failed to open tab: {e}")));
            }
        };

        tracing::debug!(site = %site.name, "Browser session ready");
        Ok(BrowserDriver {
            browser,
            page,
            handler,
            timeout: self.timeout,
        })
    }
}

/// Headless Chromium session with a single reused tab.
pub struct BrowserDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    timeout: Duration,
}

impl BrowserDriver {
    async fn load(&self, url: &str) -> Result<RenderedPage, AppError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| AppError::navigation(url, e.to_string()))?;

        // <body> present is the minimal signal that the main content rendered.
        self.page
            .find_element("body")
            .await
            .map_err(|e| AppError::navigation(url, format!("page did not render body: {e}")))?;

        let html = self
            .page
            .content()
            .await
            .map_err(|e| AppError::navigation(url, format!("failed to read page content: {e}")))?;

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());
        let final_url = Url::parse(&final_url)
            .map_err(|e| AppError::navigation(url, format!("invalid final URL: {e}")))?;

        Ok(RenderedPage::new(final_url, html))
    }
}

impl SiteDriver for BrowserDriver {
    async fn open(&mut self, url: &str) -> Result<RenderedPage, AppError> {
        match tokio::time::timeout(self.timeout, self.load(url)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::navigation(
                url,
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "Failed to close browser cleanly");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}
