//! Test utilities: mock drivers, a recording reporter and config fixtures.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use url::Url;

use crate::collector::{CollectorEvent, CollectorReporter};
use crate::config::{FieldSelectors, SiteConfig};
use crate::driver::{DriverFactory, RenderedPage, SiteDriver};
use crate::error::AppError;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A site whose cards are `li.job` with `h2` titles, `.company` and a `.title` link.
pub fn site_config(url: &str) -> SiteConfig {
    SiteConfig::new(
        "test-site",
        url,
        "li.job",
        FieldSelectors {
            title: "h2".into(),
            company: ".company".into(),
            link: ".title".into(),
            extra: Default::default(),
        },
    )
}

/// Listing-page markup with one card per `(title, href)`.
pub fn listing_page(cards: &[(&str, &str)]) -> String {
    let items: String = cards
        .iter()
        .map(|(title, href)| {
            format!(
                r#"<li class="job"><h2>{title}</h2><span class="company">Acme</span><a class="title" href="{href}">View</a></li>"#
            )
        })
        .collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}

/// Detail-page markup with a `#description` and `.salary` block.
pub fn detail_page(description: &str, salary: &str) -> String {
    format!(
        r#"<html><body><div id="description">{description}</div><div class="salary">{salary}</div></body></html>"#
    )
}

// ---------------------------------------------------------------------------
// MockDriver
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockDriverState {
    /// Queued responses per URL. The last response for a URL is sticky.
    responses: HashMap<String, VecDeque<Result<String, String>>>,
    visits: Vec<String>,
    closed: u32,
}

/// Mock driver serving canned HTML per URL and recording every visit.
///
/// Unknown URLs fail with a navigation error. Clones share state.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockDriverState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.push(url, Ok(html.to_string()));
        self
    }

    pub fn with_error(self, url: &str, message: &str) -> Self {
        self.push(url, Err(message.to_string()));
        self
    }

    fn push(&self, url: &str, response: Result<String, String>) {
        let mut state = self.state.lock().unwrap();
        state
            .responses
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// URLs opened so far, in order.
    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn closed(&self) -> u32 {
        self.state.lock().unwrap().closed
    }
}

impl SiteDriver for MockDriver {
    async fn open(&mut self, url: &str) -> Result<RenderedPage, AppError> {
        let mut state = self.state.lock().unwrap();
        state.visits.push(url.to_string());

        let response = match state.responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match response {
            Some(Ok(html)) => {
                let parsed = Url::parse(url)
                    .map_err(|e| AppError::navigation(url, format!("invalid URL: {e}")))?;
                Ok(RenderedPage::new(parsed, html))
            }
            Some(Err(message)) => Err(AppError::navigation(url, message)),
            None => Err(AppError::navigation(url, "HTTP 404")),
        }
    }

    async fn close(self) {
        self.state.lock().unwrap().closed += 1;
    }
}

// ---------------------------------------------------------------------------
// MockDriverFactory
// ---------------------------------------------------------------------------

/// Factory handing out clones of one [`MockDriver`]; launches for the named
/// sites fail.
#[derive(Clone, Default)]
pub struct MockDriverFactory {
    pub driver: MockDriver,
    failing_sites: HashSet<String>,
    launches: Arc<Mutex<Vec<String>>>,
}

impl MockDriverFactory {
    pub fn new(driver: MockDriver) -> Self {
        Self {
            driver,
            ..Default::default()
        }
    }

    pub fn failing_for(mut self, site: &str) -> Self {
        self.failing_sites.insert(site.to_string());
        self
    }

    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().unwrap().clone()
    }
}

impl DriverFactory for MockDriverFactory {
    type Driver = MockDriver;

    async fn launch(&self, site: &SiteConfig) -> Result<MockDriver, AppError> {
        self.launches.lock().unwrap().push(site.name.clone());
        if self.failing_sites.contains(&site.name) {
            return Err(AppError::BrowserError("launch refused".into()));
        }
        Ok(self.driver.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records a short tag per event.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl CollectorReporter for RecordingReporter {
    fn report(&self, event: CollectorEvent<'_>) {
        let tag = match event {
            CollectorEvent::SiteStarted { site, .. } => format!("site_started:{site}"),
            CollectorEvent::PageFetched { page, cards, .. } => format!("page_fetched:{page}:{cards}"),
            CollectorEvent::PageFailed { page, .. } => format!("page_failed:{page}"),
            CollectorEvent::DetailFailed { link, .. } => format!("detail_failed:{link}"),
            CollectorEvent::ListingAccepted { listing, .. } => format!("accepted:{}", listing.link),
            CollectorEvent::ListingRejected { listing, .. } => format!("rejected:{}", listing.link),
            CollectorEvent::SafetyLimitReached { pages, .. } => format!("safety_limit:{pages}"),
            CollectorEvent::SiteFinished { site, stop, .. } => format!("site_finished:{site}:{stop}"),
            CollectorEvent::SiteAborted { site, stop, .. } => format!("site_aborted:{site}:{stop}"),
            CollectorEvent::Cancelled => "cancelled".to_string(),
        };
        self.events.lock().unwrap().push(tag);
    }
}
