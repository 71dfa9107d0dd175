use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{QualificationPolicy, SiteConfig};
use crate::detail::DetailFetcher;
use crate::driver::{DriverFactory, RetryPolicy, SiteDriver, open_with_retry};
use crate::error::AppError;
use crate::extract::ListingExtractor;
use crate::listing::JobListing;
use crate::pagination::{PageTurn, Paginator};
use crate::qualifier::{SkillQualifier, Verdict};
use crate::throttle::Throttle;

/// Why a site's collection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_jobs` qualified listings were accepted.
    QuotaReached,
    /// The paginator found no further page.
    Exhausted,
    /// The page ceiling was hit while more pages may exist.
    SafetyLimit,
    /// An external stop was requested.
    Cancelled,
    /// The first page could not be loaded.
    NavigationFailed,
    /// No driver session could be acquired.
    LaunchFailed,
    /// Selectors failed to compile, or no link selector is configured.
    Misconfigured,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::QuotaReached => "quota_reached",
            StopReason::Exhausted => "exhausted",
            StopReason::SafetyLimit => "safety_limit",
            StopReason::Cancelled => "cancelled",
            StopReason::NavigationFailed => "navigation_failed",
            StopReason::LaunchFailed => "launch_failed",
            StopReason::Misconfigured => "misconfigured",
        }
    }

    /// True when the site aborted without collecting anything.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StopReason::NavigationFailed | StopReason::LaunchFailed | StopReason::Misconfigured
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of collecting one site.
#[derive(Debug, Clone, Serialize)]
pub struct SiteOutcome {
    pub site: String,
    /// Qualified listings in acceptance order.
    pub listings: Vec<JobListing>,
    pub pages_visited: u32,
    pub stop: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SiteOutcome {
    fn failed(site: &SiteConfig, stop: StopReason, error: &AppError) -> Self {
        Self {
            site: site.name.clone(),
            listings: Vec::new(),
            pages_visited: 0,
            stop,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregate of a whole run, one outcome per site in configuration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionReport {
    pub sites: Vec<SiteOutcome>,
}

impl CollectionReport {
    pub fn total_accepted(&self) -> usize {
        self.sites.iter().map(|s| s.listings.len()).sum()
    }

    /// All qualified listings, grouped by site in configuration order.
    pub fn into_listings(self) -> Vec<JobListing> {
        self.sites.into_iter().flat_map(|s| s.listings).collect()
    }
}

/// Events emitted by the collector for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CollectorEvent<'a> {
    SiteStarted {
        site: &'a str,
        url: &'a str,
    },
    PageFetched {
        site: &'a str,
        page: u32,
        url: &'a str,
        cards: usize,
    },
    PageFailed {
        site: &'a str,
        page: u32,
        url: &'a str,
        error: &'a str,
    },
    DetailFailed {
        site: &'a str,
        link: &'a str,
        error: &'a str,
    },
    ListingAccepted {
        site: &'a str,
        listing: &'a JobListing,
    },
    ListingRejected {
        site: &'a str,
        listing: &'a JobListing,
        verdict: &'a Verdict,
    },
    SafetyLimitReached {
        site: &'a str,
        pages: u32,
    },
    SiteFinished {
        site: &'a str,
        accepted: usize,
        pages: u32,
        stop: StopReason,
    },
    SiteAborted {
        site: &'a str,
        stop: StopReason,
        error: &'a str,
    },
    Cancelled,
}

/// Trait for receiving collector events (decoupled logging).
pub trait CollectorReporter: Send + Sync {
    fn report(&self, event: CollectorEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCollectorReporter;

impl CollectorReporter for TracingCollectorReporter {
    fn report(&self, event: CollectorEvent<'_>) {
        match event {
            CollectorEvent::SiteStarted { site, url } => {
                tracing::info!(%site, %url, "Collecting site");
            }
            CollectorEvent::PageFetched {
                site,
                page,
                url,
                cards,
            } => {
                tracing::info!(%site, page, %url, cards, "Page fetched");
            }
            CollectorEvent::PageFailed {
                site,
                page,
                url,
                error,
            } => {
                tracing::error!(%site, page, %url, %error, "Page failed");
            }
            CollectorEvent::DetailFailed { site, link, error } => {
                tracing::warn!(%site, %link, %error, "Detail fetch failed, keeping listing as-is");
            }
            CollectorEvent::ListingAccepted { site, listing } => {
                tracing::info!(%site, title = %listing.label(), link = %listing.link, "Listing accepted");
            }
            CollectorEvent::ListingRejected {
                site,
                listing,
                verdict,
            } => {
                tracing::debug!(%site, link = %listing.link, %verdict, "Listing rejected");
            }
            CollectorEvent::SafetyLimitReached { site, pages } => {
                tracing::warn!(%site, pages, "Safety limit reached, stopping pagination");
            }
            CollectorEvent::SiteFinished {
                site,
                accepted,
                pages,
                stop,
            } => {
                tracing::info!(%site, accepted, pages, %stop, "Site finished");
            }
            CollectorEvent::SiteAborted { site, stop, error } => {
                tracing::error!(%site, %stop, %error, "Site aborted");
            }
            CollectorEvent::Cancelled => {
                tracing::info!("Collection cancelled");
            }
        }
    }
}

/// Pacing and retry settings shared by every site loop.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Pause between listing-page fetches.
    pub page_throttle: Throttle,
    /// Pause before each detail-page fetch.
    pub detail_throttle: Throttle,
    pub retry: RetryPolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            page_throttle: Throttle::new(Duration::from_secs(1)),
            detail_throttle: Throttle::new(Duration::from_millis(500)),
            retry: RetryPolicy::default(),
        }
    }
}

impl CollectorConfig {
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_throttle.delay = delay;
        self
    }

    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_throttle.delay = delay;
        self
    }

    /// Random extra wait, uniform in `[0, jitter)`, added to both delays.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.page_throttle = self.page_throttle.with_jitter(jitter);
        self.detail_throttle = self.detail_throttle.with_jitter(jitter);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Compiled per-site machinery, built before any session is launched.
struct SitePlan {
    extractor: ListingExtractor,
    detail: DetailFetcher,
    paginator: Paginator,
}

impl SitePlan {
    fn new(site: &SiteConfig) -> Result<Self, AppError> {
        Ok(Self {
            extractor: ListingExtractor::new(site)?,
            detail: DetailFetcher::new(&site.detail_fields)?,
            paginator: Paginator::new(site)?,
        })
    }
}

/// Progress of one site loop.
struct SiteProgress {
    accepted: Vec<JobListing>,
    pages: u32,
}

/// Orchestrates the per-site collection loop across all configured sites.
///
/// Sites run sequentially in configuration order, each with its own driver
/// session. One site's failure never aborts the run.
pub struct CollectorService<DF>
where
    DF: DriverFactory,
{
    factory: DF,
    qualifier: SkillQualifier,
    config: CollectorConfig,
}

impl<DF> CollectorService<DF>
where
    DF: DriverFactory,
{
    pub fn new(factory: DF, policy: &QualificationPolicy, config: CollectorConfig) -> Self {
        Self {
            factory,
            qualifier: SkillQualifier::new(policy),
            config,
        }
    }

    /// Collect every site in order, checking for cancellation between sites.
    pub async fn run<R: CollectorReporter>(
        &self,
        sites: &[SiteConfig],
        cancel: &CancellationToken,
        reporter: &R,
    ) -> CollectionReport {
        let mut report = CollectionReport::default();
        for site in sites {
            if cancel.is_cancelled() {
                reporter.report(CollectorEvent::Cancelled);
                break;
            }
            let outcome = self.collect_site(site, cancel, reporter).await;
            let cancelled = outcome.stop == StopReason::Cancelled;
            report.sites.push(outcome);
            if cancelled {
                break;
            }
        }
        report
    }

    /// Run the collection loop for one site.
    ///
    /// The driver session is acquired here and closed on every exit path.
    pub async fn collect_site<R: CollectorReporter>(
        &self,
        site: &SiteConfig,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> SiteOutcome {
        reporter.report(CollectorEvent::SiteStarted {
            site: &site.name,
            url: &site.url,
        });

        let mut plan = match SitePlan::new(site) {
            Ok(plan) => plan,
            Err(e) => return self.abort(site, StopReason::Misconfigured, &e, reporter),
        };
        if !site.has_link_selector() {
            let e = AppError::ConfigError("fields.link is empty, no listing can be linked".into());
            return self.abort(site, StopReason::Misconfigured, &e, reporter);
        }

        let mut driver = match self.factory.launch(site).await {
            Ok(driver) => driver,
            Err(e) => return self.abort(site, StopReason::LaunchFailed, &e, reporter),
        };

        let mut progress = SiteProgress {
            accepted: Vec::new(),
            pages: 0,
        };
        let result = self
            .drive(site, &mut plan, &mut driver, &mut progress, cancel, reporter)
            .await;
        driver.close().await;

        match result {
            Ok(stop) => {
                reporter.report(CollectorEvent::SiteFinished {
                    site: &site.name,
                    accepted: progress.accepted.len(),
                    pages: progress.pages,
                    stop,
                });
                SiteOutcome {
                    site: site.name.clone(),
                    listings: progress.accepted,
                    pages_visited: progress.pages,
                    stop,
                    error: None,
                }
            }
            Err(e) => {
                let mut outcome = self.abort(site, StopReason::NavigationFailed, &e, reporter);
                outcome.pages_visited = progress.pages;
                outcome
            }
        }
    }

    fn abort<R: CollectorReporter>(
        &self,
        site: &SiteConfig,
        stop: StopReason,
        error: &AppError,
        reporter: &R,
    ) -> SiteOutcome {
        let message = error.to_string();
        reporter.report(CollectorEvent::SiteAborted {
            site: &site.name,
            stop,
            error: &message,
        });
        SiteOutcome::failed(site, stop, error)
    }

    /// Page loop. Returns `Err` only when the first page cannot be loaded.
    async fn drive<R: CollectorReporter>(
        &self,
        site: &SiteConfig,
        plan: &mut SitePlan,
        driver: &mut DF::Driver,
        progress: &mut SiteProgress,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<StopReason, AppError> {
        let quota = site.quota();
        let mut url = site.url.clone();

        loop {
            progress.pages += 1;
            let page = match open_with_retry(driver, &url, &self.config.retry).await {
                Ok(page) => Some(page),
                Err(e) if progress.pages == 1 => return Err(e),
                Err(e) => {
                    reporter.report(CollectorEvent::PageFailed {
                        site: &site.name,
                        page: progress.pages,
                        url: &url,
                        error: &e.to_string(),
                    });
                    None
                }
            };

            if let Some(page) = &page {
                match plan.extractor.extract(page) {
                    Ok(cards) => {
                        reporter.report(CollectorEvent::PageFetched {
                            site: &site.name,
                            page: progress.pages,
                            url: &url,
                            cards: cards.len(),
                        });
                        self.process_cards(site, cards, &plan.detail, driver, progress, reporter)
                            .await;
                    }
                    Err(e) => {
                        reporter.report(CollectorEvent::PageFailed {
                            site: &site.name,
                            page: progress.pages,
                            url: &url,
                            error: &e.to_string(),
                        });
                    }
                }
            }

            if progress.accepted.len() >= quota {
                return Ok(StopReason::QuotaReached);
            }

            match plan.paginator.advance(page.as_ref()) {
                PageTurn::Next(next) => url = next,
                PageTurn::Exhausted => return Ok(StopReason::Exhausted),
                PageTurn::SafetyLimit => {
                    reporter.report(CollectorEvent::SafetyLimitReached {
                        site: &site.name,
                        pages: progress.pages,
                    });
                    return Ok(StopReason::SafetyLimit);
                }
            }

            if cancel.is_cancelled() {
                reporter.report(CollectorEvent::Cancelled);
                return Ok(StopReason::Cancelled);
            }
            tokio::select! {
                () = self.config.page_throttle.pause() => {}
                () = cancel.cancelled() => {
                    reporter.report(CollectorEvent::Cancelled);
                    return Ok(StopReason::Cancelled);
                }
            }
        }
    }

    /// Enrich and qualify one page's cards, stopping as soon as the quota is met.
    async fn process_cards<R: CollectorReporter>(
        &self,
        site: &SiteConfig,
        cards: Vec<JobListing>,
        detail: &DetailFetcher,
        driver: &mut DF::Driver,
        progress: &mut SiteProgress,
        reporter: &R,
    ) {
        let quota = site.quota();
        for card in cards {
            let mut listing = match detail
                .enrich(card, driver, &self.config.detail_throttle, &self.config.retry)
                .await
            {
                Ok(listing) => listing,
                Err((listing, e)) => {
                    reporter.report(CollectorEvent::DetailFailed {
                        site: &site.name,
                        link: &listing.link,
                        error: &e.to_string(),
                    });
                    listing
                }
            };

            let verdict = self.qualifier.evaluate(&listing);
            if !verdict.is_accepted() {
                reporter.report(CollectorEvent::ListingRejected {
                    site: &site.name,
                    listing: &listing,
                    verdict: &verdict,
                });
                continue;
            }

            listing.qualified = true;
            reporter.report(CollectorEvent::ListingAccepted {
                site: &site.name,
                listing: &listing,
            });
            progress.accepted.push(listing);
            if progress.accepted.len() >= quota {
                break;
            }
        }
    }
}
