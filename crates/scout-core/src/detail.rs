use scraper::{Html, Selector};

use crate::config::{DetailSelectors, parse_selector};
use crate::driver::{RetryPolicy, SiteDriver, open_with_retry};
use crate::error::AppError;
use crate::extract::element_text;
use crate::listing::{DetailField, JobListing};
use crate::throttle::Throttle;

/// Enriches listings with fields from their detail pages.
///
/// Failure never drops a listing: on navigation errors or blank pages the
/// listing comes back unchanged.
#[derive(Debug)]
pub struct DetailFetcher {
    selectors: Vec<(DetailField, Selector)>,
}

impl DetailFetcher {
    pub fn new(detail_fields: &DetailSelectors) -> Result<Self, AppError> {
        let selectors = detail_fields
            .iter()
            .map(|(field, css)| {
                parse_selector(&format!("detail_fields.{}", field.key()), css).map(|s| (field, s))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }

    /// True when no detail selector is configured, so no request is needed.
    pub fn is_noop(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Pause, open the listing's detail page and merge the configured fields.
    pub async fn enrich<D: SiteDriver>(
        &self,
        listing: JobListing,
        driver: &mut D,
        throttle: &Throttle,
        retry: &RetryPolicy,
    ) -> Result<JobListing, (JobListing, AppError)> {
        if self.is_noop() {
            return Ok(listing);
        }

        throttle.pause().await;
        match open_with_retry(driver, &listing.link, retry).await {
            Ok(page) if page.is_blank() => {
                let err = AppError::ExtractionError(format!("{} returned an empty document", listing.link));
                Err((listing, err))
            }
            Ok(page) => Ok(self.apply(listing, page.rendered_html())),
            Err(e) => Err((listing, e)),
        }
    }

    /// Merge detail values from `html` into `listing`. Fields whose selector
    /// matches nothing keep their current (card-level or `None`) value.
    pub fn apply(&self, mut listing: JobListing, html: &str) -> JobListing {
        let document = Html::parse_document(html);
        for (field, selector) in &self.selectors {
            let value = document.select(selector).find_map(element_text);
            match value {
                Some(text) => listing.set_detail(*field, Some(text)),
                None => {
                    tracing::debug!(link = %listing.link, field = %field, "Detail selector matched nothing");
                }
            }
        }
        listing
    }
}
