use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::{SiteConfig, parse_selector};
use crate::driver::RenderedPage;
use crate::error::AppError;
use crate::listing::{DetailField, JobListing};
use crate::pagination::{document_base, resolve_href};

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

/// Where a card-level selector's value goes.
#[derive(Debug, Clone)]
enum CardField {
    Detail(DetailField),
    Extra(String),
}

/// Turns a rendered listing page into raw [`JobListing`]s using a site's
/// card and field selectors. Selectors are compiled once per site.
#[derive(Debug)]
pub struct ListingExtractor {
    site: String,
    card: Selector,
    title: Option<Selector>,
    company: Option<Selector>,
    link: Option<Selector>,
    card_fields: Vec<(CardField, Selector)>,
}

impl ListingExtractor {
    pub fn new(site: &SiteConfig) -> Result<Self, AppError> {
        let optional = |key: &str, css: &str| -> Result<Option<Selector>, AppError> {
            if css.trim().is_empty() {
                Ok(None)
            } else {
                parse_selector(key, css).map(Some)
            }
        };

        let mut card_fields = Vec::with_capacity(site.fields.extra.len());
        for (key, css) in &site.fields.extra {
            let Some(selector) = optional(&format!("fields.{key}"), css)? else {
                continue;
            };
            let target = match DetailField::from_key(key) {
                Some(field) => CardField::Detail(field),
                None => CardField::Extra(key.clone()),
            };
            card_fields.push((target, selector));
        }

        Ok(Self {
            site: site.name.clone(),
            card: parse_selector("job_selector", &site.job_selector)?,
            title: optional("fields.title", &site.fields.title)?,
            company: optional("fields.company", &site.fields.company)?,
            link: optional("fields.link", &site.fields.link)?,
            card_fields,
        })
    }

    /// Extract listings from a fetched page, resolving links against its URL.
    pub fn extract(&self, page: &RenderedPage) -> Result<Vec<JobListing>, AppError> {
        self.extract_html(page.rendered_html(), page.url())
    }

    /// Extract listings in DOM order. Cards without a resolvable link are
    /// dropped; other unmatched fields are left empty.
    pub fn extract_html(&self, html: &str, base_url: &Url) -> Result<Vec<JobListing>, AppError> {
        if html.trim().is_empty() {
            return Err(AppError::ExtractionError(format!(
                "{} returned an empty document",
                base_url
            )));
        }
        let Some(link_selector) = &self.link else {
            tracing::warn!(site = %self.site, "No link selector configured; skipping page");
            return Ok(Vec::new());
        };

        let document = Html::parse_document(html);
        let base_url = &document_base(&document, base_url);
        let mut listings = Vec::new();
        let mut dropped = 0usize;

        for card in document.select(&self.card) {
            let Some(link) = link_target(card, link_selector, base_url) else {
                dropped += 1;
                continue;
            };

            let mut listing = JobListing::new(&self.site, link);
            listing.title = self.field_text(card, self.title.as_ref(), "title");
            listing.company = self.field_text(card, self.company.as_ref(), "company");

            for (target, selector) in &self.card_fields {
                match target {
                    CardField::Detail(field) => {
                        let value = self.field_text(card, Some(selector), field.key());
                        listing.set_detail(*field, value);
                    }
                    CardField::Extra(key) => {
                        if let Some(value) = self.field_text(card, Some(selector), key) {
                            listing.extra.insert(key.clone(), value);
                        }
                    }
                }
            }

            listings.push(listing);
        }

        if dropped > 0 {
            tracing::debug!(site = %self.site, dropped, "Dropped cards without a resolvable link");
        }
        Ok(listings)
    }

    fn field_text(&self, card: ElementRef<'_>, selector: Option<&Selector>, key: &str) -> Option<String> {
        let value = selector
            .and_then(|sel| card.select(sel).next())
            .and_then(element_text);
        if value.is_none() {
            tracing::debug!(site = %self.site, field = key, "Selector matched nothing");
        }
        value
    }
}

/// Whitespace-normalised text content, `None` when blank.
pub(crate) fn element_text(el: ElementRef<'_>) -> Option<String> {
    let text = el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// The card's detail URL: the matched element's `href`, a descendant anchor's
/// `href`, or the element text, resolved against the document base.
fn link_target(card: ElementRef<'_>, selector: &Selector, base_url: &Url) -> Option<String> {
    let el = card.select(selector).next()?;
    let raw = el
        .value()
        .attr("href")
        .map(str::to_owned)
        .or_else(|| {
            el.select(&ANCHOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_owned)
        })
        .or_else(|| element_text(el))?;
    resolve_href(base_url, &raw).map(String::from)
}
