//! Declarative run configuration: qualification policy and per-site scraping rules.
//!
//! The configuration arrives already parsed (JSON via serde). [`ScoutConfig::validate`]
//! rejects malformed entries up front so the collection loop only ever sees
//! compilable selectors and absolute URLs.

use std::collections::BTreeMap;
use std::path::Path;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;
use crate::listing::DetailField;
use crate::pagination::GLOBAL_SAFETY_CEILING;

/// Placeholder substituted with the page number in `url_pattern` pagination.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// A skill the policy looks for in a listing's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SkillEntry")]
pub struct SkillRequirement {
    pub name: String,
    pub required: bool,
}

impl SkillRequirement {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// Accepted on-disk shapes for a skill: a bare string (legacy, optional)
/// or an explicit `{name, required}` object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SkillEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        required: bool,
    },
}

impl From<SkillEntry> for SkillRequirement {
    fn from(entry: SkillEntry) -> Self {
        match entry {
            SkillEntry::Name(name) => SkillRequirement::optional(name),
            SkillEntry::Detailed { name, required } => SkillRequirement { name, required },
        }
    }
}

/// Minimum acceptable salary per currency. Either floor may be unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryFloor {
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub brl: Option<f64>,
}

/// Skill list plus salary floor that every listing is qualified against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualificationPolicy {
    #[serde(default)]
    pub skills: Vec<SkillRequirement>,
    #[serde(default)]
    pub salary: SalaryFloor,
}

impl QualificationPolicy {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(skill) = self.skills.iter().find(|s| s.name.trim().is_empty()) {
            return Err(AppError::ConfigError(format!(
                "policy: skill names must not be empty (required={})",
                skill.required
            )));
        }
        for (currency, floor) in [("usd", self.salary.usd), ("brl", self.salary.brl)] {
            if let Some(value) = floor {
                if !value.is_finite() || value < 0.0 {
                    return Err(AppError::ConfigError(format!(
                        "policy: salary.{currency} must be a non-negative number, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Card-level field selectors, applied relative to each listing card.
///
/// `title`, `company` and `link` are the core fields. Any other key is kept:
/// detail-field names (`description`, `salary`, ...) fill that field straight
/// from the card, everything else lands in the listing's `extra` map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelectors {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub link: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Selectors applied to a listing's detail page. Absent keys are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailSelectors {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub skills: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
}

impl DetailSelectors {
    /// Configured (non-empty) selectors paired with the field they fill.
    pub fn iter(&self) -> impl Iterator<Item = (DetailField, &str)> {
        [
            (DetailField::Description, &self.description),
            (DetailField::Salary, &self.salary),
            (DetailField::Skills, &self.skills),
            (DetailField::Requirements, &self.requirements),
            (DetailField::Benefits, &self.benefits),
        ]
        .into_iter()
        .filter_map(|(field, css)| {
            css.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| (field, s))
        })
    }
}

/// How a site's result set continues past the first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationConfig {
    /// Follow the `href` of a "next" control until it disappears.
    NextButton {
        next_selector: String,
        #[serde(default)]
        max_pages: Option<u32>,
    },
    /// Visit every page link found on the first page, in document order.
    NumberedLinks {
        links_selector: String,
        #[serde(default)]
        max_pages: Option<u32>,
    },
    /// Substitute the page counter into a URL template.
    UrlPattern {
        url_pattern: String,
        #[serde(default)]
        max_pages: Option<u32>,
    },
}

impl PaginationConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            PaginationConfig::NextButton { .. } => "next_button",
            PaginationConfig::NumberedLinks { .. } => "numbered_links",
            PaginationConfig::UrlPattern { .. } => "url_pattern",
        }
    }

    pub fn max_pages(&self) -> Option<u32> {
        match self {
            PaginationConfig::NextButton { max_pages, .. }
            | PaginationConfig::NumberedLinks { max_pages, .. }
            | PaginationConfig::UrlPattern { max_pages, .. } => *max_pages,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_pages() == Some(0) {
            return Err(format!("pagination.max_pages must be at least 1 ({})", self.kind()));
        }
        match self {
            PaginationConfig::NextButton { next_selector, .. } => {
                require_selector("pagination.next_selector", next_selector)
            }
            PaginationConfig::NumberedLinks { links_selector, .. } => {
                require_selector("pagination.links_selector", links_selector)
            }
            PaginationConfig::UrlPattern { url_pattern, .. } => {
                if !url_pattern.contains(PAGE_PLACEHOLDER) {
                    return Err(format!(
                        "pagination.url_pattern must contain {}: {url_pattern}",
                        PAGE_PLACEHOLDER
                    ));
                }
                parse_http_url(&url_pattern.replace(PAGE_PLACEHOLDER, "2"))
                    .map(|_| ())
                    .map_err(|e| format!("pagination.url_pattern: {e}"))
            }
        }
    }
}

/// Scraping rules for one target site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
    pub job_selector: String,
    #[serde(default)]
    pub max_jobs: Option<usize>,
    pub fields: FieldSelectors,
    #[serde(default)]
    pub detail_fields: DetailSelectors,
    /// Absent means the listing URL is the only page.
    #[serde(default)]
    pub pagination: Option<PaginationConfig>,
}

impl SiteConfig {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        job_selector: impl Into<String>,
        fields: FieldSelectors,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            job_selector: job_selector.into(),
            max_jobs: None,
            fields,
            detail_fields: DetailSelectors::default(),
            pagination: None,
        }
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = Some(max_jobs);
        self
    }

    pub fn with_detail_fields(mut self, detail_fields: DetailSelectors) -> Self {
        self.detail_fields = detail_fields;
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Accepted-listing quota; unbounded when `max_jobs` is unset.
    pub fn quota(&self) -> usize {
        self.max_jobs.unwrap_or(usize::MAX)
    }

    /// Effective page limit: the per-site `max_pages` override, never above the
    /// global safety ceiling.
    pub fn page_ceiling(&self) -> u32 {
        self.pagination
            .as_ref()
            .and_then(PaginationConfig::max_pages)
            .map_or(GLOBAL_SAFETY_CEILING, |max| max.min(GLOBAL_SAFETY_CEILING))
            .max(1)
    }

    pub fn has_link_selector(&self) -> bool {
        !self.fields.link.trim().is_empty()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.check().map_err(|e| {
            let name = if self.name.is_empty() {
                "<unnamed>"
            } else {
                self.name.as_str()
            };
            AppError::ConfigError(format!("site '{name}': {e}"))
        })
    }

    fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        parse_http_url(&self.url).map_err(|e| format!("url: {e}"))?;
        require_selector("job_selector", &self.job_selector)?;
        if self.max_jobs == Some(0) {
            return Err("max_jobs must be at least 1".into());
        }

        optional_selector("fields.title", &self.fields.title)?;
        optional_selector("fields.company", &self.fields.company)?;
        optional_selector("fields.link", &self.fields.link)?;
        for (key, css) in &self.fields.extra {
            optional_selector(&format!("fields.{key}"), css)?;
        }
        for (field, css) in self.detail_fields.iter() {
            optional_selector(&format!("detail_fields.{}", field.key()), css)?;
        }
        if let Some(pagination) = &self.pagination {
            pagination.validate()?;
        }

        if !self.has_link_selector() {
            tracing::warn!(site = %self.name, "No link selector configured; site will be skipped as misconfigured");
        }
        Ok(())
    }
}

/// Top-level configuration handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoutConfig {
    #[serde(default)]
    pub policy: QualificationPolicy,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

impl ScoutConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let config: ScoutConfig = serde_json::from_str(json)
            .map_err(|e| AppError::ConfigError(format!("Invalid configuration JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.policy.validate()?;
        for site in &self.sites {
            site.validate()?;
        }
        Ok(())
    }

    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name == name)
    }
}

/// Compile a CSS selector, naming the config key in the error.
pub fn parse_selector(key: &str, css: &str) -> Result<Selector, AppError> {
    Selector::parse(css)
        .map_err(|e| AppError::ConfigError(format!("Invalid selector for {key} ({css:?}): {e}")))
}

fn require_selector(key: &str, css: &str) -> Result<(), String> {
    if css.trim().is_empty() {
        return Err(format!("{key} must not be empty"));
    }
    optional_selector(key, css)
}

fn optional_selector(key: &str, css: &str) -> Result<(), String> {
    if css.trim().is_empty() {
        return Ok(());
    }
    Selector::parse(css)
        .map(|_| ())
        .map_err(|e| format!("invalid selector for {key} ({css:?}): {e}"))
}

fn parse_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid URL {raw:?}: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(format!("URL scheme '{scheme}' is not allowed (only http/https)")),
    }
}
