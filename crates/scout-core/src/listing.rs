use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::salary::{Salary, parse_salary};

/// Extended fields filled from a listing's detail page (or from the card).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailField {
    Description,
    Salary,
    Skills,
    Requirements,
    Benefits,
}

impl DetailField {
    pub const ALL: [DetailField; 5] = [
        DetailField::Description,
        DetailField::Salary,
        DetailField::Skills,
        DetailField::Requirements,
        DetailField::Benefits,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DetailField::Description => "description",
            DetailField::Salary => "salary",
            DetailField::Skills => "skills",
            DetailField::Requirements => "requirements",
            DetailField::Benefits => "benefits",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for DetailField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A job posting as it moves through extraction, enrichment and qualification.
///
/// Unmatched selectors leave their field `None`; only `link` is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    /// Name of the site this listing was collected from.
    pub site: String,
    pub title: Option<String>,
    pub company: Option<String>,
    /// Absolute detail-page URL.
    pub link: String,
    pub description: Option<String>,
    pub salary: Option<String>,
    pub skills: Option<String>,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    /// Extra card-level fields configured for the site.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    /// Set once the listing passes the qualification policy.
    #[serde(default)]
    pub qualified: bool,
    pub scraped_at: DateTime<Utc>,
}

impl JobListing {
    pub fn new(site: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            title: None,
            company: None,
            link: link.into(),
            description: None,
            salary: None,
            skills: None,
            requirements: None,
            benefits: None,
            extra: BTreeMap::new(),
            qualified: false,
            scraped_at: Utc::now(),
        }
    }

    pub fn detail(&self, field: DetailField) -> Option<&str> {
        match field {
            DetailField::Description => self.description.as_deref(),
            DetailField::Salary => self.salary.as_deref(),
            DetailField::Skills => self.skills.as_deref(),
            DetailField::Requirements => self.requirements.as_deref(),
            DetailField::Benefits => self.benefits.as_deref(),
        }
    }

    pub fn set_detail(&mut self, field: DetailField, value: Option<String>) {
        let slot = match field {
            DetailField::Description => &mut self.description,
            DetailField::Salary => &mut self.salary,
            DetailField::Skills => &mut self.skills,
            DetailField::Requirements => &mut self.requirements,
            DetailField::Benefits => &mut self.benefits,
        };
        *slot = value;
    }

    /// Lowercased text searched for skills: skills, description and requirements.
    pub fn skill_haystack(&self) -> String {
        [&self.skills, &self.description, &self.requirements]
            .into_iter()
            .flatten()
            .map(|s| s.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn parsed_salary(&self) -> Option<Salary> {
        self.salary.as_deref().and_then(parse_salary)
    }

    /// Short label for log lines.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.link)
    }
}
