//! Skill and salary qualification.
//!
//! Decision order for a listing:
//!
//! 1. Every required skill must appear in the listing text; the first missing
//!    one rejects immediately, regardless of optional matches.
//! 2. When the policy has required skills, satisfying them is enough. Optional
//!    skills only gate acceptance when no required skill is configured, and
//!    then at least one must appear. A policy with no skills passes everyone.
//! 3. A parsed salary below every applicable floor rejects. Listings without a
//!    parsed salary are never rejected for it.

use std::fmt;

use crate::config::{QualificationPolicy, SalaryFloor};
use crate::listing::JobListing;
use crate::salary::{Currency, Salary};

/// Why a listing was accepted or rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted,
    MissingRequiredSkill(String),
    NoOptionalSkill,
    SalaryBelowFloor { salary: Salary, floor: f64 },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "accepted"),
            Verdict::MissingRequiredSkill(skill) => write!(f, "missing required skill '{skill}'"),
            Verdict::NoOptionalSkill => write!(f, "no optional skill matched"),
            Verdict::SalaryBelowFloor { salary, floor } => match salary.currency {
                Some(currency) => write!(f, "salary {currency} {} below floor {floor}", salary.amount),
                None => write!(f, "salary {} below floor {floor}", salary.amount),
            },
        }
    }
}

/// A [`QualificationPolicy`] with skill names pre-lowercased for matching.
#[derive(Debug, Clone)]
pub struct SkillQualifier {
    required: Vec<String>,
    optional: Vec<String>,
    salary: SalaryFloor,
}

impl SkillQualifier {
    pub fn new(policy: &QualificationPolicy) -> Self {
        let (required, optional): (Vec<_>, Vec<_>) =
            policy.skills.iter().partition(|skill| skill.required);
        let lower = |skills: Vec<&crate::config::SkillRequirement>| {
            skills
                .into_iter()
                .map(|s| s.name.trim().to_lowercase())
                .collect::<Vec<_>>()
        };
        Self {
            required: lower(required),
            optional: lower(optional),
            salary: policy.salary.clone(),
        }
    }

    pub fn evaluate(&self, listing: &JobListing) -> Verdict {
        let haystack = listing.skill_haystack();

        if let Some(missing) = self.required.iter().find(|s| !haystack.contains(s.as_str())) {
            return Verdict::MissingRequiredSkill(missing.clone());
        }

        if self.required.is_empty()
            && !self.optional.is_empty()
            && !self.optional.iter().any(|s| haystack.contains(s.as_str()))
        {
            return Verdict::NoOptionalSkill;
        }

        if let Some(salary) = listing.parsed_salary() {
            if let Some(floor) = self.failed_floor(&salary) {
                return Verdict::SalaryBelowFloor { salary, floor };
            }
        }

        Verdict::Accepted
    }

    pub fn qualify(&self, listing: &JobListing) -> bool {
        self.evaluate(listing).is_accepted()
    }

    /// Returns the (highest) floor the salary falls short of, when it is below
    /// every applicable floor. A known currency is compared only with its own
    /// floor; an unknown currency with all configured floors.
    fn failed_floor(&self, salary: &Salary) -> Option<f64> {
        let applicable: Vec<f64> = match salary.currency {
            Some(Currency::Usd) => self.salary.usd.into_iter().collect(),
            Some(Currency::Brl) => self.salary.brl.into_iter().collect(),
            None => self.salary.usd.into_iter().chain(self.salary.brl).collect(),
        };
        if applicable.is_empty() || applicable.iter().any(|floor| salary.amount >= *floor) {
            return None;
        }
        applicable.into_iter().reduce(f64::max)
    }
}

/// One-shot qualification of `listing` against `policy`.
pub fn qualify(listing: &JobListing, policy: &QualificationPolicy) -> bool {
    SkillQualifier::new(policy).qualify(listing)
}
