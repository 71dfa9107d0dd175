pub mod collector;
pub mod config;
pub mod detail;
pub mod driver;
pub mod error;
pub mod extract;
pub mod listing;
pub mod pagination;
pub mod qualifier;
pub mod salary;
pub mod throttle;

#[cfg(test)]
pub(crate) mod testutil;

pub use collector::{
    CollectionReport, CollectorConfig, CollectorEvent, CollectorReporter, CollectorService,
    SiteOutcome, StopReason, TracingCollectorReporter,
};
pub use config::{QualificationPolicy, ScoutConfig, SiteConfig};
pub use driver::{DriverFactory, RenderedPage, RetryPolicy, SiteDriver};
pub use error::AppError;
pub use listing::{DetailField, JobListing};
pub use qualifier::{SkillQualifier, Verdict, qualify};
pub use salary::{Currency, Salary, parse_salary};
