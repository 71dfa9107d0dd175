use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use scout_client::HttpDriverFactory;
use scout_core::detail::DetailFetcher;
use scout_core::driver::{DriverFactory, SiteDriver, open_with_retry};
use scout_core::extract::ListingExtractor;
use scout_core::pagination::Paginator;
use scout_core::{
    CollectionReport, CollectorConfig, CollectorService, JobListing, RetryPolicy, ScoutConfig,
    SiteConfig, TracingCollectorReporter,
};

#[derive(Parser)]
#[command(name = "scout", version, about = "Multi-site job collector and qualifier")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect qualified listings from every configured site
    Collect {
        /// Path to the JSON configuration (policy + sites)
        #[arg(short, long, env = "SCOUT_CONFIG")]
        config: PathBuf,

        /// Render pages with headless Chromium (requires the `browser` feature)
        #[arg(long, default_value_t = false)]
        browser: bool,

        /// Output format written to stdout (or --output)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Write results to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Per-request navigation timeout in seconds
        #[arg(long, env = "SCOUT_TIMEOUT_SECS", default_value_t = 30)]
        timeout_secs: u64,

        /// Delay between listing pages in milliseconds
        #[arg(long, env = "SCOUT_PAGE_DELAY_MS", default_value_t = 1000)]
        page_delay_ms: u64,

        /// Delay before each detail page in milliseconds
        #[arg(long, env = "SCOUT_DETAIL_DELAY_MS", default_value_t = 500)]
        detail_delay_ms: u64,

        /// Attempts per page load (1 disables retries)
        #[arg(long, env = "SCOUT_RETRIES", default_value_t = 2)]
        retries: u32,

        /// Random extra wait added to every delay, in milliseconds
        #[arg(long, env = "SCOUT_JITTER_MS", default_value_t = 0)]
        jitter_ms: u64,

        /// User-Agent header sent by the HTTP driver
        #[arg(long, env = "SCOUT_USER_AGENT")]
        user_agent: Option<String>,
    },

    /// Show the raw cards on a site's first page, without detail pages or qualification
    Preview {
        #[arg(short, long, env = "SCOUT_CONFIG")]
        config: PathBuf,

        /// Site name as it appears in the configuration
        #[arg(short, long)]
        site: String,

        #[arg(long, default_value_t = false)]
        browser: bool,

        #[arg(long, env = "SCOUT_TIMEOUT_SECS", default_value_t = 30)]
        timeout_secs: u64,

        #[arg(long, env = "SCOUT_USER_AGENT")]
        user_agent: Option<String>,
    },

    /// Check a configuration file and compile every selector
    Validate {
        #[arg(short, long, env = "SCOUT_CONFIG")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Collect {
            config,
            browser,
            format,
            output,
            timeout_secs,
            page_delay_ms,
            detail_delay_ms,
            retries,
            jitter_ms,
            user_agent,
        } => {
            let scout = load_config(&config)?;
            let collector_config = CollectorConfig::default()
                .with_page_delay(Duration::from_millis(page_delay_ms))
                .with_detail_delay(Duration::from_millis(detail_delay_ms))
                .with_retry(RetryPolicy::new(retries, Duration::from_secs(2)))
                .with_jitter(Duration::from_millis(jitter_ms));
            let timeout = Duration::from_secs(timeout_secs);

            let cancel = CancellationToken::new();
            spawn_ctrl_c(cancel.clone());

            let report = if browser {
                collect(browser_factory(timeout)?, &scout, collector_config, &cancel).await
            } else {
                collect(http_factory(timeout, user_agent), &scout, collector_config, &cancel).await
            };

            log_summary(&report);
            let listings = report.into_listings();
            write_listings(&listings, format, output.as_deref())?;
        }
        Commands::Preview {
            config,
            site,
            browser,
            timeout_secs,
            user_agent,
        } => {
            let scout = load_config(&config)?;
            let site = scout
                .site(&site)
                .with_context(|| format!("No site named '{site}' in {}", config.display()))?;
            let timeout = Duration::from_secs(timeout_secs);

            let cards = if browser {
                preview(browser_factory(timeout)?, site).await?
            } else {
                preview(http_factory(timeout, user_agent), site).await?
            };
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        Commands::Validate { config } => {
            cmd_validate(&config)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ScoutConfig> {
    ScoutConfig::from_path(path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}

fn http_factory(timeout: Duration, user_agent: Option<String>) -> HttpDriverFactory {
    let factory = HttpDriverFactory::with_timeout(timeout);
    match user_agent {
        Some(user_agent) => factory.with_user_agent(user_agent),
        None => factory,
    }
}

#[cfg(feature = "browser")]
fn browser_factory(timeout: Duration) -> Result<scout_client::BrowserDriverFactory> {
    Ok(scout_client::BrowserDriverFactory::with_timeout(timeout))
}

#[cfg(not(feature = "browser"))]
fn browser_factory(_timeout: Duration) -> Result<HttpDriverFactory> {
    anyhow::bail!("--browser requires scout to be built with the `browser` feature")
}

/// Cancel the run cooperatively on the first Ctrl-C.
fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current page");
            cancel.cancel();
        }
    });
}

async fn collect<DF: DriverFactory>(
    factory: DF,
    scout: &ScoutConfig,
    config: CollectorConfig,
    cancel: &CancellationToken,
) -> CollectionReport {
    let service = CollectorService::new(factory, &scout.policy, config);
    service
        .run(&scout.sites, cancel, &TracingCollectorReporter)
        .await
}

/// First-page cards only: no detail pages, no qualification.
async fn preview<DF: DriverFactory>(factory: DF, site: &SiteConfig) -> Result<Vec<JobListing>> {
    let extractor = ListingExtractor::new(site)?;
    let mut driver = factory
        .launch(site)
        .await
        .with_context(|| format!("Failed to start a session for '{}'", site.name))?;

    let page = open_with_retry(&mut driver, &site.url, &RetryPolicy::default()).await;
    driver.close().await;
    let page = page.with_context(|| format!("Failed to load {}", site.url))?;

    let cards = extractor.extract(&page)?;
    tracing::info!(site = %site.name, cards = cards.len(), "Preview extracted");
    Ok(cards)
}

fn cmd_validate(path: &Path) -> Result<()> {
    let scout = load_config(path)?;

    for site in &scout.sites {
        ListingExtractor::new(site).with_context(|| format!("site '{}'", site.name))?;
        DetailFetcher::new(&site.detail_fields).with_context(|| format!("site '{}'", site.name))?;
        Paginator::new(site).with_context(|| format!("site '{}'", site.name))?;

        let pagination = site.pagination.as_ref().map_or("single page", |p| p.kind());
        let quota = site
            .max_jobs
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
        println!(
            "  [ok] {} ({pagination}, up to {} pages, quota {quota})",
            site.name,
            site.page_ceiling()
        );
    }

    let required = scout.policy.skills.iter().filter(|s| s.required).count();
    println!(
        "\n{} sites, {} skills ({} required)",
        scout.sites.len(),
        scout.policy.skills.len(),
        required
    );
    Ok(())
}

fn log_summary(report: &CollectionReport) {
    for outcome in &report.sites {
        match &outcome.error {
            Some(error) => tracing::warn!(
                site = %outcome.site,
                stop = %outcome.stop,
                %error,
                "Site produced no listings"
            ),
            None => tracing::info!(
                site = %outcome.site,
                accepted = outcome.listings.len(),
                pages = outcome.pages_visited,
                stop = %outcome.stop,
                "Site summary"
            ),
        }
    }
    tracing::info!(total = report.total_accepted(), "Collection complete");
}

/// Flat CSV row; `extra` fields are folded into one JSON column.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    site: &'a str,
    title: Option<&'a str>,
    company: Option<&'a str>,
    link: &'a str,
    description: Option<&'a str>,
    salary: Option<&'a str>,
    skills: Option<&'a str>,
    requirements: Option<&'a str>,
    benefits: Option<&'a str>,
    extra: String,
    scraped_at: String,
}

impl<'a> CsvRow<'a> {
    fn from_listing(listing: &'a JobListing) -> Result<Self> {
        let extra = if listing.extra.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&listing.extra)?
        };
        Ok(Self {
            site: &listing.site,
            title: listing.title.as_deref(),
            company: listing.company.as_deref(),
            link: &listing.link,
            description: listing.description.as_deref(),
            salary: listing.salary.as_deref(),
            skills: listing.skills.as_deref(),
            requirements: listing.requirements.as_deref(),
            benefits: listing.benefits.as_deref(),
            extra,
            scraped_at: listing.scraped_at.to_rfc3339(),
        })
    }
}

fn write_listings(listings: &[JobListing], format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    render(listings, format, writer)?;
    if let Some(path) = output {
        tracing::info!(count = listings.len(), path = %path.display(), "Results written");
    }
    Ok(())
}

fn render<W: Write>(listings: &[JobListing], format: OutputFormat, mut writer: W) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, listings)?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => {
            let mut csv = csv::Writer::from_writer(writer);
            for listing in listings {
                csv.serialize(CsvRow::from_listing(listing)?)?;
            }
            csv.flush()?;
        }
    }
    Ok(())
}
