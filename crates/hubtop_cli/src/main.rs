//! Hubtop CLI - crawl ranked Docker Hub image listings.

mod config;
mod output;

use std::time::Duration;

use clap::Parser;
use console::Term;
use tracing_subscriber::EnvFilter;

use hubtop::{CrawlOptions, CrawlProgress};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "hubtop")]
#[command(version)]
#[command(about = "Crawl ranked Docker Hub image listings")]
#[command(
    long_about = "Hubtop walks the Docker Hub search pages for three sort orders (pulls, \
stars, recency) and prints the top images as fixed-width tables or JSON. \
Pages that yield no structured search payload fall back to scraping the \
rendered markup, so a run always finishes with whatever could be collected."
)]
#[command(after_long_help = r#"EXAMPLES
    Top 25 by pulls and stars plus the 10 most recently updated:
        $ hubtop

    Larger listings as JSON:
        $ hubtop --top 100 --latest 25 --out json

    Slow network? Give late-arriving payloads more time:
        $ hubtop --settle-ms 2000

CONFIGURATION
    Hubtop reads configuration from:
      1. ~/.config/hubtop/config.toml (or $XDG_CONFIG_HOME/hubtop/config.toml)
      2. ./hubtop.toml
      3. Environment variables (HUBTOP_* prefix, e.g., HUBTOP_CRAWL__TOP)
    CLI flags override all of the above.

ENVIRONMENT VARIABLES
    HUBTOP_CRAWL__TOP          Quota for the by-pulls and by-stars listings
    HUBTOP_CRAWL__LATEST       Quota for the most-recently-updated listing
    HUBTOP_CRAWL__SETTLE_MS    Settle delay after each page load
    HUBTOP_CRAWL__MAX_PAGES    Hard page ceiling per listing
"#)]
struct Cli {
    /// Quota for the by-pulls and by-stars listings (shared value)
    #[arg(short, long)]
    top: Option<usize>,

    /// Quota for the most-recently-updated listing
    #[arg(short, long)]
    latest: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    out: OutputFormat,

    /// Settle delay after each page load, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Hard page ceiling per listing
    #[arg(long)]
    max_pages: Option<u32>,

    /// User agent presented by the navigation driver
    #[arg(long)]
    user_agent: Option<String>,
}

impl Cli {
    /// Merge CLI flags over config file / environment values.
    fn crawl_options(&self, config: &config::Config) -> CrawlOptions {
        let defaults = CrawlOptions::default();
        CrawlOptions {
            top_quota: self.top.unwrap_or(config.crawl.top),
            latest_quota: self.latest.unwrap_or(config.crawl.latest),
            page_ceiling: self.max_pages.unwrap_or(config.crawl.max_pages),
            settle_delay: Duration::from_millis(self.settle_ms.unwrap_or(config.crawl.settle_ms)),
            user_agent: self
                .user_agent
                .clone()
                .or_else(|| config.crawl.user_agent.clone()),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logging only when not connected to a TTY
    let is_tty = Term::stdout().is_term();
    if !is_tty {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("hubtop=info,hubtop_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();
    let cli = Cli::parse();
    let options = cli.crawl_options(&config);

    let progress = move |event: CrawlProgress| match event {
        CrawlProgress::SortStarted { sort, quota } => {
            if is_tty {
                println!("Fetching up to {} images sorted by {}...", quota, sort.query_value());
            } else {
                tracing::info!(sort = sort.query_value(), quota, "listing started");
            }
        }
        CrawlProgress::PageLoaded {
            sort,
            page,
            batch,
            total,
        } => {
            tracing::debug!(
                sort = sort.query_value(),
                page,
                batch,
                total,
                "page loaded"
            );
        }
        CrawlProgress::MarkupFallback { sort, page } => {
            tracing::debug!(sort = sort.query_value(), page, "using markup fallback");
        }
        CrawlProgress::SortFinished { sort, total } => {
            if is_tty {
                println!("  collected {total} records");
            } else {
                tracing::info!(sort = sort.query_value(), total, "listing finished");
            }
        }
    };

    let report = hubtop::crawl_top_images(&options, Some(&progress)).await?;
    output::print_report(&report, cli.out)?;

    Ok(())
}
