//! Ticket Harvester main entry point
//!
//! This is the command-line interface for the unattended ticket-vendor
//! harvester.

use anyhow::Context;
use clap::Parser;
use std::convert::Infallible;
use std::path::PathBuf;
use ticket_harvester::config::{load_config_with_hash, Config};
use ticket_harvester::crawler::{
    open_configured_storage, run_harvest, CrawlSession, CrawlerRegistry, Fetcher,
};
use ticket_harvester::model::VendorId;
use ticket_harvester::refresh::{RefreshPolicy, Refresher};
use ticket_harvester::storage::Storage;
use tracing_subscriber::EnvFilter;

/// Ticket Harvester: an unattended ticket-vendor ingestion pipeline
///
/// Crawls vendor search pages for new events, stores their ticket tiers,
/// and periodically re-checks stored events for price, availability and
/// sold-out changes.
#[derive(Parser, Debug)]
#[command(name = "ticket-harvester")]
#[command(version = "1.0.0")]
#[command(about = "An unattended ticket-vendor harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run only this vendor's crawl loop
    #[arg(long, value_name = "ID", conflicts_with_all = ["refresh_once", "dry_run"])]
    vendor: Option<VendorId>,

    /// Run a single refresh cycle and exit
    #[arg(long, conflicts_with_all = ["vendor", "dry_run"])]
    refresh_once: bool,

    /// Validate config and show what would run without fetching anything
    #[arg(long, conflicts_with_all = ["vendor", "refresh_once"])]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    if cli.refresh_once {
        return handle_refresh_once(&config).await;
    }

    let run = async {
        match cli.vendor {
            Some(vendor_id) => handle_vendor_crawl(&config, vendor_id).await,
            None => handle_harvest(config.clone()).await,
        }
    };

    tokio::select! {
        result = run => match result? {},
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ticket_harvester=info,warn"),
            1 => EnvFilter::new("ticket_harvester=debug,info"),
            2 => EnvFilter::new("ticket_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config) {
    println!("=== Ticket Harvester Dry Run ===\n");

    println!("Fetch:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.fetch.timeout_secs, config.fetch.connect_timeout_secs
    );
    match config.fetch.max_attempts {
        Some(max) => println!(
            "  Retry: {} attempts, {}s apart",
            max, config.fetch.retry_delay_secs
        ),
        None => println!(
            "  Retry: forever, {}s apart",
            config.fetch.retry_delay_secs
        ),
    }

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!(
        "  Events due for refresh after: {} minutes",
        config.storage.refresh_due_after_minutes
    );

    println!("\nSchedule:");
    println!(
        "  Refresh every {} minutes",
        config.schedule.refresh_interval_minutes
    );
    println!(
        "  Crawl vendors {:?} every {} minutes",
        config.schedule.crawl_vendors, config.schedule.crawl_interval_minutes
    );

    println!("\nRefresh:");
    println!("  Invalid events: {:?}", config.refresh.invalid_policy);
    println!(
        "  No sold-out demotion for vendors: {:?}",
        config.refresh.skip_sold_out_demotion
    );

    println!("\nSearch Listings ({}):", config.search_listings.len());
    for entry in &config.search_listings {
        println!(
            "  - vendor {} / type {}{}: {}",
            entry.vendor_id,
            entry.event_type_id,
            if entry.paginated { " (paginated)" } else { "" },
            entry.search_url
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --refresh-once mode
async fn handle_refresh_once(config: &Config) -> anyhow::Result<()> {
    let registry = CrawlerRegistry::with_default_vendors();
    let fetcher = Fetcher::new(&config.fetch)?;
    let mut storage = open_configured_storage(config)?;
    let policy = RefreshPolicy::from_config(&config.refresh);

    let summary = Refresher::new(&registry, &fetcher, &mut storage, &policy)
        .run_cycle()
        .await
        .context("refresh cycle failed")?;

    println!("Refresh complete: {}", summary);
    Ok(())
}

/// Handles the --vendor mode: one vendor's crawl loop, forever
async fn handle_vendor_crawl(config: &Config, vendor_id: VendorId) -> anyhow::Result<Infallible> {
    let registry = CrawlerRegistry::with_default_vendors();
    let crawler = registry.require(vendor_id)?;
    let fetcher = Fetcher::new(&config.fetch)?;
    let mut storage = open_configured_storage(config)?;

    let listings = storage.get_search_urls(vendor_id)?;
    tracing::info!(
        "Crawling {} with {} search listings",
        crawler.vendor_name(),
        listings.len()
    );

    let mut session = CrawlSession::new(crawler, &fetcher, &mut storage);
    let never = session
        .run(config.schedule.crawl_interval())
        .await
        .with_context(|| format!("{} crawl failed", crawler.vendor_name()))?;
    match never {}
}

/// Handles the default mode: the work coordinator, forever
async fn handle_harvest(config: Config) -> anyhow::Result<Infallible> {
    tracing::info!(
        "Refresh every {} minutes, crawl vendors {:?} every {} minutes",
        config.schedule.refresh_interval_minutes,
        config.schedule.crawl_vendors,
        config.schedule.crawl_interval_minutes
    );

    Ok(run_harvest(config).await?)
}
