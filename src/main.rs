//! Pagesweep main entry point
//!
//! This is the command-line host for the Pagesweep page harvester.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pagesweep::config::{
    load_config_with_hash, ConfigSource, CrawlConfig, FileConfigSource, MemoryConfigStore,
    PaginationSpec, SelectorSink,
};
use pagesweep::crawler::Orchestrator;
use pagesweep::messaging::{spawn_control_server, spawn_picker_bridge, ControlChannel};
use pagesweep::output::{print_summary, report_to_json, write_report_json};
use pagesweep::target::{build_http_client, DocumentPage, TargetHandle, TargetProvider, TargetRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Pagesweep: a paginated page harvester
///
/// Pagesweep opens a page, walks through its pagination (none, infinite
/// scroll or a "next" control) and extracts one record per matched element
/// on every page it reaches.
#[derive(Parser, Debug)]
#[command(name = "pagesweep")]
#[command(version = "1.0.0")]
#[command(about = "A paginated page harvester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a page using a crawl config
    Crawl {
        /// Path to the crawl config (.json or .toml)
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// URL of the page to crawl
        #[arg(value_name = "URL")]
        url: String,

        /// Write the JSON report here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Seconds to wait for the next page after a click
        #[arg(long, value_name = "SECS", default_value_t = 10)]
        load_timeout: u64,
    },

    /// Validate a crawl config and describe it
    Validate {
        /// Path to the crawl config (.json or .toml)
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Pick the next-page control of a page
    Pick {
        /// URL of the page
        #[arg(value_name = "URL")]
        url: String,

        /// CSS query for the element to pick
        #[arg(long)]
        query: String,

        /// Store the picked selector in this crawl config
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Crawl {
            config,
            url,
            output,
            load_timeout,
        } => handle_crawl(config, &url, output, Duration::from_secs(load_timeout)).await,
        Command::Validate { config } => handle_validate(config),
        Command::Pick { url, query, config } => handle_pick(&url, &query, config).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagesweep=info,warn"),
            1 => EnvFilter::new("pagesweep=debug,info"),
            2 => EnvFilter::new("pagesweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Opens `url` as a document target and makes it the active one
async fn open_target(
    registry: &TargetRegistry,
    url: &str,
) -> anyhow::Result<(TargetHandle, DocumentPage)> {
    let url = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    let client = build_http_client().context("Failed to build HTTP client")?;

    let context = registry.new_context();
    let page = DocumentPage::open(context.clone(), client, url.clone())
        .await
        .with_context(|| format!("Failed to open {}", url))?;
    let handle = registry.attach(context, page.clone());

    Ok((handle, page))
}

/// Spawns the control server for a config store
fn start_control<S>(
    store: Arc<S>,
    registry: Arc<TargetRegistry>,
    load_timeout: Duration,
    cancel: &CancellationToken,
) -> ControlChannel
where
    S: ConfigSource + SelectorSink + 'static,
{
    let orchestrator = Orchestrator::new(store.clone(), registry as Arc<dyn TargetProvider>)
        .with_load_timeout(load_timeout);
    let (control, _task) = spawn_control_server(Arc::new(orchestrator), store, cancel.clone());
    control
}

/// Handles the crawl command: opens the page, runs a crawl and writes the report
async fn handle_crawl(
    config: PathBuf,
    url: &str,
    output: Option<PathBuf>,
    load_timeout: Duration,
) -> anyhow::Result<()> {
    tracing::info!("Using configuration from: {}", config.display());
    let store = Arc::new(FileConfigSource::new(config));
    let registry = Arc::new(TargetRegistry::new());
    let cancel = CancellationToken::new();

    let (target, _page) = open_target(&registry, url).await?;
    let control = start_control(store, registry.clone(), load_timeout, &cancel);

    let result = control.start_crawl().await;
    registry.close(target.id());
    cancel.cancel();
    let report = result?;

    match &output {
        Some(path) => {
            write_report_json(&report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
            print_summary(&report);
        }
        None => println!("{}", report_to_json(&report)?),
    }

    if let Some(e) = report.error() {
        bail!("Crawl failed after {} pages: {}", report.pages_scraped, e);
    }

    Ok(())
}

/// Handles the validate command: loads the config and shows what would be crawled
fn handle_validate(config: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Loading configuration from: {}", config.display());
    let (crawl_config, hash) = match load_config_with_hash(&config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    println!("=== Pagesweep Config ===\n");
    println!("  File: {}", config.display());
    println!("  Hash: {}", hash);
    describe_config(&crawl_config);

    if crawl_config.selected_template().is_none() {
        println!("\nWarning: no template is selected; a crawl would not start");
    }

    Ok(())
}

fn describe_config(config: &CrawlConfig) {
    println!("\nPagination:");
    match &config.pagination {
        PaginationSpec::None => println!("  Type: none (single page)"),
        PaginationSpec::ScrollDown {
            scroll_count,
            scroll_interval,
        } => {
            println!("  Type: scroll_down");
            println!("  Scroll count: {}", scroll_count);
            println!("  Scroll interval: {}ms", scroll_interval);
        }
        PaginationSpec::Click { next_page_selector } => {
            println!("  Type: click");
            println!("  Next page selector: {}", next_page_selector);
        }
    }

    println!("\nTemplates ({}):", config.templates.len());
    for (index, template) in config.templates.iter().enumerate() {
        let name = template.name.as_deref().unwrap_or("<unnamed>");
        let marker = if template.selected { " [selected]" } else { "" };
        println!(
            "  {}. {}{} ({} fields)",
            index + 1,
            name,
            marker,
            template.fields.len()
        );
        for field in &template.fields {
            println!("    - {}: {}", field.name, field.selector);
        }
    }
}

/// Handles the pick command: picks an element and stores it as the next-page control
async fn handle_pick(url: &str, query: &str, config: Option<PathBuf>) -> anyhow::Result<()> {
    match config {
        Some(path) => {
            let store = Arc::new(FileConfigSource::new(path));
            run_pick(url, query, store.clone()).await?;
            if let Some(loaded) = store.load()? {
                describe_config(&loaded.config);
            }
        }
        None => {
            let store = Arc::new(MemoryConfigStore::default());
            run_pick(url, query, store.clone()).await?;
            if let Some(config) = store.get() {
                describe_config(&config);
            }
        }
    }

    Ok(())
}

async fn run_pick<S>(url: &str, query: &str, store: Arc<S>) -> anyhow::Result<()>
where
    S: ConfigSource + SelectorSink + 'static,
{
    let registry = Arc::new(TargetRegistry::new());
    let cancel = CancellationToken::new();

    let (target, page) = open_target(&registry, url).await?;
    let control = start_control(store, registry.clone(), Duration::from_secs(10), &cancel);
    let bridge_cancel = cancel.child_token();
    let bridge = spawn_picker_bridge(registry.events(), control, bridge_cancel.clone());

    target.channel().start_pagination_picking().await?;
    let picked = page.pick(query);
    target.channel().stop_pagination_picking().await?;

    // The bridge stores what was picked before it stops
    bridge_cancel.cancel();
    bridge.await.context("Picker bridge failed")?;
    registry.close(target.id());
    cancel.cancel();

    match picked? {
        Some(selector) => {
            println!("{}", selector);
            Ok(())
        }
        None => bail!("No element matches '{}'", query),
    }
}
