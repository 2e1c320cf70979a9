//! Lovtidend crawler main entry point
//!
//! This is the command-line interface for harvesting the register's XML
//! documents into a local directory tree.

use anyhow::Context;
use clap::Parser;
use lovtidend_crawler::checkpoint::CheckpointError;
use lovtidend_crawler::config::{load_config, validate, Config};
use lovtidend_crawler::crawler::{Coordinator, RunOptions};
use lovtidend_crawler::url::make_start_url;
use lovtidend_crawler::CrawlError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Lovtidend crawler: downloads XML documents from Norsk Lovtidend
///
/// Walks the register year by year, saves each listed document's XML files
/// under the output directory and keeps a checkpoint so an interrupted run
/// continues where it stopped.
#[derive(Parser, Debug)]
#[command(name = "lovtidend-crawler")]
#[command(version = "1.0.0")]
#[command(about = "Download XML documents from Norsk Lovtidend", long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory where XML files are stored
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Maximum number of listing pages to walk
    #[arg(long)]
    max_pages: Option<usize>,

    /// Maximum number of documents to process
    #[arg(long)]
    limit: Option<usize>,

    /// Offset to start from in the register listing
    #[arg(long)]
    offset: Option<u64>,

    /// Re-download files that already exist
    #[arg(long)]
    overwrite: bool,

    /// Listing index of the register
    #[arg(long)]
    base_url: Option<String>,

    /// Explicit first listing page; overrides the checkpoint
    #[arg(long)]
    start_url: Option<String>,

    /// First publication year to crawl
    #[arg(long)]
    start_year: Option<i32>,

    /// Last publication year to crawl (defaults to the current year)
    #[arg(long)]
    end_year: Option<i32>,

    /// Where to store progress for resuming
    #[arg(long, value_name = "FILE")]
    checkpoint_file: Option<PathBuf>,

    /// Neither load nor write the checkpoint
    #[arg(long)]
    no_resume: bool,

    /// Disable the on-disk response cache
    #[arg(long)]
    no_cache: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, start_url) = match prepare(&cli) {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::from(2);
        }
    };

    let coordinator = match Coordinator::from_config(&config, !cli.no_resume) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            tracing::error!("Failed to initialize crawler: {}", e);
            return exit_code(&e);
        }
    };
    setup_shutdown_handler(coordinator.cancellation_flag());

    let options = RunOptions {
        start_url,
        ..RunOptions::from_config(&config)
    };

    match coordinator.run(options).await {
        Ok(report) if report.outcome.is_failure() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            exit_code(&e)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lovtidend_crawler=info,warn"),
            1 => EnvFilter::new("lovtidend_crawler=debug,info"),
            2 => EnvFilter::new("lovtidend_crawler=trace,debug"),
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

/// Loads the configuration, applies command-line overrides and builds the
/// explicit start URL, if one was asked for
fn prepare(cli: &Cli) -> anyhow::Result<(Config, Option<String>)> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(output) = &cli.output {
        config.output.output_dir = output.clone();
    }
    if let Some(path) = &cli.checkpoint_file {
        config.output.checkpoint_path = path.clone();
    }
    if cli.no_cache {
        config.output.cache_dir = None;
    }
    if let Some(base_url) = &cli.base_url {
        config.crawler.base_url = base_url.clone();
    }
    if let Some(start_year) = cli.start_year {
        config.crawler.start_year = start_year;
    }
    if cli.end_year.is_some() {
        config.crawler.end_year = cli.end_year;
    }
    if cli.max_pages.is_some() {
        config.crawler.max_pages = cli.max_pages;
    }
    if cli.limit.is_some() {
        config.crawler.limit = cli.limit;
    }
    config.crawler.overwrite |= cli.overwrite;

    validate(&config).context("Invalid configuration")?;

    let start_url = if cli.start_url.is_some() || cli.offset.is_some() {
        make_start_url(
            &config.crawler.base_url,
            cli.start_url.as_deref(),
            cli.offset,
            Some(config.crawler.start_year),
        )
        .context("Invalid start URL")?
    } else {
        None
    };

    Ok((config, start_url))
}

/// First Ctrl+C stops at the next document boundary. Second Ctrl+C exits
/// immediately; the checkpoint on disk is always a complete snapshot.
fn setup_shutdown_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, stopping after the current document");
            cancel.store(true, Ordering::SeqCst);

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::error!("Force quit requested, exiting immediately");
                std::process::exit(1);
            }
        }
    });
}

/// Process exit status for a failed run
fn exit_code(error: &CrawlError) -> ExitCode {
    match error {
        CrawlError::Config(_) | CrawlError::Checkpoint(CheckpointError::Corrupt { .. }) => {
            ExitCode::from(2)
        }
        _ => ExitCode::from(1),
    }
}
