//! Novel-Ripple main entry point
//!
//! This is the command-line interface for the Novel-Ripple harvester.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use novel_ripple::config::{load_config_with_hash, Config};
use novel_ripple::output::{
    format_catalog, format_chapter, format_job_report, format_novels, print_statistics,
};
use novel_ripple::{ChapterKey, Coordinator, CrawlOptions, JobReport};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Novel-Ripple: a serialized web fiction harvester
///
/// Novel-Ripple crawls a novel's table of contents, fetches every chapter
/// through a bounded worker pool, strips site boilerplate and stores the
/// result in SQLite so it can be read later without re-fetching.
#[derive(Parser, Debug)]
#[command(name = "novel-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A serialized web fiction harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a novel from its catalog URL
    Crawl {
        /// Catalog (table of contents) URL
        url: String,

        /// Replace the stored catalog and re-fetch all chapters
        #[arg(long)]
        refresh: bool,
    },

    /// Show a stored novel's catalog
    Catalog {
        /// Novel key or numeric id
        novel: String,
    },

    /// Print one chapter's text
    Chapter {
        /// Chapter key as NOVEL/CHAPTER
        key: ChapterKey,
    },

    /// List stored novels
    Novels,

    /// Fetch again the chapters of a novel that have no content
    Retry {
        /// Novel key or numeric id
        novel: String,
    },

    /// Delete a novel with its chapters and content
    Delete {
        /// Novel key or numeric id
        novel: String,
    },

    /// Show library statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => (Config::default(), "default".to_string()),
    };

    let coordinator = Coordinator::new(config, config_hash)?;

    match cli.command {
        Command::Crawl { url, refresh } => {
            let report = handle_crawl(&coordinator, &url, CrawlOptions { refresh }).await?;
            if !report.outcome.is_success() {
                std::process::exit(1);
            }
        }
        Command::Catalog { novel } => {
            let chapters = coordinator.get_catalog(&novel)?;
            let key = chapters
                .first()
                .map(|c| c.novel_key.clone())
                .unwrap_or(novel);
            print!("{}", format_catalog(&key, &chapters));
        }
        Command::Chapter { key } => match coordinator.get_chapter_content(&key)? {
            Some(chapter) => print!("{}", format_chapter(&chapter)),
            None => bail!("chapter {} not found or has no content", key),
        },
        Command::Novels => {
            print!("{}", format_novels(&coordinator.list_novels()?));
        }
        Command::Retry { novel } => {
            let cancel = cancel_on_ctrl_c();
            let report = coordinator.retry_missing(&novel, cancel).await?;
            print!("{}", format_job_report(&report));
        }
        Command::Delete { novel } => {
            if coordinator.delete_novel(&novel)? {
                println!("Deleted {}", novel);
            } else {
                bail!("novel {} not found", novel);
            }
        }
        Command::Stats => {
            print_statistics(&coordinator.library_stats()?);
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("novel_ripple=info,warn"),
            1 => EnvFilter::new("novel_ripple=debug,info"),
            2 => EnvFilter::new("novel_ripple=trace,debug"),
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

/// Returns a token cancelled by the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling job at the next phase boundary");
            token.cancel();
        }
    });
    cancel
}

/// Runs a crawl job and prints its report
async fn handle_crawl(
    coordinator: &Coordinator,
    url: &str,
    options: CrawlOptions,
) -> anyhow::Result<JobReport> {
    let cancel = cancel_on_ctrl_c();
    let report = coordinator
        .run(url, options, cancel)
        .await
        .with_context(|| format!("crawl of {} did not start", url))?;

    print!("{}", format_job_report(&report));
    Ok(report)
}
