use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use fastseek::{
    config::{DeliveryMode, SearchConfig, SearchTarget},
    Entry, Searcher, TraversalStats,
};
use std::{
    num::NonZeroUsize,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliSearchConfig {
    /// Name pattern to match (* and ? wildcards, [...] character classes)
    #[arg(short = 'p', long)]
    pattern: Option<String>,

    /// Root directory to search in (can be specified multiple times)
    #[arg(short = 'd', long = "root")]
    roots: Vec<PathBuf>,

    /// Number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Print matches from a dispatcher thread instead of the search workers
    #[arg(long)]
    deferred: bool,

    /// Stop the search after this many matches
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Show only statistics, not matches
    #[arg(short, long)]
    stats: bool,

    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Match names regardless of case
    #[arg(short = 'i', long)]
    case_insensitive: bool,

    /// Descend into symlinked directories
    #[arg(short = 'L', long)]
    follow_links: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find files whose name matches a pattern
    Files(Box<CliSearchConfig>),

    /// Find directories whose name matches a pattern
    Dirs(Box<CliSearchConfig>),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (target, args) = match cli.command {
        Commands::Files(args) => (SearchTarget::Files, args),
        Commands::Dirs(args) => (SearchTarget::Directories, args),
    };

    let mut config = SearchConfig::load_from(args.config.as_deref())
        .context("Failed to load configuration")?
        .merge_with_cli(cli_config(target, &args));
    if config.roots.is_empty() {
        config.roots.push(PathBuf::from("."));
    }

    setup_logging(&config.log_level);
    debug!("Effective configuration: {:?}", config);
    run_search(&config, &args)
}

/// Turns command-line flags into a config that `merge_with_cli` can lay
/// over the file values
fn cli_config(target: SearchTarget, args: &CliSearchConfig) -> SearchConfig {
    let defaults = SearchConfig::default();
    SearchConfig {
        roots: args.roots.clone(),
        pattern: args.pattern.clone().unwrap_or(defaults.pattern),
        target,
        delivery: if args.deferred {
            DeliveryMode::Deferred
        } else {
            DeliveryMode::Inline
        },
        case_sensitive: defaults.case_sensitive && !args.case_insensitive,
        follow_links: args.follow_links,
        thread_count: args.threads,
        ..SearchConfig::default()
    }
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_search(config: &SearchConfig, args: &CliSearchConfig) -> Result<()> {
    let searcher = Searcher::from_config(config)?;
    let stop = searcher.stop_handle();
    let limiter = stop.clone();
    let metrics = searcher.metrics();

    let found = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&found);
    let limit = args.limit;
    let stats_only = args.stats;

    let outcome = searcher
        .on_batch(move |batch| {
            for entry in batch {
                let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if limit.is_some_and(|limit| seen > limit) {
                    limiter.stop();
                    return;
                }
                if !stats_only {
                    print_entry(entry);
                }
                if limit == Some(seen) {
                    limiter.stop();
                }
            }
        })
        .start()?;

    let total = found.load(Ordering::SeqCst);
    let total = limit.map_or(total, |limit| total.min(limit));
    let stopped = outcome.is_canceled() || stop.is_stopped();
    print_summary(config.target, total, stopped, stats_only.then(|| metrics.get_stats()));
    Ok(())
}

fn print_entry(entry: &Entry) {
    let path = entry.path.display().to_string();
    if entry.is_dir() {
        println!("{}", path.blue());
    } else {
        println!("{}", path.green());
    }
}

fn print_summary(
    target: SearchTarget,
    total: usize,
    stopped: bool,
    stats: Option<TraversalStats>,
) {
    let noun = match (target, total) {
        (SearchTarget::Files, 1) => "file",
        (SearchTarget::Files, _) => "files",
        (SearchTarget::Directories, 1) => "directory",
        (SearchTarget::Directories, _) => "directories",
    };
    println!("\nFound {} {}", total, noun);

    if let Some(stats) = stats {
        println!(
            "Listed {} directories, skipped {} unreadable subtrees",
            stats.directories_listed,
            stats.transient_faults + stats.other_faults
        );
    }
    if stopped {
        println!("{}", "Search stopped before completion".yellow());
    }
}
