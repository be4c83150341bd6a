//! siterecon: single-target web reconnaissance crawler.

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use siterecon::config::{LogFormat, LoggingConfig};
use siterecon::emit::CheckpointManager;
use siterecon::{Config, CrawlEvent, Crawler, CrawlerError, Summary};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Exit code for a crawl stopped early with a usable checkpoint.
const EXIT_INTERRUPTED: u8 = 3;
/// Exit code for invalid flags or configuration.
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "siterecon")]
#[command(about = "Single-target web reconnaissance crawler")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a target URL
    Crawl {
        /// Target URL
        url: String,

        /// Maximum crawl depth
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,

        /// Worker count (0 selects automatically)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Global request rate in requests per second
        #[arg(short, long)]
        rate: Option<f64>,

        /// Host scope mode (strict, sub, rdn, all)
        #[arg(short, long)]
        scope: Option<String>,

        /// Cookie header value sent with every request
        #[arg(long)]
        cookie: Option<String>,

        /// File containing the cookie header value
        #[arg(long)]
        cookie_file: Option<PathBuf>,

        /// Blacklist regex patterns, repeatable
        #[arg(short, long)]
        blacklist: Vec<String>,

        /// Output directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Base per-request timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Global cap on enqueued URLs
        #[arg(long)]
        max_urls: Option<usize>,

        /// Wall-clock deadline for the crawl, in seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Enable the pattern fuzzer
        #[arg(long)]
        fuzz: bool,

        /// Suppress the progress display
        #[arg(short, long)]
        quiet: bool,
    },

    /// Resume a checkpointed crawl
    Resume {
        /// Task id of the checkpoint
        task_id: String,

        /// Suppress the progress display
        #[arg(short, long)]
        quiet: bool,
    },

    /// List saved checkpoints
    ListCheckpoints,

    /// Delete a saved checkpoint
    DeleteCheckpoint {
        /// Task id of the checkpoint
        task_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(ExitCode::from(EXIT_USAGE));
        }
    };
    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Crawl {
            url,
            max_depth,
            workers,
            rate,
            scope,
            cookie,
            cookie_file,
            blacklist,
            out_dir,
            timeout,
            max_urls,
            deadline,
            fuzz,
            quiet,
        } => {
            let mut config = config;
            if let Some(depth) = max_depth {
                config.crawl.max_depth = depth;
            }
            if let Some(workers) = workers {
                config.crawl.workers = workers;
            }
            if let Some(rate) = rate {
                config.crawl.rate_limit = rate;
            }
            if let Some(mode) = scope {
                match mode.parse() {
                    Ok(mode) => config.scope.mode = mode,
                    Err(e) => {
                        eprintln!("error: {e}");
                        return Ok(ExitCode::from(EXIT_USAGE));
                    }
                }
            }
            if cookie.is_some() {
                config.crawl.cookie = cookie;
            }
            if cookie_file.is_some() {
                config.crawl.cookie_file = cookie_file;
            }
            config.scope.blacklist_patterns.extend(blacklist);
            if let Some(out_dir) = out_dir {
                config.output.out_dir = out_dir;
            }
            if let Some(timeout) = timeout {
                config.crawl.base_timeout_secs = timeout;
                config.crawl.max_timeout_secs = config.crawl.max_timeout_secs.max(timeout);
            }
            if let Some(max_urls) = max_urls {
                config.crawl.max_urls = max_urls;
            }
            if deadline.is_some() {
                config.crawl.deadline_secs = deadline;
            }
            if fuzz {
                config.fuzzer.enabled = true;
            }
            if let Err(e) = config.validate() {
                eprintln!("error: {e:#}");
                return Ok(ExitCode::from(EXIT_USAGE));
            }

            let crawler = match Crawler::new(config, &url) {
                Ok(crawler) => crawler,
                Err(CrawlerError::InvalidTarget(reason)) => {
                    eprintln!("error: invalid target URL: {reason}");
                    return Ok(ExitCode::from(EXIT_USAGE));
                }
                Err(e) => return Err(e.into()),
            };
            run_crawl(crawler, quiet).await
        }

        Commands::Resume { task_id, quiet } => {
            let manager = CheckpointManager::new(config.output.checkpoint_dir())?;
            let state = manager.load(&task_id)?;
            let mut crawler = Crawler::new(config, &state.target)?;
            let events = crawler.subscribe_events(256);
            let progress = spawn_progress(events, quiet);
            let ctrl_c = spawn_ctrl_c(crawler.handle());

            let report = crawler.resume(state).await?;
            ctrl_c.abort();
            let _ = progress.await;
            finish(report)
        }

        Commands::ListCheckpoints => {
            let manager = CheckpointManager::new(config.output.checkpoint_dir())?;
            let states = manager.list()?;
            if states.is_empty() {
                println!("no checkpoints");
                return Ok(ExitCode::SUCCESS);
            }
            println!(
                "{:<40} {:<12} {:>8} {:>8}  {}",
                "TASK", "STATUS", "CRAWLED", "PENDING", "LAST UPDATE"
            );
            for state in states {
                println!(
                    "{:<40} {:<12} {:>8} {:>8}  {}",
                    state.task_id,
                    format!("{:?}", state.status).to_lowercase(),
                    state.total_crawled,
                    state.pending_urls.len(),
                    state.last_update.format("%Y-%m-%d %H:%M:%S"),
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::DeleteCheckpoint { task_id } => {
            let manager = CheckpointManager::new(config.output.checkpoint_dir())?;
            manager.delete(&task_id)?;
            println!("deleted checkpoint {task_id}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_crawl(mut crawler: Crawler, quiet: bool) -> Result<ExitCode> {
    let events = crawler.subscribe_events(256);
    let progress = spawn_progress(events, quiet);
    let handle = crawler.handle();
    let ctrl_c = spawn_ctrl_c(handle);

    let report = crawler.run().await?;
    ctrl_c.abort();
    let _ = progress.await;
    finish(report)
}

fn finish(report: siterecon::CrawlReport) -> Result<ExitCode> {
    print_summary(&report.summary);
    if report.interrupted {
        if let Some(path) = &report.checkpoint {
            eprintln!(
                "interrupted; resume with: siterecon resume {}  (checkpoint: {})",
                report.summary.task_id,
                path.display()
            );
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        eprintln!("interrupted without a checkpoint");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

fn init_logging(config: &LoggingConfig, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directive(verbose)));
    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

/// Feeds the spinner from the crawl event stream. The task ends when
/// the crawler drops its event sender.
fn spawn_progress(mut events: mpsc::Receiver<CrawlEvent>, quiet: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pb = if quiet {
            None
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} pages {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        };
        while let Some(event) = events.recv().await {
            let Some(pb) = &pb else { continue };
            match event {
                CrawlEvent::Started { target, .. } => {
                    pb.set_message(format!("crawling {target}"));
                }
                CrawlEvent::PageCrawled { url, status, depth } => {
                    pb.inc(1);
                    pb.set_message(format!("d{depth} {status} {url}"));
                }
                CrawlEvent::Progress {
                    stats,
                    frontier_size,
                    ..
                } => {
                    pb.set_message(format!(
                        "{frontier_size} queued, {} failed, {} skipped",
                        stats.failed,
                        stats.duplicates_exact + stats.pattern_capped + stats.out_of_scope
                    ));
                }
                CrawlEvent::CheckpointSaved { .. } => {}
                CrawlEvent::Paused | CrawlEvent::Completed { .. } | CrawlEvent::Failed { .. } => {
                    pb.finish_and_clear();
                }
                CrawlEvent::Resumed => {
                    pb.set_message("resumed");
                }
            }
        }
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
    })
}

/// First Ctrl-C requests a graceful stop; a second one aborts.
fn spawn_ctrl_c(handle: siterecon::CrawlHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stopping; press Ctrl-C again to abort");
            handle.stop();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    })
}

fn print_summary(summary: &Summary) {
    println!("crawl {} finished in {}s", summary.task_id, summary.duration_secs);
    println!("  target:      {}", summary.target);
    println!("  crawled:     {}", summary.total_crawled);
    println!("  failed:      {}", summary.total_failed);
    println!("  skipped:     {}", summary.total_skipped);
    println!("  apis:        {}", summary.apis_found);
    println!("  forms:       {}", summary.forms_found);
    println!("  subdomains:  {}", summary.subdomains_found);
    println!("  external:    {}", summary.external_links);
}
