//! Crawl orchestration
//!
//! Wires the frontier, worker pool, driver, harvester, learner,
//! passive sources, fuzzer, emitter and checkpoints into one crawl.
//! Workers pull from the frontier under a shared token bucket; one
//! aggregator task consumes every result so the learner stays
//! single-consumer; a watcher closes the frontier once it is empty
//! with no request in flight.

use crate::canonical::{canonicalize, CanonicalUrl, SmartUrlValidator, ValidatorConfig};
use crate::config::{Config, OutputConfig, SinkFormat};
use crate::dedup::DedupStack;
use crate::driver::Driver;
use crate::emit::{
    CheckpointError, CheckpointManager, CrawlEvent, CrawlState, CrawlStatus, CsvSink, Emitter,
    HtmlReportSink, JsonlSink, Sink, SinkError, TextSummarySink,
};
use crate::fetch::{FetchError, FetchOptions, FetchResponse, Fetcher, HttpFetcher};
use crate::frontier::{Frontier, FrontierEntry};
use crate::fuzz::{ParamVerdict, PatternFuzzer};
use crate::harvest::Harvester;
use crate::learner::AdaptiveLearner;
use crate::passive::{PassiveIngestor, RobotsRules};
use crate::pool::{ActiveTasks, AdaptiveTimeout, PauseGate, RetryPolicy, Shutdown, TokenBucket};
use crate::scope::{ScopeEngine, ScopeError};
use crate::stats::CrawlStats;
use crate::types::{DiscoverySource, Finding, Summary};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Results delivered between progress events.
const PROGRESS_EVERY: usize = 20;

#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("invalid target URL: {0}")]
    InvalidTarget(String),
    #[error("crawl {0} already finished")]
    AlreadyFinished(String),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a finished (or interrupted) crawl hands back to the CLI.
#[derive(Debug)]
pub struct CrawlReport {
    pub summary: Summary,
    /// True when the crawl stopped on a shutdown signal or deadline
    /// rather than by draining the frontier.
    pub interrupted: bool,
    /// Path of the last checkpoint, when one was written.
    pub checkpoint: Option<PathBuf>,
}

/// Remote control for a running crawl.
#[derive(Clone)]
pub struct CrawlHandle {
    shutdown: Shutdown,
    pause: Arc<PauseGate>,
}

impl CrawlHandle {
    /// Stop the crawl; in-flight requests finish, pending entries are
    /// checkpointed.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    pub fn pause(&self) {
        self.pause.pause();
    }

    pub fn resume(&self) {
        self.pause.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }
}

#[derive(Clone, Default)]
struct EventSender(Option<mpsc::Sender<CrawlEvent>>);

impl EventSender {
    async fn send(&self, event: CrawlEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event).await;
        }
    }
}

enum WorkerMessage {
    Crawled(Arc<crate::types::PageResult>),
    Failed { url: String, error: String },
    Finding(Finding),
}

/// Wraps the raw fetcher so param-validation probes still pay the
/// global rate limit.
struct ThrottledFetcher {
    inner: Arc<dyn Fetcher>,
    bucket: Arc<TokenBucket>,
}

#[async_trait]
impl Fetcher for ThrottledFetcher {
    async fn fetch(
        &self,
        url: &CanonicalUrl,
        options: &FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        self.bucket.acquire().await;
        self.inner.fetch(url, options).await
    }
}

/// Everything a worker task shares with its siblings.
struct WorkerCtx {
    frontier: Arc<Frontier>,
    driver: Driver,
    harvester: Arc<Harvester>,
    fuzzer: Arc<PatternFuzzer>,
    fetcher: Arc<dyn Fetcher>,
    bucket: Arc<TokenBucket>,
    retry: RetryPolicy,
    timeout: Arc<AdaptiveTimeout>,
    stats: Arc<CrawlStats>,
    shutdown: Shutdown,
    pause: Arc<PauseGate>,
    active: Arc<ActiveTasks>,
    robots: Option<RobotsRules>,
    honor_robots: bool,
    results: mpsc::Sender<WorkerMessage>,
}

/// A single-target crawl, built from a validated [`Config`].
pub struct Crawler {
    config: Config,
    target: CanonicalUrl,
    task_id: String,
    frontier: Arc<Frontier>,
    dedup: Arc<DedupStack>,
    stats: Arc<CrawlStats>,
    harvester: Arc<Harvester>,
    driver: Driver,
    fuzzer: Arc<PatternFuzzer>,
    fetcher: Arc<dyn Fetcher>,
    checkpoints: Arc<CheckpointManager>,
    bucket: Arc<TokenBucket>,
    retry: RetryPolicy,
    timeout: Arc<AdaptiveTimeout>,
    active: Arc<ActiveTasks>,
    shutdown: Shutdown,
    pause: Arc<PauseGate>,
    events: EventSender,
}

impl Crawler {
    pub fn new(config: Config, target: &str) -> Result<Self, CrawlerError> {
        let cookie = resolve_cookie(&config)?;
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(HttpFetcher::new(&config.crawl.user_agent, cookie)?);
        Self::with_fetcher(config, target, fetcher)
    }

    /// Build a crawler around an injected fetcher.
    pub fn with_fetcher(
        config: Config,
        target: &str,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, CrawlerError> {
        let target_url = canonicalize(target)
            .map_err(|e| CrawlerError::InvalidTarget(format!("{target}: {e}")))?;

        let scope = Arc::new(ScopeEngine::new(
            &config.scope,
            target_url.host(),
            config.crawl.max_depth,
        )?);
        let dedup = Arc::new(DedupStack::new(&config.dedup));
        let frontier = Arc::new(Frontier::default());
        let stats = Arc::new(CrawlStats::default());
        let harvester = Arc::new(Harvester::new(
            SmartUrlValidator::new(ValidatorConfig::default()),
            Arc::clone(&scope),
            Arc::clone(&dedup),
            Arc::clone(&frontier),
            Arc::clone(&stats),
            config.crawl.max_urls,
        ));
        let driver = Driver::new(
            Arc::clone(&fetcher),
            Arc::clone(&dedup),
            target_url.host(),
            &config.crawl,
            config.output.include_body,
        );
        let fuzzer = Arc::new(PatternFuzzer::new(
            config.fuzzer.clone(),
            Arc::clone(&harvester),
        ));
        let checkpoints = Arc::new(CheckpointManager::new(config.output.checkpoint_dir())?);

        let bucket = Arc::new(TokenBucket::new(
            config.crawl.rate_limit,
            config.crawl.effective_burst(),
        ));
        let retry = RetryPolicy {
            max_retries: config.crawl.max_retries,
            base_delay: Duration::from_millis(config.crawl.retry_base_delay_ms),
            multiplier: config.crawl.retry_multiplier,
            max_delay: Duration::from_secs(60),
        };
        let timeout = Arc::new(AdaptiveTimeout::new(
            Duration::from_secs(config.crawl.base_timeout_secs),
            Duration::from_secs(config.crawl.max_timeout_secs),
        ));
        let task_id = generate_task_id(target_url.host());

        Ok(Self {
            config,
            target: target_url,
            task_id,
            frontier,
            dedup,
            stats,
            harvester,
            driver,
            fuzzer,
            fetcher,
            checkpoints,
            bucket,
            retry,
            timeout,
            active: Arc::new(ActiveTasks::default()),
            shutdown: Shutdown::default(),
            pause: Arc::new(PauseGate::default()),
            events: EventSender::default(),
        })
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn handle(&self) -> CrawlHandle {
        CrawlHandle {
            shutdown: self.shutdown.clone(),
            pause: Arc::clone(&self.pause),
        }
    }

    /// Open the event stream consumed by the CLI progress display.
    pub fn subscribe_events(&mut self, capacity: usize) -> mpsc::Receiver<CrawlEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        self.events = EventSender(Some(tx));
        rx
    }

    /// Run a fresh crawl: passive seeding, then the worker loop until
    /// the frontier drains or the crawl is stopped.
    pub async fn run(self) -> Result<CrawlReport, CrawlerError> {
        self.run_inner(None).await
    }

    /// Resume from a checkpointed state: the visited set is replayed
    /// into the dedup stack, pending entries are rescored and pushed
    /// back, passive seeding is skipped.
    pub async fn resume(self, state: CrawlState) -> Result<CrawlReport, CrawlerError> {
        self.run_inner(Some(state)).await
    }

    async fn run_inner(
        mut self,
        restore: Option<CrawlState>,
    ) -> Result<CrawlReport, CrawlerError> {
        let started = std::time::Instant::now();
        let resuming = restore.is_some();
        let mut robots = None;

        let state = match restore {
            Some(mut state) => {
                match state.status {
                    CrawlStatus::Completed | CrawlStatus::Failed => {
                        return Err(CrawlerError::AlreadyFinished(state.task_id));
                    }
                    // A crash can leave a checkpoint still marked
                    // running; accept it as-is.
                    CrawlStatus::Running => {}
                    _ => state.transition(CrawlStatus::Running)?,
                }
                self.task_id = state.task_id.clone();

                for url in &state.visited_urls {
                    self.dedup.mark_visited(url);
                }
                let pending = std::mem::take(&mut state.pending_urls);
                for entry in &pending {
                    self.dedup.mark_visited(entry.url.as_str());
                }
                self.harvester
                    .note_restored(state.visited_urls.len() + pending.len());
                let restored = pending.len();
                for entry in pending {
                    self.frontier.push_restored(entry);
                }
                info!(
                    task_id = %self.task_id,
                    restored,
                    visited = state.visited_urls.len(),
                    "resuming crawl"
                );
                self.events.send(CrawlEvent::Resumed).await;
                state
            }
            None => {
                let mut state = CrawlState::new(
                    self.task_id.clone(),
                    self.target.as_str().to_string(),
                    self.config.crawl.max_depth,
                );
                state.transition(CrawlStatus::Running)?;
                self.events
                    .send(CrawlEvent::Started {
                        task_id: self.task_id.clone(),
                        target: self.target.as_str().to_string(),
                        at: Utc::now(),
                    })
                    .await;
                robots = self.seed().await;
                state
            }
        };
        let state = Arc::new(Mutex::new(state));

        let mut learner = AdaptiveLearner::new(
            Arc::clone(&self.frontier),
            self.config.crawl.learning_rate,
            self.config.crawl.adaptive_learning,
        );
        let emitter = Emitter::new(
            build_sinks(&self.config.output)?,
            self.config.output.sink_queue_capacity,
            self.config.output.flush_every,
            Duration::from_secs(self.config.output.flush_interval_secs),
        );

        let workers = self.config.crawl.effective_workers();
        let (results_tx, results_rx) = mpsc::channel(workers * 4);
        let ctx = Arc::new(WorkerCtx {
            frontier: Arc::clone(&self.frontier),
            driver: self.driver,
            harvester: Arc::clone(&self.harvester),
            fuzzer: Arc::clone(&self.fuzzer),
            fetcher: Arc::clone(&self.fetcher),
            bucket: Arc::clone(&self.bucket),
            retry: self.retry.clone(),
            timeout: Arc::clone(&self.timeout),
            stats: Arc::clone(&self.stats),
            shutdown: self.shutdown.clone(),
            pause: Arc::clone(&self.pause),
            active: Arc::clone(&self.active),
            robots: robots.take(),
            honor_robots: self.config.passive.honor_robots_disallow,
            results: results_tx,
        });

        let worker_handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|_| tokio::spawn(worker_loop(Arc::clone(&ctx))))
            .collect();
        // Only workers hold result senders now; the channel closes
        // when the last worker exits.
        drop(ctx);

        let watcher = tokio::spawn(drain_watcher(
            Arc::clone(&self.frontier),
            Arc::clone(&self.active),
            Arc::clone(&self.dedup),
            self.shutdown.clone(),
            self.config.crawl.deadline_secs.map(Duration::from_secs),
            self.config.crawl.memory_soft_cap_mb,
        ));
        let checkpoint_task = tokio::spawn(checkpoint_loop(
            Arc::clone(&self.checkpoints),
            Arc::clone(&state),
            Arc::clone(&self.frontier),
            self.config.output.checkpoint_interval_secs,
            self.shutdown.subscribe(),
            self.events.clone(),
        ));

        aggregate(
            results_rx,
            &emitter,
            &mut learner,
            &state,
            &self.stats,
            &self.frontier,
            &self.events,
        )
        .await;
        for result in futures::future::join_all(worker_handles).await {
            if let Err(e) = result {
                warn!(error = %e, "worker task panicked");
            }
        }
        let _ = watcher.await;
        checkpoint_task.abort();

        let interrupted = self.shutdown.is_triggered();
        {
            let mut state = state.lock();
            let next = if interrupted {
                CrawlStatus::Paused
            } else {
                CrawlStatus::Completed
            };
            if state.status.can_transition_to(next) {
                let _ = state.transition(next);
            }
        }
        let checkpoint = match save_checkpoint(&self.checkpoints, &state, &self.frontier) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "final checkpoint save failed");
                None
            }
        };

        let snapshot = self.stats.snapshot();
        let summary = Summary {
            task_id: self.task_id.clone(),
            target: self.target.as_str().to_string(),
            total_crawled: snapshot.crawled,
            total_failed: snapshot.failed,
            total_skipped: snapshot.duplicates_exact
                + snapshot.pattern_capped
                + snapshot.out_of_scope
                + snapshot.invalid_urls,
            apis_found: snapshot.apis_found,
            forms_found: snapshot.forms_found,
            subdomains_found: snapshot.subdomains_found,
            external_links: snapshot.external_links,
            duration_secs: started.elapsed().as_secs(),
        };
        emitter.complete(summary.clone()).await;

        if interrupted {
            info!(task_id = %self.task_id, crawled = summary.total_crawled, "crawl interrupted");
            self.events.send(CrawlEvent::Paused).await;
        } else {
            info!(
                task_id = %self.task_id,
                crawled = summary.total_crawled,
                failed = summary.total_failed,
                resumed = resuming,
                "crawl complete"
            );
            self.events
                .send(CrawlEvent::Completed {
                    summary: summary.clone(),
                })
                .await;
        }
        for adjustment in learner.audit_log() {
            debug!(
                weight = %adjustment.weight,
                old = adjustment.old_value,
                new = adjustment.new_value,
                reason = %adjustment.reason,
                "weight adjustment"
            );
        }

        Ok(CrawlReport {
            summary,
            interrupted,
            checkpoint,
        })
    }

    /// Passive sources first, then the target itself; every seed runs
    /// the normal harvest gauntlet at depth 0.
    async fn seed(&self) -> Option<RobotsRules> {
        self.harvester
            .offer_at_depth(self.target.as_str(), 0, DiscoverySource::Seed);

        let ingestor = match PassiveIngestor::new(
            self.config.passive.clone(),
            &self.config.crawl.user_agent,
        ) {
            Ok(ingestor) => ingestor,
            Err(e) => {
                warn!(error = %e, "passive ingestion unavailable");
                return None;
            }
        };
        let batch = ingestor.collect(&self.target.to_url()).await;
        let mut offered = 0usize;
        for (raw, source) in batch.seeds {
            self.harvester.offer_at_depth(&raw, 0, source);
            offered += 1;
        }
        info!(seeds = offered, enqueued = self.harvester.enqueued_total(), "seeding done");
        batch.robots
    }
}

async fn worker_loop(ctx: Arc<WorkerCtx>) {
    let mut listener = ctx.shutdown.subscribe();
    loop {
        if listener.is_triggered() {
            return;
        }
        ctx.pause.wait_if_paused().await;

        // The guard is taken before the pop so the watcher never sees
        // "frontier empty, nothing active" while an entry is in hand.
        let guard = ctx.active.guard();
        let Some(entry) = ctx.frontier.try_pop() else {
            drop(guard);
            if ctx.frontier.is_closed() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(25)) => {}
                _ = listener.wait() => return,
            }
            continue;
        };

        if ctx.honor_robots {
            if let Some(rules) = &ctx.robots {
                if !rules.is_allowed(entry.url.path()) {
                    debug!(url = %entry.url, "skipping robots-disallowed URL");
                    CrawlStats::incr(&ctx.stats.out_of_scope);
                    drop(guard);
                    continue;
                }
            }
        }

        process_entry(&ctx, &entry).await;
        drop(guard);
    }
}

async fn process_entry(ctx: &WorkerCtx, entry: &FrontierEntry) {
    ctx.bucket.acquire().await;
    let mut attempt = 0u32;
    let outcome = loop {
        let timeout = ctx.timeout.current();
        match ctx.driver.process(entry, timeout).await {
            Ok(result) => break Ok(result),
            Err(e) if e.is_retryable() && attempt < ctx.retry.max_retries => {
                attempt += 1;
                CrawlStats::incr(&ctx.stats.retries);
                let delay = ctx.retry.delay_for(attempt);
                debug!(url = %entry.url, attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying fetch");
                tokio::time::sleep(delay).await;
                ctx.bucket.acquire().await;
            }
            Err(e) => break Err(e),
        }
    };

    match outcome {
        Ok(result) => {
            ctx.timeout.record(result.elapsed_ms);
            CrawlStats::incr(&ctx.stats.crawled);
            ctx.stats
                .bytes_fetched
                .fetch_add(result.body_size as u64, Ordering::Relaxed);

            for link in &result.links {
                ctx.harvester.offer(link, entry.depth, DiscoverySource::Link);
            }
            for form in &result.forms {
                ctx.harvester
                    .offer(&form.action, entry.depth, DiscoverySource::FormAction);
            }
            for api in &result.apis {
                if api.url.starts_with("http") {
                    ctx.harvester.offer(&api.url, entry.depth, DiscoverySource::Link);
                }
            }

            if ctx.fuzzer.is_enabled() && !entry.url.has_params() && result.status == 200 {
                let enqueued = ctx.fuzzer.fuzz(&entry.url, entry.depth);
                if enqueued > 0 {
                    validate_fuzz_params(ctx, entry).await;
                }
            }

            let _ = ctx
                .results
                .send(WorkerMessage::Crawled(Arc::new(result)))
                .await;
        }
        Err(e) => {
            CrawlStats::incr(&ctx.stats.failed);
            warn!(url = %entry.url, error = %e, "fetch failed");
            let _ = ctx
                .results
                .send(WorkerMessage::Failed {
                    url: entry.url.as_str().to_string(),
                    error: e.to_string(),
                })
                .await;
        }
    }
}

async fn validate_fuzz_params(ctx: &WorkerCtx, entry: &FrontierEntry) {
    let throttled = ThrottledFetcher {
        inner: Arc::clone(&ctx.fetcher),
        bucket: Arc::clone(&ctx.bucket),
    };
    match ctx
        .fuzzer
        .validate_params(&throttled, &entry.url, ctx.timeout.current())
        .await
    {
        Ok(verdicts) => {
            for (param, verdict) in verdicts {
                if verdict == ParamVerdict::Effective {
                    let finding = Finding {
                        url: entry.url.as_str().to_string(),
                        kind: "effective_param".into(),
                        detail: format!("parameter '{param}' changes the response"),
                    };
                    let _ = ctx.results.send(WorkerMessage::Finding(finding)).await;
                }
            }
        }
        Err(e) => debug!(url = %entry.url, error = %e, "param validation failed"),
    }
}

/// Single consumer of the result stream: feeds the learner, updates
/// the checkpointable state, fans results out to sinks and emits
/// progress events. Ends when every worker has exited.
async fn aggregate(
    mut rx: mpsc::Receiver<WorkerMessage>,
    emitter: &Emitter,
    learner: &mut AdaptiveLearner,
    state: &Mutex<CrawlState>,
    stats: &CrawlStats,
    frontier: &Frontier,
    events: &EventSender,
) {
    let mut seen_apis: HashSet<String> = HashSet::new();
    let mut seen_forms: HashSet<String> = HashSet::new();
    let mut seen_subdomains: HashSet<String> = HashSet::new();
    let mut since_progress = 0usize;

    while let Some(message) = rx.recv().await {
        match message {
            WorkerMessage::Crawled(result) => {
                learner.on_result(&result);
                CrawlStats::add(&stats.apis_found, result.apis.len());
                CrawlStats::add(&stats.forms_found, result.forms.len());
                CrawlStats::add(&stats.assets_found, result.assets.len());
                if result.is_similar {
                    CrawlStats::incr(&stats.near_duplicates);
                }

                let current_depth = {
                    let mut state = state.lock();
                    state.total_crawled += 1;
                    state.current_depth = state.current_depth.max(result.depth);
                    state.last_update = Utc::now();
                    state.visited_urls.push(result.url.as_str().to_string());
                    for api in &result.apis {
                        if seen_apis.insert(api.url.clone()) {
                            state.discovered_apis.push(api.url.clone());
                        }
                    }
                    for form in &result.forms {
                        if seen_forms.insert(form.action.clone()) {
                            state.discovered_forms.push(form.action.clone());
                        }
                    }
                    for subdomain in &result.subdomains {
                        if seen_subdomains.insert(subdomain.clone()) {
                            state.discovered_subdomains.push(subdomain.clone());
                            CrawlStats::incr(&stats.subdomains_found);
                        }
                    }
                    state.current_depth
                };

                events
                    .send(CrawlEvent::PageCrawled {
                        url: result.url.as_str().to_string(),
                        status: result.status,
                        depth: result.depth,
                    })
                    .await;
                emitter.emit_result(result).await;

                since_progress += 1;
                if since_progress >= PROGRESS_EVERY {
                    since_progress = 0;
                    events
                        .send(CrawlEvent::Progress {
                            stats: stats.snapshot(),
                            frontier_size: frontier.len(),
                            current_depth,
                        })
                        .await;
                }
            }
            WorkerMessage::Failed { url, error } => {
                let mut state = state.lock();
                *state.failed_urls.entry(url).or_insert(0) += 1;
                state.last_update = Utc::now();
                drop(state);
                debug!(error = %error, "failure recorded");
            }
            WorkerMessage::Finding(finding) => {
                emitter.emit_finding(Arc::new(finding)).await;
            }
        }
    }
}

/// Closes the frontier when the crawl has drained, a deadline passes
/// or a shutdown fires. Also owns the soft memory ceiling warning.
async fn drain_watcher(
    frontier: Arc<Frontier>,
    active: Arc<ActiveTasks>,
    dedup: Arc<DedupStack>,
    shutdown: Shutdown,
    deadline: Option<Duration>,
    memory_soft_cap_mb: usize,
) {
    let started = tokio::time::Instant::now();
    let mut memory_warned = false;
    loop {
        if shutdown.is_triggered() {
            frontier.close();
            return;
        }
        if let Some(deadline) = deadline {
            if started.elapsed() >= deadline {
                info!(deadline_secs = deadline.as_secs(), "crawl deadline reached");
                shutdown.trigger();
                frontier.close();
                return;
            }
        }
        if frontier.is_empty() && active.active() == 0 {
            frontier.close();
            return;
        }
        if !memory_warned {
            // Rough per-entry estimates; good enough to flag a
            // runaway frontier before the OS does.
            let estimated_mb =
                (dedup.visited_count() * 64 + frontier.len() * 512) / (1024 * 1024);
            if estimated_mb >= memory_soft_cap_mb {
                warn!(estimated_mb, cap_mb = memory_soft_cap_mb, "soft memory ceiling reached");
                memory_warned = true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Periodic checkpoint writes. A failed write is logged and the crawl
/// continues; the next tick tries again.
async fn checkpoint_loop(
    manager: Arc<CheckpointManager>,
    state: Arc<Mutex<CrawlState>>,
    frontier: Arc<Frontier>,
    interval_secs: u64,
    mut listener: crate::pool::ShutdownListener,
    events: EventSender,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match save_checkpoint(&manager, &state, &frontier) {
                    Ok(path) => {
                        events
                            .send(CrawlEvent::CheckpointSaved {
                                path: path.display().to_string(),
                            })
                            .await;
                    }
                    Err(e) => warn!(error = %e, "checkpoint save failed"),
                }
            }
            _ = listener.wait() => return,
        }
    }
}

fn save_checkpoint(
    manager: &CheckpointManager,
    state: &Mutex<CrawlState>,
    frontier: &Frontier,
) -> Result<PathBuf, CheckpointError> {
    let mut snapshot = {
        let mut state = state.lock();
        state.last_update = Utc::now();
        state.clone()
    };
    snapshot.pending_urls = frontier.snapshot();
    snapshot.truncate_lists();
    manager.save(&snapshot)
}

fn build_sinks(output: &OutputConfig) -> Result<Vec<Box<dyn Sink>>, SinkError> {
    std::fs::create_dir_all(&output.out_dir)?;
    let mut sinks: Vec<Box<dyn Sink>> = Vec::with_capacity(output.formats.len());
    for format in &output.formats {
        match format {
            SinkFormat::Jsonl => sinks.push(Box::new(JsonlSink::create(
                &output.out_dir.join("results.jsonl"),
                output.include_body,
            )?)),
            SinkFormat::Csv => {
                sinks.push(Box::new(CsvSink::create(&output.out_dir.join("results.csv"))?))
            }
            SinkFormat::Text => sinks.push(Box::new(TextSummarySink::create(
                &output.out_dir.join("results.txt"),
            )?)),
            SinkFormat::Html => sinks.push(Box::new(HtmlReportSink::create(
                &output.out_dir.join("report.html"),
            )?)),
        }
    }
    Ok(sinks)
}

fn resolve_cookie(config: &Config) -> Result<Option<String>, CrawlerError> {
    if let Some(cookie) = &config.crawl.cookie {
        return Ok(Some(cookie.clone()));
    }
    if let Some(path) = &config.crawl.cookie_file {
        let content = std::fs::read_to_string(path)?;
        return Ok(Some(content.trim().to_string()));
    }
    Ok(None)
}

fn generate_task_id(host: &str) -> String {
    let slug: String = host
        .chars()
        .map(|c| if c == '.' { '-' } else { c })
        .collect();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{slug}-{}", &nonce[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResponse;
    use parking_lot::Mutex as PlMutex;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;

    struct SiteFetcher {
        pages: PlMutex<HashMap<String, (u16, String)>>,
        fetches: AtomicUsize,
    }

    impl SiteFetcher {
        fn new(pages: &[(&str, u16, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: PlMutex::new(
                    pages
                        .iter()
                        .map(|(url, status, body)| {
                            (url.to_string(), (*status, body.to_string()))
                        })
                        .collect(),
                ),
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl Fetcher for SiteFetcher {
        async fn fetch(
            &self,
            url: &CanonicalUrl,
            _options: &FetchOptions,
        ) -> Result<FetchResponse, FetchError> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            let (status, body) = self
                .pages
                .lock()
                .get(url.as_str())
                .cloned()
                .unwrap_or((404, String::new()));
            Ok(FetchResponse {
                final_url: url.as_str().to_string(),
                status,
                headers: vec![("content-type".into(), "text/html".into())],
                body: body.into_bytes(),
                elapsed_ms: 1,
                truncated: false,
            })
        }
    }

    fn test_config(out_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.crawl.workers = 2;
        config.crawl.rate_limit = 10_000.0;
        config.crawl.burst = 100;
        config.crawl.max_depth = 3;
        config.output.out_dir = out_dir.to_path_buf();
        config.output.formats = vec![SinkFormat::Jsonl];
        config.passive.robots = false;
        config.passive.sitemap = false;
        config
    }

    fn small_site() -> Arc<SiteFetcher> {
        SiteFetcher::new(&[
            (
                "https://example.com/",
                200,
                r#"<html><body>
                    <a href="https://example.com/about">about</a>
                    <a href="https://example.com/admin">admin</a>
                </body></html>"#,
            ),
            (
                "https://example.com/about",
                200,
                r#"<html><body><a href="https://example.com/">home</a></body></html>"#,
            ),
            (
                "https://example.com/admin",
                200,
                "<html><body>panel</body></html>",
            ),
        ])
    }

    #[tokio::test]
    async fn test_crawl_drains_small_site() {
        let dir = tempdir().unwrap();
        let fetcher = small_site();
        let crawler = Crawler::with_fetcher(
            test_config(dir.path()),
            "https://example.com/",
            fetcher.clone(),
        )
        .unwrap();

        let report = crawler.run().await.unwrap();
        assert!(!report.interrupted);
        assert_eq!(report.summary.total_crawled, 3);
        assert_eq!(report.summary.total_failed, 0);
        // The link back to the root is an exact duplicate.
        assert_eq!(fetcher.fetch_count(), 3);
        assert!(dir.path().join("results.jsonl").exists());
        assert!(report.checkpoint.is_some());
    }

    #[tokio::test]
    async fn test_crawl_emits_events() {
        let dir = tempdir().unwrap();
        let mut crawler = Crawler::with_fetcher(
            test_config(dir.path()),
            "https://example.com/",
            small_site(),
        )
        .unwrap();
        let mut events = crawler.subscribe_events(64);

        let report = crawler.run().await.unwrap();
        assert!(!report.interrupted);

        let mut saw_started = false;
        let mut crawled = 0usize;
        let mut saw_completed = false;
        while let Some(event) = events.recv().await {
            match event {
                CrawlEvent::Started { .. } => saw_started = true,
                CrawlEvent::PageCrawled { .. } => crawled += 1,
                CrawlEvent::Completed { .. } => saw_completed = true,
                _ => {}
            }
        }
        assert!(saw_started);
        assert_eq!(crawled, 3);
        assert!(saw_completed);
    }

    #[tokio::test]
    async fn test_deadline_interrupts_and_checkpoints() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.crawl.deadline_secs = Some(0);
        let crawler =
            Crawler::with_fetcher(config, "https://example.com/", small_site()).unwrap();

        let report = crawler.run().await.unwrap();
        assert!(report.interrupted);
        assert!(report.checkpoint.is_some());
    }

    #[tokio::test]
    async fn test_failed_fetch_counted() {
        struct FailingFetcher;

        #[async_trait]
        impl Fetcher for FailingFetcher {
            async fn fetch(
                &self,
                _url: &CanonicalUrl,
                _options: &FetchOptions,
            ) -> Result<FetchResponse, FetchError> {
                Err(FetchError::Dns)
            }
        }

        let dir = tempdir().unwrap();
        let crawler = Crawler::with_fetcher(
            test_config(dir.path()),
            "https://example.com/",
            Arc::new(FailingFetcher),
        )
        .unwrap();

        let report = crawler.run().await.unwrap();
        assert_eq!(report.summary.total_crawled, 0);
        assert_eq!(report.summary.total_failed, 1);
    }

    #[tokio::test]
    async fn test_resume_skips_visited() {
        let dir = tempdir().unwrap();
        let fetcher = small_site();
        let crawler = Crawler::with_fetcher(
            test_config(dir.path()),
            "https://example.com/",
            fetcher.clone(),
        )
        .unwrap();

        // The root was already crawled; /about is still pending.
        let mut state = CrawlState::new(
            "resume-test".into(),
            "https://example.com/".into(),
            3,
        );
        state.transition(CrawlStatus::Running).unwrap();
        state.transition(CrawlStatus::Paused).unwrap();
        state.visited_urls.push("https://example.com/".into());
        state.total_crawled = 1;
        state.pending_urls.push(FrontierEntry {
            url: canonicalize("https://example.com/about").unwrap(),
            depth: 1,
            discovered_at: 1,
            is_internal: true,
            has_params: false,
            priority_score: 10.0,
            value_type: crate::types::ResourceClass::Html,
            discovered_by: DiscoverySource::Link,
        });

        let report = crawler.resume(state).await.unwrap();
        assert!(!report.interrupted);
        // Only /about is fetched; its link back to the root stays
        // deduplicated, and /admin was never discovered.
        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(report.summary.total_crawled, 1);
    }

    #[tokio::test]
    async fn test_resume_rejects_finished_crawl() {
        let dir = tempdir().unwrap();
        let crawler = Crawler::with_fetcher(
            test_config(dir.path()),
            "https://example.com/",
            small_site(),
        )
        .unwrap();
        let mut state = CrawlState::new("done".into(), "https://example.com/".into(), 3);
        state.transition(CrawlStatus::Running).unwrap();
        state.transition(CrawlStatus::Completed).unwrap();

        assert!(matches!(
            crawler.resume(state).await,
            Err(CrawlerError::AlreadyFinished(_))
        ));
    }

    #[test]
    fn test_task_id_shape() {
        let id = generate_task_id("sub.example.com");
        assert!(id.starts_with("sub-example-com-"));
        assert_eq!(id.len(), "sub-example-com-".len() + 8);
    }

    #[test]
    fn test_cookie_file_resolution() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, "session=abc123\n").unwrap();

        let mut config = Config::default();
        config.crawl.cookie_file = Some(path);
        assert_eq!(
            resolve_cookie(&config).unwrap(),
            Some("session=abc123".to_string())
        );
    }
}
