//! Result emission
//!
//! Fan-out of crawl results to sinks over bounded queues, plus the
//! crawl event stream consumed by the CLI progress bar. A slow or
//! failing sink is logged and skipped; it never stalls workers beyond
//! its queue's capacity.

mod checkpoint;
mod sinks;

pub use checkpoint::{CheckpointError, CheckpointManager, CrawlState, CrawlStatus};
pub use sinks::{CsvSink, HtmlReportSink, JsonlSink, TextSummarySink};

use crate::stats::StatsSnapshot;
use crate::types::{Finding, PageResult, Summary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lifecycle and progress events, serialized as internally-tagged
/// JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    Started {
        task_id: String,
        target: String,
        at: DateTime<Utc>,
    },
    Progress {
        stats: StatsSnapshot,
        frontier_size: usize,
        current_depth: usize,
    },
    PageCrawled {
        url: String,
        status: u16,
        depth: usize,
    },
    CheckpointSaved {
        path: String,
    },
    Paused,
    Resumed,
    Completed {
        summary: Summary,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A result consumer. File sinks implement this; so could a database
/// writer.
pub trait Sink: Send {
    fn name(&self) -> &'static str;

    fn on_result(&mut self, result: &PageResult) -> Result<(), SinkError>;

    fn on_sensitive(&mut self, _finding: &Finding) -> Result<(), SinkError> {
        Ok(())
    }

    fn on_complete(&mut self, summary: &Summary) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

enum SinkMessage {
    Result(Arc<PageResult>),
    Finding(Arc<Finding>),
    Complete(Box<Summary>),
}

/// Owns one bounded channel per sink and a writer task draining it.
pub struct Emitter {
    senders: Vec<mpsc::Sender<SinkMessage>>,
    handles: Vec<JoinHandle<()>>,
}

impl Emitter {
    /// Spawn one writer task per sink. Buffers are flushed after
    /// `flush_every` results and at least every `flush_interval`.
    pub fn new(
        sinks: Vec<Box<dyn Sink>>,
        queue_capacity: usize,
        flush_every: usize,
        flush_interval: std::time::Duration,
    ) -> Self {
        let mut senders = Vec::with_capacity(sinks.len());
        let mut handles = Vec::with_capacity(sinks.len());
        for mut sink in sinks {
            let (tx, mut rx) = mpsc::channel::<SinkMessage>(queue_capacity);
            senders.push(tx);
            handles.push(tokio::spawn(async move {
                let mut since_flush = 0usize;
                let mut interval = tokio::time::interval(flush_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        message = rx.recv() => {
                            let Some(message) = message else { break };
                            match message {
                                SinkMessage::Result(result) => {
                                    if let Err(e) = sink.on_result(&result) {
                                        warn!(sink = sink.name(), error = %e, "sink write failed");
                                    }
                                    since_flush += 1;
                                    if since_flush >= flush_every {
                                        since_flush = 0;
                                        if let Err(e) = sink.flush() {
                                            warn!(sink = sink.name(), error = %e, "sink flush failed");
                                        }
                                    }
                                }
                                SinkMessage::Finding(finding) => {
                                    if let Err(e) = sink.on_sensitive(&finding) {
                                        warn!(sink = sink.name(), error = %e, "sink write failed");
                                    }
                                }
                                SinkMessage::Complete(summary) => {
                                    if let Err(e) = sink.on_complete(&summary) {
                                        warn!(sink = sink.name(), error = %e, "sink completion failed");
                                    }
                                    if let Err(e) = sink.flush() {
                                        warn!(sink = sink.name(), error = %e, "sink flush failed");
                                    }
                                    break;
                                }
                            }
                        }
                        _ = interval.tick() => {
                            if since_flush > 0 {
                                since_flush = 0;
                                if let Err(e) = sink.flush() {
                                    warn!(sink = sink.name(), error = %e, "sink flush failed");
                                }
                            }
                        }
                    }
                }
                debug!(sink = sink.name(), "sink task finished");
            }));
        }
        Self { senders, handles }
    }

    /// Fan a result out to every sink, waiting on full queues.
    pub async fn emit_result(&self, result: Arc<PageResult>) {
        for sender in &self.senders {
            if sender.send(SinkMessage::Result(Arc::clone(&result))).await.is_err() {
                warn!("sink queue closed, result dropped");
            }
        }
    }

    pub async fn emit_finding(&self, finding: Arc<Finding>) {
        for sender in &self.senders {
            let _ = sender.send(SinkMessage::Finding(Arc::clone(&finding))).await;
        }
    }

    /// Deliver the final summary and wait for every sink to finish.
    pub async fn complete(self, summary: Summary) {
        for sender in &self.senders {
            let _ = sender
                .send(SinkMessage::Complete(Box::new(summary.clone())))
                .await;
        }
        drop(self.senders);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::types::{DiscoverySource, ResourceClass};
    use parking_lot::Mutex;

    struct RecordingSink {
        results: Arc<Mutex<Vec<String>>>,
        completed: Arc<Mutex<bool>>,
    }

    impl Sink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn on_result(&mut self, result: &PageResult) -> Result<(), SinkError> {
            self.results.lock().push(result.url.as_str().to_string());
            Ok(())
        }

        fn on_complete(&mut self, _summary: &Summary) -> Result<(), SinkError> {
            *self.completed.lock() = true;
            Ok(())
        }
    }

    fn sample_result(path: &str) -> Arc<PageResult> {
        Arc::new(PageResult::skeletal(
            canonicalize(&format!("https://example.com{path}")).unwrap(),
            format!("https://example.com{path}"),
            200,
            vec![],
            Some("text/html".into()),
            ResourceClass::Html,
            1,
            DiscoverySource::Link,
            5,
            100,
        ))
    }

    fn sample_summary() -> Summary {
        Summary {
            task_id: "t1".into(),
            target: "https://example.com".into(),
            total_crawled: 2,
            total_failed: 0,
            total_skipped: 0,
            apis_found: 0,
            forms_found: 0,
            subdomains_found: 0,
            external_links: 0,
            duration_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_fan_out_and_complete() {
        let results = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(Mutex::new(false));
        let sink = RecordingSink {
            results: Arc::clone(&results),
            completed: Arc::clone(&completed),
        };
        let emitter = Emitter::new(
            vec![Box::new(sink)],
            16,
            10,
            std::time::Duration::from_secs(5),
        );
        emitter.emit_result(sample_result("/a")).await;
        emitter.emit_result(sample_result("/b")).await;
        emitter.complete(sample_summary()).await;

        assert_eq!(
            *results.lock(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
        assert!(*completed.lock());
    }

    #[test]
    fn test_event_serialization_tagged() {
        let event = CrawlEvent::PageCrawled {
            url: "https://example.com/".into(),
            status: 200,
            depth: 0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"page_crawled\""));
        assert!(json.contains("\"status\":200"));
    }
}
