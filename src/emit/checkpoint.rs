//! Crawl checkpoints
//!
//! Periodic snapshots of crawl state so an interrupted run can resume
//! without refetching. Saves go through a temp file and an atomic
//! rename so a crash mid-write never corrupts the last good
//! checkpoint.

use crate::frontier::FrontierEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Lists capped at this many entries to bound checkpoint size.
const MAX_DISCOVERED_ENTRIES: usize = 10_000;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("checkpoint not found: {0}")]
    NotFound(String),
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: CrawlStatus, to: CrawlStatus },
}

/// Crawl lifecycle status. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Initializing,
    Running,
    Paused,
    Completed,
    Failed,
}

impl CrawlStatus {
    pub fn can_transition_to(self, next: CrawlStatus) -> bool {
        use CrawlStatus::*;
        matches!(
            (self, next),
            (Initializing, Running)
                | (Initializing, Failed)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Paused, Running)
                | (Paused, Completed)
                | (Paused, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CrawlStatus::Completed | CrawlStatus::Failed)
    }
}

/// Everything a resumed crawl needs: pending frontier entries, the
/// visited set, failure counts and the discovered artifact lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlState {
    pub task_id: String,
    pub target: String,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub status: CrawlStatus,
    pub current_depth: usize,
    pub max_depth: usize,
    pub total_crawled: usize,
    pub pending_urls: Vec<FrontierEntry>,
    pub visited_urls: Vec<String>,
    /// URL to consecutive failure count.
    pub failed_urls: HashMap<String, u32>,
    pub discovered_apis: Vec<String>,
    pub discovered_forms: Vec<String>,
    pub discovered_subdomains: Vec<String>,
}

impl CrawlState {
    pub fn new(task_id: String, target: String, max_depth: usize) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            target,
            start_time: now,
            last_update: now,
            status: CrawlStatus::Initializing,
            current_depth: 0,
            max_depth,
            total_crawled: 0,
            pending_urls: Vec::new(),
            visited_urls: Vec::new(),
            failed_urls: HashMap::new(),
            discovered_apis: Vec::new(),
            discovered_forms: Vec::new(),
            discovered_subdomains: Vec::new(),
        }
    }

    pub fn transition(&mut self, next: CrawlStatus) -> Result<(), CheckpointError> {
        if !self.status.can_transition_to(next) {
            return Err(CheckpointError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.last_update = Utc::now();
        Ok(())
    }

    /// Cap the discovered artifact lists so a large crawl cannot
    /// balloon the checkpoint file. `visited_urls` is never truncated:
    /// resume replays it into the dedup stack, and a dropped entry
    /// would be refetched.
    pub fn truncate_lists(&mut self) {
        self.discovered_apis.truncate(MAX_DISCOVERED_ENTRIES);
        self.discovered_forms.truncate(MAX_DISCOVERED_ENTRIES);
        self.discovered_subdomains.truncate(MAX_DISCOVERED_ENTRIES);
    }
}

/// Saves, loads and lists checkpoint files under one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn checkpoint_path(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}_checkpoint.json"))
    }

    /// Write via temp file then rename so readers never observe a
    /// partial checkpoint.
    pub fn save(&self, state: &CrawlState) -> Result<PathBuf, CheckpointError> {
        let path = self.checkpoint_path(&state.task_id);
        let tmp = self.dir.join(format!(".{}_checkpoint.json.tmp", state.task_id));
        let json = serde_json::to_vec_pretty(state)?;
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &path)?;
        debug!(task_id = %state.task_id, path = %path.display(), "checkpoint saved");
        Ok(path)
    }

    pub fn load(&self, task_id: &str) -> Result<CrawlState, CheckpointError> {
        let path = self.checkpoint_path(task_id);
        if !path.exists() {
            return Err(CheckpointError::NotFound(task_id.to_string()));
        }
        let data = fs::read(&path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// All checkpoints under the directory, unreadable files skipped
    /// with a warning.
    pub fn list(&self) -> Result<Vec<CrawlState>, CheckpointError> {
        let mut states = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !is_checkpoint_file(&path) {
                continue;
            }
            match fs::read(&path).map_err(CheckpointError::from).and_then(|data| {
                serde_json::from_slice::<CrawlState>(&data).map_err(CheckpointError::from)
            }) {
                Ok(state) => states.push(state),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable checkpoint"),
            }
        }
        states.sort_by(|a, b| b.last_update.cmp(&a.last_update));
        Ok(states)
    }

    pub fn delete(&self, task_id: &str) -> Result<(), CheckpointError> {
        let path = self.checkpoint_path(task_id);
        if !path.exists() {
            return Err(CheckpointError::NotFound(task_id.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

fn is_checkpoint_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| !n.starts_with('.') && n.ends_with("_checkpoint.json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::types::{DiscoverySource, ResourceClass};
    use tempfile::tempdir;

    fn sample_state(task_id: &str) -> CrawlState {
        let mut state = CrawlState::new(task_id.into(), "https://example.com".into(), 3);
        state.pending_urls.push(FrontierEntry {
            url: canonicalize("https://example.com/next").unwrap(),
            depth: 1,
            discovered_at: 7,
            is_internal: true,
            has_params: false,
            priority_score: 9.5,
            value_type: ResourceClass::Html,
            discovered_by: DiscoverySource::Link,
        });
        state.visited_urls.push("https://example.com/".into());
        state.total_crawled = 1;
        state
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let mut state = sample_state("task1");
        state.transition(CrawlStatus::Running).unwrap();
        manager.save(&state).unwrap();

        let loaded = manager.load("task1").unwrap();
        assert_eq!(loaded.task_id, "task1");
        assert_eq!(loaded.status, CrawlStatus::Running);
        assert_eq!(loaded.pending_urls.len(), 1);
        assert_eq!(loaded.pending_urls[0].url.as_str(), "https://example.com/next");
        assert_eq!(loaded.total_crawled, 1);
    }

    #[test]
    fn test_load_missing_checkpoint() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        assert!(matches!(
            manager.load("absent"),
            Err(CheckpointError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        manager.save(&sample_state("a")).unwrap();
        manager.save(&sample_state("b")).unwrap();

        assert_eq!(manager.list().unwrap().len(), 2);
        manager.delete("a").unwrap();
        let remaining = manager.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].task_id, "b");
    }

    #[test]
    fn test_status_transitions() {
        let mut state = CrawlState::new("t".into(), "https://example.com".into(), 2);
        assert!(state.transition(CrawlStatus::Paused).is_err());
        state.transition(CrawlStatus::Running).unwrap();
        state.transition(CrawlStatus::Paused).unwrap();
        state.transition(CrawlStatus::Running).unwrap();
        state.transition(CrawlStatus::Completed).unwrap();
        assert!(state.status.is_terminal());
        assert!(state.transition(CrawlStatus::Running).is_err());
    }

    #[test]
    fn test_truncate_lists_caps_artifacts_not_visited() {
        let mut state = CrawlState::new("t".into(), "https://example.com".into(), 2);
        state.visited_urls = (0..20_000).map(|i| format!("https://example.com/{i}")).collect();
        state.discovered_apis = (0..20_000).map(|i| format!("https://example.com/api/{i}")).collect();
        state.truncate_lists();
        assert_eq!(state.visited_urls.len(), 20_000);
        assert_eq!(state.discovered_apis.len(), 10_000);
    }

    #[test]
    fn test_large_visited_set_survives_round_trip() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let mut state = sample_state("big");
        state.transition(CrawlStatus::Running).unwrap();
        state.visited_urls = (0..10_001)
            .map(|i| format!("https://example.com/p{i}"))
            .collect();
        state.truncate_lists();
        manager.save(&state).unwrap();

        let loaded = manager.load("big").unwrap();
        assert_eq!(loaded.visited_urls.len(), 10_001);
        assert!(loaded
            .visited_urls
            .contains(&"https://example.com/p10000".to_string()));
    }
}
