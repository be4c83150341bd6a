//! Worker pool primitives
//!
//! The crawler spawns a fixed number of worker tasks; this module
//! supplies the pieces they share: the global token bucket, the retry
//! policy with adaptive timeouts, an in-flight task counter used to
//! detect drain, a cancellation signal, and a pause gate.

mod rate;
mod retry;

pub use rate::TokenBucket;
pub use retry::{AdaptiveTimeout, RetryPolicy};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};

/// Counts in-flight work so the crawler can tell "frontier empty"
/// apart from "crawl finished".
pub struct ActiveTasks {
    count: AtomicUsize,
    notify: Notify,
}

impl Default for ActiveTasks {
    fn default() -> Self {
        Self {
            count: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }
}

impl ActiveTasks {
    /// Mark one task active for the guard's lifetime.
    pub fn guard(self: &Arc<Self>) -> ActiveTaskGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        ActiveTaskGuard {
            tasks: Arc::clone(self),
        }
    }

    pub fn active(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait until no task is active.
    pub async fn wait_idle(&self) {
        loop {
            if self.active() == 0 {
                return;
            }
            self.notify.notified().await;
            if self.active() == 0 {
                return;
            }
        }
    }
}

pub struct ActiveTaskGuard {
    tasks: Arc<ActiveTasks>,
}

impl Drop for ActiveTaskGuard {
    fn drop(&mut self) {
        if self.tasks.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tasks.notify.notify_waiters();
        }
    }
}

/// One-shot cancellation signal fanned out to every worker.
#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }
}

impl Shutdown {
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve when the shutdown signal fires.
    pub async fn wait(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Pause gate: workers drain their in-flight request, then park here
/// until resumed.
pub struct PauseGate {
    sender: watch::Sender<bool>,
}

impl Default for PauseGate {
    fn default() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }
}

impl PauseGate {
    pub fn pause(&self) {
        let _ = self.sender.send(true);
    }

    pub fn resume(&self) {
        let _ = self.sender.send(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.sender.borrow()
    }

    /// Park while paused; returns immediately when running.
    pub async fn wait_if_paused(&self) {
        let mut receiver = self.sender.subscribe();
        while *receiver.borrow() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_active_tasks_guard_decrements_on_drop() {
        let tasks = Arc::new(ActiveTasks::default());
        {
            let _a = tasks.guard();
            let _b = tasks.guard();
            assert_eq!(tasks.active(), 2);
        }
        assert_eq!(tasks.active(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_blocks_until_guards_drop() {
        let tasks = Arc::new(ActiveTasks::default());
        let guard = tasks.guard();
        let waiter = {
            let tasks = Arc::clone(&tasks);
            tokio::spawn(async move { tasks.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_idle should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_wakes_listeners() {
        let shutdown = Shutdown::default();
        let mut listener = shutdown.subscribe();
        let waiter = tokio::spawn(async move { listener.wait().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("listener should wake")
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_pause_gate_parks_and_resumes() {
        let gate = Arc::new(PauseGate::default());
        gate.wait_if_paused().await;

        gate.pause();
        let parked = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait_if_paused().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!parked.is_finished());
        gate.resume();
        tokio::time::timeout(Duration::from_secs(1), parked)
            .await
            .expect("worker should resume")
            .unwrap();
    }
}
