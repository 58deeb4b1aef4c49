//! Work queue feeding association keys to reconcile workers
//!
//! A key is queued at most once; a key handed to a worker is not handed out
//! again until the worker calls [`WorkQueue::done`]. Keys added while in
//! flight are queued again on `done`. Delayed and rate-limited adds are
//! handled by timer tasks.

use assoc_types::NamespacedName;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Per-key exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retry number `failures` (0-based)
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(5), Duration::from_secs(1000))
    }
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<NamespacedName>,
    /// Keys waiting to be processed
    dirty: HashSet<NamespacedName>,
    /// Keys currently handed to a worker
    processing: HashSet<NamespacedName>,
    failures: HashMap<NamespacedName, u32>,
    shutting_down: bool,
}

/// De-duplicating queue with one in-flight item per key
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    backoff: Backoff,
}

impl WorkQueue {
    pub fn new(backoff: Backoff) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            backoff,
        })
    }

    pub async fn add(&self, key: NamespacedName) {
        {
            let mut state = self.state.lock().await;
            if state.shutting_down || state.dirty.contains(&key) {
                return;
            }
            state.dirty.insert(key.clone());
            if state.processing.contains(&key) {
                return;
            }
            state.queue.push_back(key);
        }
        self.notify.notify_one();
    }

    /// Add `key` once `delay` has elapsed
    pub fn add_after(self: &Arc<Self>, key: NamespacedName, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            queue.add(key).await;
        });
    }

    /// Add `key` after its backoff delay and count the failure
    pub async fn add_rate_limited(self: &Arc<Self>, key: NamespacedName) {
        let delay = {
            let mut state = self.state.lock().await;
            let failures = state.failures.entry(key.clone()).or_insert(0);
            let delay = self.backoff.delay(*failures);
            *failures = failures.saturating_add(1);
            delay
        };
        self.add_after(key, delay);
    }

    /// Reset the backoff of `key`
    pub async fn forget(&self, key: &NamespacedName) {
        self.state.lock().await.failures.remove(key);
    }

    pub async fn num_requeues(&self, key: &NamespacedName) -> u32 {
        self.state
            .lock()
            .await
            .failures
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Wait for the next key; `None` once the queue is shut down
    pub async fn get(&self) -> Option<NamespacedName> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Mark `key` as processed, re-queueing it if it was added meanwhile
    pub async fn done(&self, key: &NamespacedName) {
        let requeued = {
            let mut state = self.state.lock().await;
            state.processing.remove(key);
            if state.dirty.contains(key) && !state.shutting_down {
                state.queue.push_back(key.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_one();
        }
    }

    pub async fn shut_down(&self) {
        self.state.lock().await.shutting_down = true;
        self.notify.notify_waiters();
    }

    /// Number of keys waiting to be handed out
    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
