//! Simulated asynchronous processing.
//!
//! Creating or updating a record schedules a background completion that
//! sleeps for a policy-chosen delay and then flips the record to COMPLETED
//! or FAILED. Deletions are delayed the same way. Every background unit is
//! tracked by a [`TaskSupervisor`] so shutdown can cancel and drain them.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::models::{Outcome, Resource};
use crate::store::ResourceStore;

/// Fixed delay between a DELETE request and the actual removal.
pub const DELETE_DELAY: Duration = Duration::from_secs(2);

// ── Policy ────────────────────────────────────────────────────────────────────

/// Decides how long a simulated completion takes and how it ends.
pub trait CompletionPolicy: Send + Sync + 'static {
    fn delay(&self) -> Duration;
    fn outcome(&self) -> Outcome;
}

/// Uniform whole-second delay and a fixed failure probability.
#[derive(Debug, Clone)]
pub struct RandomCompletion {
    pub delay_secs: RangeInclusive<u64>,
    pub failure_rate: f64,
}

impl RandomCompletion {
    /// 1–5 s, 10 % failures.
    pub fn devices() -> Self {
        Self {
            delay_secs: 1..=5,
            failure_rate: 0.10,
        }
    }

    /// 2–8 s, 5 % failures.
    pub fn orders() -> Self {
        Self {
            delay_secs: 2..=8,
            failure_rate: 0.05,
        }
    }
}

impl CompletionPolicy for RandomCompletion {
    fn delay(&self) -> Duration {
        Duration::from_secs(rand::thread_rng().gen_range(self.delay_secs.clone()))
    }

    fn outcome(&self) -> Outcome {
        if rand::thread_rng().gen_bool(self.failure_rate) {
            Outcome::Failed
        } else {
            Outcome::Completed
        }
    }
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// Owns the cancellation token and tracker shared by all background work.
#[derive(Debug, Clone, Default)]
pub struct TaskSupervisor {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Cancels every pending unit and waits up to `grace` for them to finish.
    /// Returns false if the grace period ran out first.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        info!(pending = self.tracker.len(), "Cancelling background tasks");
        self.token.cancel();
        self.tracker.close();
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}

// ── Simulator ─────────────────────────────────────────────────────────────────

/// Schedules simulated completions and deletions for one resource kind.
pub struct Simulator<R> {
    store: ResourceStore<R>,
    policy: Arc<dyn CompletionPolicy>,
    tasks: TaskSupervisor,
}

impl<R> Clone for Simulator<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policy: Arc::clone(&self.policy),
            tasks: self.tasks.clone(),
        }
    }
}

impl<R: Resource> Simulator<R> {
    pub fn new(
        store: ResourceStore<R>,
        policy: Arc<dyn CompletionPolicy>,
        tasks: TaskSupervisor,
    ) -> Self {
        Self {
            store,
            policy,
            tasks,
        }
    }

    /// Fire-and-forget completion for `id`.
    ///
    /// After the delay the record is re-read; a removed record is left alone.
    /// Cancellation while waiting marks a still-present record FAILED.
    pub fn schedule(&self, id: &str) {
        let id = id.to_string();
        let delay = self.policy.delay();
        let policy = Arc::clone(&self.policy);
        let store = self.store.clone();
        let token = self.tasks.token().clone();

        debug!(kind = R::KIND, id = %id, delay_ms = delay.as_millis() as u64, "Scheduled completion");

        self.tasks.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    if store.update(&id, |r| r.finish(Outcome::Failed)).await.is_some() {
                        warn!(kind = R::KIND, id = %id, "Processing interrupted");
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    let outcome = policy.outcome();
                    match store.update(&id, |r| r.finish(outcome)).await {
                        Some(_) if outcome == Outcome::Failed => {
                            warn!(kind = R::KIND, id = %id, "Processing failed");
                        }
                        Some(_) => info!(kind = R::KIND, id = %id, "Processing completed"),
                        None => debug!(kind = R::KIND, id = %id, "Record gone before completion"),
                    }
                }
            }
        });
    }

    /// Marks the record PROCESSING and removes it after `delay`.
    ///
    /// Returns false when `id` is not stored. Once scheduled the removal
    /// always happens; on shutdown it happens immediately.
    pub async fn delete_after(&self, id: &str, delay: Duration) -> bool {
        if self.store.update(id, |r| r.mark_processing()).await.is_none() {
            return false;
        }

        let id = id.to_string();
        let store = self.store.clone();
        let token = self.tasks.token().clone();

        self.tasks.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
            if store.remove(&id).await.is_some() {
                info!(kind = R::KIND, id = %id, "Deleted");
            }
        });

        true
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Deterministic policy for tests.
    #[derive(Debug, Clone)]
    pub struct FixedCompletion {
        pub delay: Duration,
        pub outcome: Outcome,
    }

    impl FixedCompletion {
        pub fn new(delay: Duration, outcome: Outcome) -> Arc<Self> {
            Arc::new(Self { delay, outcome })
        }
    }

    impl CompletionPolicy for FixedCompletion {
        fn delay(&self) -> Duration {
            self.delay
        }

        fn outcome(&self) -> Outcome {
            self.outcome
        }
    }
}
