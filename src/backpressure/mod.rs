use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

/// How long each request holds its slot, accepted or not.
pub const RELEASE_AFTER: Duration = Duration::from_millis(100);

/// Outcome of one [`AdmissionGate::admit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub accepted: bool,
    /// Counter value right after this request was counted.
    pub current: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionSnapshot {
    pub current_requests: usize,
    pub max_concurrent_requests: usize,
    pub peak_requests: usize,
    pub accepted_total: u64,
    pub rejected_total: u64,
}

#[derive(Debug, Default)]
struct Counters {
    current: AtomicUsize,
    peak: AtomicUsize,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

/// Naive concurrency limiter for the payment v1 path.
///
/// Every request bumps a shared counter. Values above `max_concurrent` are
/// rejected. Each request's slot is released by a detached timer
/// `release_after` later, whatever the outcome. There is no queue and no
/// fairness.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    counters: Arc<Counters>,
    max_concurrent: usize,
    release_after: Duration,
}

impl AdmissionGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self::with_release(max_concurrent, RELEASE_AFTER)
    }

    pub fn with_release(max_concurrent: usize, release_after: Duration) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            max_concurrent,
            release_after,
        }
    }

    pub fn admit(&self) -> Admission {
        let current = self.counters.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(current, Ordering::Relaxed);

        let accepted = current <= self.max_concurrent;
        if accepted {
            self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        }

        let counters = Arc::clone(&self.counters);
        let release_after = self.release_after;
        tokio::spawn(async move {
            tokio::time::sleep(release_after).await;
            counters.current.fetch_sub(1, Ordering::SeqCst);
        });

        Admission { accepted, current }
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            current_requests: self.counters.current.load(Ordering::SeqCst),
            max_concurrent_requests: self.max_concurrent,
            peak_requests: self.counters.peak.load(Ordering::Relaxed),
            accepted_total: self.counters.accepted.load(Ordering::Relaxed),
            rejected_total: self.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rejects_above_ceiling() {
        let gate = AdmissionGate::new(8);
        let results: Vec<Admission> = (0..10).map(|_| gate.admit()).collect();

        let accepted = results.iter().filter(|a| a.accepted).count();
        assert_eq!(accepted, 8);
        assert!(!results[8].accepted);
        assert_eq!(results[9].current, 10);

        let snap = gate.snapshot();
        assert_eq!(snap.current_requests, 10);
        assert_eq!(snap.peak_requests, 10);
        assert_eq!(snap.accepted_total, 8);
        assert_eq!(snap.rejected_total, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slots_are_released_after_delay() {
        let gate = AdmissionGate::new(2);
        for _ in 0..3 {
            gate.admit();
        }
        assert!(!gate.admit().accepted);

        tokio::time::sleep(RELEASE_AFTER + Duration::from_millis(10)).await;
        assert_eq!(gate.snapshot().current_requests, 0);
        assert!(gate.admit().accepted);
        assert_eq!(gate.snapshot().peak_requests, 4);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let gate = AdmissionGate::new(8);
        let v = serde_json::to_value(gate.snapshot()).unwrap();
        assert_eq!(v["maxConcurrentRequests"], 8);
        assert_eq!(v["currentRequests"], 0);
    }
}
