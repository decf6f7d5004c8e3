//! Metrics Collection Module
//!
//! Lock-free counters for the dispatch path. Counters are monotonically
//! increasing; a snapshot is taken for status reporting.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the dispatcher.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Executions actually handed to the executor (one per in-flight group).
    pub executions: AtomicU64,
    /// Callers served by joining an existing in-flight group.
    pub coalesced_waiters: AtomicU64,
    /// Callers served straight from the cache.
    pub cache_hits: AtomicU64,
    /// Waiters whose bound elapsed before delivery.
    pub timeouts: AtomicU64,
    /// Waiters woken by an abandoned execution.
    pub abandoned: AtomicU64,
    /// Status-service calls answered inline.
    pub status_calls: AtomicU64,
}

/// Point-in-time copy of the dispatch counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub executions: u64,
    pub coalesced_waiters: u64,
    pub cache_hits: u64,
    pub timeouts: u64,
    pub abandoned: u64,
    pub status_calls: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            coalesced_waiters: self.coalesced_waiters.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            status_calls: self.status_calls.load(Ordering::Relaxed),
        }
    }

    pub fn record_execution(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced_waiter(&self) {
        self.coalesced_waiters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status_call(&self) {
        self.status_calls.fetch_add(1, Ordering::Relaxed);
    }
}
