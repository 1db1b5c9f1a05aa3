//! Observability counters.
//!
//! Four contract-named counters, `AtomicU64`-backed so they can be shared
//! between the aggregator actor thread and anything reading them (a status
//! endpoint, the harness binary's periodic print) without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Snapshot of all four counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CounterSnapshot {
    pub payloads_in: u64,
    pub flushed_payloads: u64,
    pub flushed_buckets: u64,
    pub flush_errors: u64,
}

/// `Arc`-shareable counter set. Field names match the dotted metric names
/// reported upstream, with dots replaced by underscores.
#[derive(Debug, Default)]
pub struct Counters {
    payloads_in: AtomicU64,
    flushed_payloads: AtomicU64,
    flushed_buckets: AtomicU64,
    flush_errors: AtomicU64,
}

impl Counters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn incr_payloads_in(&self) {
        self.payloads_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_flushed_payloads(&self) {
        self.flushed_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_flushed_buckets(&self, n: u64) {
        self.flushed_buckets.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_flush_errors(&self) {
        self.flush_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            payloads_in: self.payloads_in.load(Ordering::Relaxed),
            flushed_payloads: self.flushed_payloads.load(Ordering::Relaxed),
            flushed_buckets: self.flushed_buckets.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
        }
    }
}
