//! Global atomic counters for wizard observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a wizard session finishes).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    saves_flushed: AtomicU64,
    saves_failed: AtomicU64,
    generation_calls: AtomicU64,
    stale_responses: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            saves_flushed: AtomicU64::new(0),
            saves_failed: AtomicU64::new(0),
            generation_calls: AtomicU64::new(0),
            stale_responses: AtomicU64::new(0),
        }
    }

    pub fn inc_saves_flushed(&self) {
        self.saves_flushed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "saves_flushed", "counter incremented");
    }

    pub fn inc_saves_failed(&self) {
        self.saves_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "saves_failed", "counter incremented");
    }

    /// Counts every remote generation request, successful or not.
    pub fn inc_generation_calls(&self) {
        self.generation_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "generation_calls", "counter incremented");
    }

    pub fn inc_stale_responses(&self) {
        self.stale_responses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stale_responses", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            saves_flushed = self.saves_flushed(),
            saves_failed = self.saves_failed(),
            generation_calls = self.generation_calls(),
            stale_responses = self.stale_responses(),
        );
    }

    pub fn saves_flushed(&self) -> u64 {
        self.saves_flushed.load(Ordering::Relaxed)
    }

    pub fn saves_failed(&self) -> u64 {
        self.saves_failed.load(Ordering::Relaxed)
    }

    pub fn generation_calls(&self) -> u64 {
        self.generation_calls.load(Ordering::Relaxed)
    }

    pub fn stale_responses(&self) -> u64 {
        self.stale_responses.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.saves_flushed.store(0, Ordering::Relaxed);
        self.saves_failed.store(0, Ordering::Relaxed);
        self.generation_calls.store(0, Ordering::Relaxed);
        self.stale_responses.store(0, Ordering::Relaxed);
    }
}
