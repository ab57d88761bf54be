use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How a single request left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected,
    RateLimited,
    PublishFailed,
    InternalError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub rate_limited: u64,
    pub publish_failures: u64,
    pub internal_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    rate_limited: AtomicU64,
    publish_failures: AtomicU64,
    internal_errors: AtomicU64,
}

/// Process-wide request counters. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    counters: Arc<Counters>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: Outcome) {
        let counters = &self.counters;
        counters.received.fetch_add(1, Ordering::Relaxed);

        let counter = match outcome {
            Outcome::Accepted => &counters.accepted,
            Outcome::Rejected => &counters.rejected,
            Outcome::RateLimited => &counters.rate_limited,
            Outcome::PublishFailed => &counters.publish_failures,
            Outcome::InternalError => &counters.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = &self.counters;
        MetricsSnapshot {
            received: counters.received.load(Ordering::Relaxed),
            accepted: counters.accepted.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            rate_limited: counters.rate_limited.load(Ordering::Relaxed),
            publish_failures: counters.publish_failures.load(Ordering::Relaxed),
            internal_errors: counters.internal_errors.load(Ordering::Relaxed),
        }
    }
}
