use crate::errors::DbError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub queries_rejected_total: AtomicU64,
    pub documents_returned_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_slow_total: u64,
    pub queries_rejected_total: u64,
    pub documents_returned_total: u64,
}

/// Per-engine query counters. Owned by the engine, never process-global.
pub struct Telemetry {
    slow_query_ms: AtomicU64,
    metrics: Metrics,
}

impl Telemetry {
    #[must_use]
    pub fn new(slow_query_ms: u64) -> Self {
        Self { slow_query_ms: AtomicU64::new(slow_query_ms), metrics: Metrics::default() }
    }

    pub fn set_slow_query_ms(&self, ms: u64) {
        self.slow_query_ms.store(ms, Ordering::Relaxed);
    }

    #[must_use]
    pub fn slow_query_ms(&self) -> u64 {
        self.slow_query_ms.load(Ordering::Relaxed)
    }

    /// Counts a completed query. A threshold of 0 disables slow-query reporting.
    pub fn record_query(&self, collection: &str, duration_ms: u64, returned: usize) {
        let m = &self.metrics;
        m.queries_total.fetch_add(1, Ordering::Relaxed);
        m.documents_returned_total
            .fetch_add(u64::try_from(returned).unwrap_or(u64::MAX), Ordering::Relaxed);
        let threshold = self.slow_query_ms();
        if threshold > 0 && duration_ms >= threshold {
            m.queries_slow_total.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                target: "firelite::metrics",
                "{}",
                serde_json::json!({
                    "event": "slow_query",
                    "collection": collection,
                    "duration_ms": duration_ms,
                    "threshold_ms": threshold,
                    "returned": returned,
                })
            );
        }
    }

    pub fn record_rejected(&self, err: &DbError) {
        self.metrics.queries_rejected_total.fetch_add(1, Ordering::Relaxed);
        log::info!(target: "firelite::metrics", "query rejected: {err}");
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let m = &self.metrics;
        MetricsSnapshot {
            queries_total: m.queries_total.load(Ordering::Relaxed),
            queries_slow_total: m.queries_slow_total.load(Ordering::Relaxed),
            queries_rejected_total: m.queries_rejected_total.load(Ordering::Relaxed),
            documents_returned_total: m.documents_returned_total.load(Ordering::Relaxed),
        }
    }

    /// OpenMetrics-style exposition (no TYPE/HELP lines).
    #[must_use]
    pub fn metrics_text(&self) -> String {
        let s = self.snapshot();
        format!(
            "firelite_queries_total {}\n\
             firelite_queries_slow_total {}\n\
             firelite_queries_rejected_total {}\n\
             firelite_documents_returned_total {}\n",
            s.queries_total, s.queries_slow_total, s.queries_rejected_total, s.documents_returned_total,
        )
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(500)
    }
}
