//! In-memory request metrics for the `/metrics` endpoint and `status` output.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::pipeline::types::DecisionRecord;

/// Number of artifacts listed in `top_artifacts`.
const TOP_ARTIFACTS: usize = 5;

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    approved_requests: u64,
    denied_requests: u64,
    escalations: u64,
    errors: u64,
    artifacts_shared: HashMap<String, u64>,
    total_processing: Duration,
}

/// Point-in-time metrics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    /// Requests where nothing was approved.
    pub denied_requests: u64,
    /// Percentage of requests with at least one approved artifact.
    pub approval_rate: f64,
    /// Percentage of requests routed to a human.
    pub escalation_rate: f64,
    pub avg_processing_ms: f64,
    /// Most frequently shared artifacts, most shared first.
    pub top_artifacts: Vec<(String, u64)>,
    pub error_count: u64,
}

/// Thread-safe counters, owned by the caller layer (the pipeline keeps none).
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: Mutex<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one decision and how long it took.
    pub fn record(&self, record: &DecisionRecord, elapsed: Duration) {
        let mut c = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        c.total_requests += 1;
        if record.approved_artifacts.is_empty() {
            c.denied_requests += 1;
        } else {
            c.approved_requests += 1;
        }
        if record.requires_human_review {
            c.escalations += 1;
        }
        for id in &record.approved_artifacts {
            *c.artifacts_shared.entry(id.clone()).or_default() += 1;
        }
        c.total_processing += elapsed;
    }

    /// Record a request that could not be processed (e.g. unparseable input).
    pub fn record_error(&self) {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .errors += 1;
    }

    pub fn summary(&self) -> MetricsSummary {
        let c = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let total = c.total_requests;
        let pct = |n: u64| {
            if total == 0 {
                0.0
            } else {
                n as f64 / total as f64 * 100.0
            }
        };

        let mut top: Vec<(String, u64)> = c
            .artifacts_shared
            .iter()
            .map(|(id, n)| (id.clone(), *n))
            .collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top.truncate(TOP_ARTIFACTS);

        MetricsSummary {
            total_requests: total,
            denied_requests: c.denied_requests,
            approval_rate: pct(c.approved_requests),
            escalation_rate: pct(c.escalations),
            avg_processing_ms: if total == 0 {
                0.0
            } else {
                c.total_processing.as_secs_f64() * 1000.0 / total as f64
            },
            top_artifacts: top,
            error_count: c.errors,
        }
    }
}
