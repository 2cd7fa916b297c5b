//! Metrics collector — counts evaluation events.
//!
//! Lock-free: every counter is an atomic, so one collector can be shared by
//! evaluators running on different threads.

use std::sync::atomic::{AtomicU64, Ordering};

use offerfit_evaluator::{EvaluationMetrics, OperationKind, StageKind};
use tracing::debug;

/// Point-in-time copy of the collector's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub offers_accepted: u64,
    pub offers_declined: u64,
    /// Failures per stage, in pipeline order.
    pub stage_failures: Vec<(StageKind, u64)>,
    /// Emitted recommendations per operation kind.
    pub operations: Vec<(OperationKind, u64)>,
}

impl MetricsSnapshot {
    pub fn offers_evaluated(&self) -> u64 {
        self.offers_accepted + self.offers_declined
    }

    pub fn stage_failures_for(&self, stage: StageKind) -> u64 {
        self.stage_failures
            .iter()
            .find(|(k, _)| *k == stage)
            .map_or(0, |(_, n)| *n)
    }

    pub fn operations_for(&self, kind: OperationKind) -> u64 {
        self.operations
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, n)| *n)
    }
}

/// Counts offers, stage failures and emitted operations.
pub struct MetricsCollector {
    offers_accepted: AtomicU64,
    offers_declined: AtomicU64,
    /// Indexed like `StageKind::ALL`.
    stage_failures: [AtomicU64; StageKind::ALL.len()],
    /// Indexed like `OperationKind::ALL`.
    operations: [AtomicU64; OperationKind::ALL.len()],
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            offers_accepted: AtomicU64::new(0),
            offers_declined: AtomicU64::new(0),
            stage_failures: std::array::from_fn(|_| AtomicU64::new(0)),
            operations: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            offers_accepted: self.offers_accepted.load(Ordering::Relaxed),
            offers_declined: self.offers_declined.load(Ordering::Relaxed),
            stage_failures: StageKind::ALL
                .iter()
                .zip(&self.stage_failures)
                .map(|(k, n)| (*k, n.load(Ordering::Relaxed)))
                .collect(),
            operations: OperationKind::ALL
                .iter()
                .zip(&self.operations)
                .map(|(k, n)| (*k, n.load(Ordering::Relaxed)))
                .collect(),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.offers_accepted.store(0, Ordering::Relaxed);
        self.offers_declined.store(0, Ordering::Relaxed);
        for counter in self.stage_failures.iter().chain(&self.operations) {
            counter.store(0, Ordering::Relaxed);
        }
        debug!("evaluation metrics reset");
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationMetrics for MetricsCollector {
    fn offer_evaluated(&self, passed: bool) {
        let counter = if passed {
            &self.offers_accepted
        } else {
            &self.offers_declined
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn stage_failed(&self, stage: StageKind) {
        if let Some(i) = StageKind::ALL.iter().position(|k| *k == stage) {
            self.stage_failures[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    fn recommendation_emitted(&self, kind: OperationKind) {
        if let Some(i) = OperationKind::ALL.iter().position(|k| *k == kind) {
            self.operations[i].fetch_add(1, Ordering::Relaxed);
        }
    }
}
