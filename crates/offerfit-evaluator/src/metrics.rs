//! Metrics sink injected into the evaluator.
//!
//! The evaluator only reports events; counting and exposition live in
//! whatever implements [`EvaluationMetrics`].

use std::fmt;

use crate::recommendation::OperationKind;

/// Which evaluation stage produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Placement,
    Executor,
    Resource,
    Volume,
    Ports,
    Tls,
    Reclaim,
    Launch,
}

impl StageKind {
    pub const ALL: [StageKind; 8] = [
        StageKind::Placement,
        StageKind::Executor,
        StageKind::Resource,
        StageKind::Volume,
        StageKind::Ports,
        StageKind::Tls,
        StageKind::Reclaim,
        StageKind::Launch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Placement => "placement",
            StageKind::Executor => "executor",
            StageKind::Resource => "resource",
            StageKind::Volume => "volume",
            StageKind::Ports => "ports",
            StageKind::Tls => "tls",
            StageKind::Reclaim => "reclaim",
            StageKind::Launch => "launch",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives evaluation events.
pub trait EvaluationMetrics: Send + Sync {
    /// One (requirement, offer) trial finished.
    fn offer_evaluated(&self, passed: bool);

    /// A stage failed a task.
    fn stage_failed(&self, stage: StageKind);

    /// A recommendation was returned to the caller.
    fn recommendation_emitted(&self, kind: OperationKind);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl EvaluationMetrics for NoopMetrics {
    fn offer_evaluated(&self, _passed: bool) {}

    fn stage_failed(&self, _stage: StageKind) {}

    fn recommendation_emitted(&self, _kind: OperationKind) {}
}
