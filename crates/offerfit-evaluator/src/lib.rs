//! offerfit-evaluator — matches pod requirements against resource offers.
//!
//! Given a [`PodInstanceRequirement`], a batch of offers and the round's
//! launched-task snapshot, the [`OfferEvaluator`] finds the first offer that
//! can host every planned task and returns the ordered RESERVE, UNRESERVE,
//! CREATE, DESTROY and LAUNCH operations to apply to it.
//!
//! # Architecture
//!
//! ```text
//! OfferEvaluator::evaluate
//!   └── select_first_fit (offers in input order)
//!         └── evaluate_offer (fresh ResourcePool + PodInfoBuilder)
//!               └── per task: placement → executor → resource* → volume*
//!                             → ports → tls → reclaim → launch
//! ```
//!
//! # Components
//!
//! - **`pool`** — per-offer reserved/unreserved bookkeeping
//! - **`pod`** — pod specs and the requirement to launch part of one
//! - **`pod_info`** — task drafts and pod-level state built up by stages
//! - **`stages`** — the evaluation stages
//! - **`evaluator`** — trial orchestration and recommendation flattening
//! - **`tls`** — the artifact issuer contract used by the TLS stage
//! - **`metrics`** — the sink the evaluator reports to

pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod outcome;
pub mod pod;
pub mod pod_info;
pub mod pool;
pub mod recommendation;
pub mod stages;
pub mod tls;

pub use error::{EvaluatorError, EvaluatorResult};
pub use evaluator::OfferEvaluator;
pub use metrics::{EvaluationMetrics, NoopMetrics, StageKind};
pub use outcome::EvaluationOutcome;
pub use pod::{
    DeployKind, EncryptionKind, GoalState, PodInstanceRequirement, PodSpec, PortSpec,
    ReservationSpec, ResourceSet, ResourceSpec, TaskSpec, TransportEncryptionSpec, VipSpec,
    VolumeKind, VolumeSpec,
};
pub use pod_info::{PodInfoBuilder, PodState, TaskDraft};
pub use pool::ResourcePool;
pub use recommendation::{OfferRecommendation, Operation, OperationKind};
pub use stages::{EvaluationStage, StageContext};
pub use tls::{BoxFuture, TlsArtifactIssuer, TlsIssueError, TlsIssueResult, TlsRequest};
