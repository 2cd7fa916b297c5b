//! Evaluation stages.
//!
//! Each task of a requirement runs the same fixed sequence against one offer:
//! placement, executor, resources, volumes, ports, TLS, reclamation, launch.
//! Stages share one [`ResourcePool`] and one [`PodInfoBuilder`] and must run
//! strictly in order; a failing stage ends its task's sequence.
//!
//! # Components
//!
//! - **`placement`** — runs the pod's placement rule and narrows the pool
//! - **`executor`** — reuses a running executor or reserves one per pod
//! - **`resource`** — reserve/unreserve deltas for named resources
//! - **`volume`** — disk reservations and persistent volume creation
//! - **`port`** — static and dynamic ports, env vars, discovery and VIPs
//! - **`tls`** — TLS artifact issuance through the injected issuer
//! - **`reclaim`** — releases reservations the task no longer needs
//! - **`launch`** — durable labels and the final `TaskInfo`

mod executor;
mod launch;
mod placement;
mod port;
mod reclaim;
mod resource;
mod tls;
mod volume;

use offerfit_core::{EvaluatorConfig, Offer, TaskInfo};
use offerfit_placement::PlacementRule;
use tracing::debug;

use crate::metrics::StageKind;
use crate::outcome::EvaluationOutcome;
use crate::pod::{PortSpec, ReservationSpec, ResourceSpec, TransportEncryptionSpec, VolumeSpec};
use crate::pod_info::PodInfoBuilder;
use crate::pool::ResourcePool;
use crate::tls::TlsArtifactIssuer;

/// Read-only inputs every stage of one trial can see.
pub struct StageContext<'a> {
    pub offer: &'a Offer,
    pub config: &'a EvaluatorConfig,
    /// Launched-task snapshot for the whole scheduling round.
    pub tasks: &'a [TaskInfo],
    pub tls_issuer: Option<&'a dyn TlsArtifactIssuer>,
}

#[derive(Debug, Clone)]
pub enum EvaluationStage {
    Placement {
        task: String,
        rule: PlacementRule,
    },
    /// `reservation` is set only for pods with a shared executor.
    Executor {
        reservation: Option<ReservationSpec>,
    },
    Resource {
        task: String,
        spec: ResourceSpec,
    },
    Volume {
        task: String,
        spec: VolumeSpec,
    },
    Ports {
        task: String,
        specs: Vec<PortSpec>,
    },
    Tls {
        task: String,
        specs: Vec<TransportEncryptionSpec>,
    },
    Reclaim {
        task: String,
    },
    Launch {
        task: String,
    },
}

impl EvaluationStage {
    pub fn kind(&self) -> StageKind {
        match self {
            EvaluationStage::Placement { .. } => StageKind::Placement,
            EvaluationStage::Executor { .. } => StageKind::Executor,
            EvaluationStage::Resource { .. } => StageKind::Resource,
            EvaluationStage::Volume { .. } => StageKind::Volume,
            EvaluationStage::Ports { .. } => StageKind::Ports,
            EvaluationStage::Tls { .. } => StageKind::Tls,
            EvaluationStage::Reclaim { .. } => StageKind::Reclaim,
            EvaluationStage::Launch { .. } => StageKind::Launch,
        }
    }

    pub async fn evaluate(
        &self,
        pool: &mut ResourcePool,
        builder: &mut PodInfoBuilder,
        ctx: &StageContext<'_>,
    ) -> EvaluationOutcome {
        let outcome = match self {
            EvaluationStage::Placement { task, rule } => {
                placement::evaluate(task, rule, pool, builder, ctx)
            }
            EvaluationStage::Executor { reservation } => {
                executor::evaluate(reservation.as_ref(), pool, builder, ctx)
            }
            EvaluationStage::Resource { task, spec } => {
                resource::evaluate(task, spec, pool, builder, ctx)
            }
            EvaluationStage::Volume { task, spec } => {
                volume::evaluate(task, spec, pool, builder, ctx)
            }
            EvaluationStage::Ports { task, specs } => {
                port::evaluate(task, specs, pool, builder, ctx)
            }
            EvaluationStage::Tls { task, specs } => tls::evaluate(task, specs, builder, ctx).await,
            EvaluationStage::Reclaim { task } => reclaim::evaluate(task, pool, builder, ctx),
            EvaluationStage::Launch { task } => launch::evaluate(task, builder, ctx),
        };
        debug!(
            offer = %ctx.offer.id,
            stage = %self.kind(),
            passed = outcome.passed,
            reason = %outcome.reason,
            "stage evaluated"
        );
        outcome
    }
}

/// The stage sequence for one planned task.
///
/// Tasks sharing a resource set with an earlier task skip the resource
/// stages and reclamation; launch copies the owner's resources instead.
/// Bookkeeping tasks skip TLS since they are never started.
pub fn stages_for_task(
    builder: &PodInfoBuilder,
    task: &str,
    rule: &PlacementRule,
    executor: Option<&ReservationSpec>,
) -> Vec<EvaluationStage> {
    let Some(draft) = builder.draft(task) else {
        return Vec::new();
    };
    let name = task.to_string();
    let mut stages = vec![
        EvaluationStage::Placement {
            task: name.clone(),
            rule: rule.clone(),
        },
        EvaluationStage::Executor {
            reservation: executor.cloned(),
        },
    ];
    let owns_resources = draft.resource_owner.is_none();
    if owns_resources {
        let set = &draft.resource_set;
        stages.extend(set.resources.iter().map(|spec| EvaluationStage::Resource {
            task: name.clone(),
            spec: spec.clone(),
        }));
        stages.extend(set.volumes.iter().map(|spec| EvaluationStage::Volume {
            task: name.clone(),
            spec: spec.clone(),
        }));
        if !set.ports.is_empty() {
            stages.push(EvaluationStage::Ports {
                task: name.clone(),
                specs: set.ports.clone(),
            });
        }
    }
    if draft.launch && !draft.spec.transport_encryption.is_empty() {
        stages.push(EvaluationStage::Tls {
            task: name.clone(),
            specs: draft.spec.transport_encryption.clone(),
        });
    }
    if owns_resources {
        stages.push(EvaluationStage::Reclaim { task: name.clone() });
    }
    stages.push(EvaluationStage::Launch { task: name });
    stages
}
