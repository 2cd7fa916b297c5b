//! Executor stage: resolves the executor a pod's tasks share.

use offerfit_core::{ExecutorInfo, Value};
use uuid::Uuid;

use super::StageContext;
use super::resource::{ResourceRequest, consume};
use crate::outcome::EvaluationOutcome;
use crate::pod::ReservationSpec;
use crate::pod_info::PodInfoBuilder;
use crate::pool::ResourcePool;

const SOURCE: &str = "executor";

/// Resolve the pod's shared executor once per trial.
///
/// A task of the pod still running means its executor must be on the
/// offered agent and is reused as is. Otherwise the executor's resources
/// are reserved, keeping any resource ids of a previous executor.
pub(super) fn evaluate(
    reservation: Option<&ReservationSpec>,
    pool: &mut ResourcePool,
    builder: &mut PodInfoBuilder,
    ctx: &StageContext<'_>,
) -> EvaluationOutcome {
    let Some(reservation) = reservation else {
        return EvaluationOutcome::pass(SOURCE, "pod has no shared executor");
    };
    if builder.state.executor_resolved {
        return EvaluationOutcome::pass(SOURCE, "executor already resolved for pod");
    }

    if let Some(running) = builder.running_prior().and_then(|t| t.executor.clone()) {
        if !ctx.offer.has_executor(&running.executor_id) {
            return EvaluationOutcome::fail(
                SOURCE,
                format!("running executor {} is not on agent {}", running.executor_id, ctx.offer.agent_id),
            );
        }
        let reason = format!("reusing running executor {}", running.executor_id);
        builder.state.executor = Some(running);
        builder.state.executor_resolved = true;
        return EvaluationOutcome::pass(SOURCE, reason);
    }

    let prior = builder.prior_executor().cloned();
    let wanted = [
        ("cpus", ctx.config.executor.cpus),
        ("mem", ctx.config.executor.mem),
        ("disk", ctx.config.executor.disk),
    ];
    let mut resources = Vec::new();
    let mut recommendations = Vec::new();
    for (name, amount) in wanted.into_iter().filter(|(_, amount)| *amount > 0.0) {
        let prior_id = prior
            .as_ref()
            .and_then(|e| e.resources.iter().find(|r| r.name == name))
            .and_then(|r| r.resource_id());
        let request = ResourceRequest {
            name,
            desired: Value::scalar(amount),
            reservation,
            prior_id,
        };
        match consume(pool, ctx.offer, request) {
            Ok(consumed) => {
                resources.push(consumed.resource);
                recommendations.extend(consumed.recommendations);
            }
            Err(reason) => return EvaluationOutcome::fail(SOURCE, reason),
        }
    }

    let pod_type = &builder.pod.pod_type;
    let executor = ExecutorInfo {
        executor_id: format!("{pod_type}__{}", Uuid::new_v4()),
        name: pod_type.clone(),
        resources,
    };
    let reason = format!("reserved executor {}", executor.executor_id);
    builder.state.executor = Some(executor);
    builder.state.executor_resolved = true;
    EvaluationOutcome::pass(SOURCE, reason).with_recommendations(recommendations)
}
