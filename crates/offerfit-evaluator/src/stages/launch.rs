//! Launch stage: durable labels and launch identity for a finished task.

use offerfit_core::{AttributeString, labels};
use uuid::Uuid;

use super::StageContext;
use crate::outcome::EvaluationOutcome;
use crate::pod_info::PodInfoBuilder;

/// Finish a task's `TaskInfo`: durable labels in fixed order, ids, executor,
/// and for tasks sharing a resource set, the owner's resources and ports.
pub(super) fn evaluate(
    task: &str,
    builder: &mut PodInfoBuilder,
    ctx: &StageContext<'_>,
) -> EvaluationOutcome {
    let source = format!("launch[{task}]");
    let shared = builder.draft(task).and_then(|d| d.resource_owner.clone()).and_then(|owner| {
        builder
            .draft(&owner)
            .map(|o| (o.info.resources.clone(), o.info.discovery.clone(), o.port_env.clone()))
    });
    let executor = builder.state.executor.clone();
    let target_config = builder.target_config.clone();
    let index = builder.pod.index;
    let pod_type = builder.pod.pod_type.clone();
    let offer = ctx.offer;

    let Some(draft) = builder.draft_mut(task) else {
        return EvaluationOutcome::fail(source, "task was not planned");
    };
    if let Some((resources, discovery, port_env)) = shared {
        draft.info.resources = resources;
        draft.info.discovery = discovery;
        for (key, value) in port_env {
            for check in [&mut draft.info.health_check, &mut draft.info.readiness_check]
                .into_iter()
                .flatten()
            {
                check.env.insert(key.clone(), value.clone());
            }
            draft.info.env.insert(key, value);
        }
    }

    let info = &mut draft.info;
    info.labels.set(labels::GOAL_STATE, draft.spec.goal_state.to_string());
    info.labels.set(labels::INDEX, index.to_string());
    info.labels
        .set(labels::OFFER_ATTRIBUTES, AttributeString::join(&offer.attributes));
    info.labels.set(labels::OFFER_HOSTNAME, offer.hostname.clone());
    info.labels.set(labels::TARGET_CONFIGURATION, target_config);
    info.labels.set(labels::TASK_TYPE, pod_type);
    if let Some(domain) = &offer.domain {
        info.labels.set(labels::OFFER_REGION, domain.region.clone());
        info.labels.set(labels::OFFER_ZONE, domain.zone.clone());
    }
    info.task_id = format!("{}__{}", info.name, Uuid::new_v4());
    info.agent_id = offer.agent_id.clone();
    info.executor = executor;
    draft.ready = true;

    EvaluationOutcome::pass(source, format!("task {} ready on {}", draft.info.name, offer.hostname))
}
