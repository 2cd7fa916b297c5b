//! Reclamation stage: releases reservations a previous launch left behind.

use std::collections::BTreeSet;

use tracing::debug;

use super::StageContext;
use crate::outcome::EvaluationOutcome;
use crate::pod_info::PodInfoBuilder;
use crate::pool::ResourcePool;
use crate::recommendation::OfferRecommendation;

/// Release reservations a previous launch held that no planned task uses
/// any more, including those of the pod's previous executor. Only
/// reservations present in this offer can be released.
pub(super) fn evaluate(
    task: &str,
    pool: &mut ResourcePool,
    builder: &PodInfoBuilder,
    ctx: &StageContext<'_>,
) -> EvaluationOutcome {
    let source = format!("reclaim[{task}]");
    if builder.treat_as_new() {
        return EvaluationOutcome::pass(source, "pod is new; nothing to reclaim");
    }
    let prior = builder.prior_for_resources(task);
    let prior_executor = builder.prior_executor();
    if prior.is_none() && prior_executor.is_none() {
        return EvaluationOutcome::pass(source, "no previous launch");
    }

    let mut in_use: BTreeSet<&str> = builder
        .drafts()
        .iter()
        .flat_map(|d| d.info.resources.iter().filter_map(|r| r.resource_id()))
        .collect();
    if let Some(executor) = &builder.state.executor {
        in_use.extend(executor.resources.iter().filter_map(|r| r.resource_id()));
    }

    let mut recommendations = Vec::new();
    let mut released = 0;
    let previous = prior
        .into_iter()
        .flat_map(|p| p.resources.iter())
        .chain(prior_executor.into_iter().flat_map(|e| e.resources.iter()));
    for stale in previous.filter(|r| r.is_reserved()) {
        let Some(id) = stale.resource_id() else {
            continue;
        };
        if in_use.contains(id) {
            continue;
        }
        let Some(held) = pool.reserved(&stale.name, id).cloned() else {
            debug!(offer = %ctx.offer.id, resource = %stale.name, resource_id = id, "stale reservation not offered");
            continue;
        };
        if held.persistence_id().is_some() {
            recommendations.push(OfferRecommendation::destroy(ctx.offer, held.clone()));
        }
        pool.consume_reserved(&held.name, &held.value, id);
        recommendations.push(OfferRecommendation::unreserve(ctx.offer, held));
        released += 1;
    }

    let reason = format!("released {released} stale reservations");
    EvaluationOutcome::pass(source, reason).with_recommendations(recommendations)
}
