//! Volume stage: disk reservations and persistent volumes.

use offerfit_core::{DiskInfo, Resource, Value};
use tracing::debug;
use uuid::Uuid;

use super::StageContext;
use super::resource::{ResourceRequest, consume, reserve_as};
use crate::outcome::EvaluationOutcome;
use crate::pod::{VolumeKind, VolumeSpec};
use crate::pod_info::PodInfoBuilder;
use crate::pool::ResourcePool;
use crate::recommendation::OfferRecommendation;

const DISK: &str = "disk";

pub(super) fn evaluate(
    task: &str,
    spec: &VolumeSpec,
    pool: &mut ResourcePool,
    builder: &mut PodInfoBuilder,
    ctx: &StageContext<'_>,
) -> EvaluationOutcome {
    let source = format!("volume[{task}:{}]", spec.container_path);
    let prior = builder
        .prior_for_resources(task)
        .and_then(|p| {
            p.resources.iter().find(|r| {
                r.name == DISK
                    && r.disk
                        .as_ref()
                        .is_some_and(|d| d.container_path.as_deref() == Some(spec.container_path.as_str()))
            })
        })
        .cloned();

    let result = match spec.kind {
        VolumeKind::Root | VolumeKind::Path => shared_disk(spec, prior.as_ref(), pool, ctx),
        VolumeKind::Mount => mount_disk(spec, prior.as_ref(), pool, ctx),
    };
    match result {
        Ok((resource, recommendations)) => {
            let reason = format!(
                "{:?} volume {} at {}",
                spec.kind,
                resource.persistence_id().unwrap_or("-"),
                spec.container_path
            );
            builder.add_resource(task, resource);
            EvaluationOutcome::pass(source, reason).with_recommendations(recommendations)
        }
        Err(reason) => EvaluationOutcome::fail(source, reason),
    }
}

type VolumeResult = Result<(Resource, Vec<OfferRecommendation>), String>;

fn shared_disk(
    spec: &VolumeSpec,
    prior: Option<&Resource>,
    pool: &mut ResourcePool,
    ctx: &StageContext<'_>,
) -> VolumeResult {
    let request = ResourceRequest {
        name: DISK,
        desired: Value::scalar(spec.size),
        reservation: &spec.reservation,
        prior_id: prior.and_then(Resource::resource_id),
    };
    let consumed = consume(pool, ctx.offer, request)?;
    let mut recommendations = consumed.recommendations;
    let (resource, created) = persist(consumed.resource, spec, prior);
    if created {
        recommendations.push(OfferRecommendation::create(ctx.offer, resource.clone()));
    }
    Ok((resource, recommendations))
}

/// MOUNT volumes take a whole disk; a known one is reused entire.
fn mount_disk(
    spec: &VolumeSpec,
    prior: Option<&Resource>,
    pool: &mut ResourcePool,
    ctx: &StageContext<'_>,
) -> VolumeResult {
    let mut recommendations = Vec::new();
    let reserved = match prior.and_then(Resource::resource_id) {
        Some(id) => {
            let Some(held) = pool.reserved(DISK, id).cloned() else {
                return Err(format!("mount volume reservation {id} not found in offer"));
            };
            pool.consume_reserved(DISK, &held.value, id)
                .ok_or_else(|| format!("mount volume reservation {id} could not be consumed"))?
        }
        None => {
            let root = ctx.config.volumes.mount_root.as_deref();
            let desired = Value::scalar(spec.size);
            let Some(disk) = pool.consume_atomic(DISK, &desired, root) else {
                return Err(format!(
                    "no mount disk of at least {desired} MB{}",
                    root.map(|r| format!(" under {r}")).unwrap_or_default()
                ));
            };
            debug!(offer = %ctx.offer.id, root = disk.mount_root().unwrap_or("-"), size = %disk.value, "claimed mount disk");
            let reserved = reserve_as(disk, &spec.reservation);
            recommendations.push(OfferRecommendation::reserve(ctx.offer, reserved.clone()));
            reserved
        }
    };
    let (resource, created) = persist(reserved, spec, prior);
    if created {
        recommendations.push(OfferRecommendation::create(ctx.offer, resource.clone()));
    }
    Ok((resource, recommendations))
}

/// Attach the persistence id and container path, reusing a known id.
/// Returns whether a new persistent volume must be created.
fn persist(mut resource: Resource, spec: &VolumeSpec, prior: Option<&Resource>) -> (Resource, bool) {
    let known = prior.and_then(Resource::persistence_id).map(str::to_string);
    let created = known.is_none();
    let disk = resource.disk.get_or_insert_with(DiskInfo::default);
    disk.persistence_id = Some(known.unwrap_or_else(|| Uuid::new_v4().to_string()));
    disk.container_path = Some(spec.container_path.clone());
    (resource, created)
}
