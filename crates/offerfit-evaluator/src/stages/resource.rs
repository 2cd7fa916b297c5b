//! Named resources and the reserve/unreserve delta logic shared by the
//! executor, volume and port stages.

use offerfit_core::{Offer, Reservation, Resource, Value};
use tracing::debug;
use uuid::Uuid;

use super::StageContext;
use crate::outcome::EvaluationOutcome;
use crate::pod::{ReservationSpec, ResourceSpec};
use crate::pod_info::PodInfoBuilder;
use crate::pool::ResourcePool;
use crate::recommendation::OfferRecommendation;

/// One quantity to take from the pool under a reservation.
pub(super) struct ResourceRequest<'a> {
    pub name: &'a str,
    pub desired: Value,
    pub reservation: &'a ReservationSpec,
    /// Resource id from a previous launch, if the quantity was reserved before.
    pub prior_id: Option<&'a str>,
}

pub(super) struct Consumed {
    pub resource: Resource,
    pub recommendations: Vec<OfferRecommendation>,
}

/// Take `request` from the pool, emitting the RESERVE/UNRESERVE operations
/// that bring the reservation to exactly the desired value.
///
/// A known id must be present in the offer. Surplus held under it is
/// unreserved; any shortfall is reserved from the unreserved pool under the
/// same id. Without a known id the full amount is reserved under a fresh one.
pub(super) fn consume(
    pool: &mut ResourcePool,
    offer: &Offer,
    request: ResourceRequest<'_>,
) -> Result<Consumed, String> {
    match request.prior_id {
        Some(id) => consume_known(pool, offer, &request, id),
        None => consume_new(pool, offer, &request),
    }
}

fn consume_known(
    pool: &mut ResourcePool,
    offer: &Offer,
    request: &ResourceRequest<'_>,
    id: &str,
) -> Result<Consumed, String> {
    let name = request.name;
    let Some(held) = pool.reserved(name, id).cloned() else {
        return Err(format!("reservation {id} for {name} not found in offer"));
    };
    let consumed = pool
        .consume_reserved(name, &request.desired, id)
        .ok_or_else(|| format!("reservation {id} for {name} could not be consumed"))?;

    let mut recommendations = Vec::new();
    if let Some(surplus) = pool.reserved(name, id).map(|r| r.value.clone()) {
        if let Some(released) = pool.consume_reserved(name, &surplus, id) {
            debug!(offer = %offer.id, resource = name, resource_id = id, value = %released.value, "unreserving surplus");
            recommendations.push(OfferRecommendation::unreserve(offer, released));
        }
    }

    let shortfall = request
        .desired
        .subtract(&consumed.value)
        .map_err(|e| format!("cannot grow {name}: {e}"))?;
    if !shortfall.is_zero() && !shortfall.is_negative() {
        let role = request.reservation.source_role();
        if pool.consume_reservable_merged(name, &shortfall, role).is_none() {
            return Err(insufficient(pool, name, &shortfall, role));
        }
        debug!(offer = %offer.id, resource = name, resource_id = id, value = %shortfall, "reserving shortfall");
        recommendations.push(OfferRecommendation::reserve(offer, held.with_value(shortfall)));
    }

    Ok(Consumed {
        resource: held.with_value(request.desired.clone()),
        recommendations,
    })
}

fn consume_new(
    pool: &mut ResourcePool,
    offer: &Offer,
    request: &ResourceRequest<'_>,
) -> Result<Consumed, String> {
    let role = request.reservation.source_role();
    let Some(taken) = pool.consume_reservable_merged(request.name, &request.desired, role) else {
        return Err(insufficient(pool, request.name, &request.desired, role));
    };
    let resource = reserve_as(taken, request.reservation);
    Ok(Consumed {
        recommendations: vec![OfferRecommendation::reserve(offer, resource.clone())],
        resource,
    })
}

/// Stamp an unreserved resource with a role, principal and fresh id.
pub(super) fn reserve_as(resource: Resource, spec: &ReservationSpec) -> Resource {
    resource
        .with_role(spec.role.clone())
        .with_reservation(Reservation {
            principal: spec.principal.clone(),
            resource_id: Uuid::new_v4().to_string(),
            namespace: spec.namespace.clone(),
        })
}

pub(super) fn insufficient(pool: &ResourcePool, name: &str, desired: &Value, role: &str) -> String {
    match pool.unreserved_value(name, role) {
        Some(available) => {
            format!("insufficient {name}: desired {desired}, available {available} in role {role}")
        }
        None => format!("insufficient {name}: desired {desired}, none offered in role {role}"),
    }
}

pub(super) fn evaluate(
    task: &str,
    spec: &ResourceSpec,
    pool: &mut ResourcePool,
    builder: &mut PodInfoBuilder,
    ctx: &StageContext<'_>,
) -> EvaluationOutcome {
    let source = format!("resource[{task}:{}]", spec.name);
    let prior_id = builder
        .prior_for_resources(task)
        .and_then(|prior| {
            prior
                .resources
                .iter()
                .find(|r| r.name == spec.name && r.disk.is_none())
        })
        .and_then(|r| r.resource_id())
        .map(str::to_string);

    let request = ResourceRequest {
        name: &spec.name,
        desired: spec.value.clone(),
        reservation: &spec.reservation,
        prior_id: prior_id.as_deref(),
    };
    match consume(pool, ctx.offer, request) {
        Ok(consumed) => {
            builder.add_resource(task, consumed.resource);
            EvaluationOutcome::pass(source, format!("offer has {} {}", spec.value, spec.name))
                .with_recommendations(consumed.recommendations)
        }
        Err(reason) => EvaluationOutcome::fail(source, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::OperationKind;

    fn reserved(value: f64, id: &str) -> Resource {
        Resource::new("cpus", Value::scalar(value))
            .with_role("svc-role")
            .with_reservation(Reservation {
                principal: "svc".into(),
                resource_id: id.into(),
                namespace: None,
            })
    }

    fn spec() -> ReservationSpec {
        ReservationSpec::new("svc-role", "svc")
    }

    fn request<'a>(desired: f64, reservation: &'a ReservationSpec, id: Option<&'a str>) -> ResourceRequest<'a> {
        ResourceRequest {
            name: "cpus",
            desired: Value::scalar(desired),
            reservation,
            prior_id: id,
        }
    }

    #[test]
    fn new_reservation_gets_fresh_id_and_namespace() {
        let offer = Offer::new("o1", "a1", "h1").with_resource(Resource::new("cpus", Value::scalar(2.0)));
        let mut pool = ResourcePool::new(&offer);
        let mut reservation = spec();
        reservation.namespace = Some("ns".into());
        let consumed = consume(&mut pool, &offer, request(1.5, &reservation, None)).unwrap();

        assert_eq!(consumed.recommendations.len(), 1);
        assert_eq!(consumed.recommendations[0].kind(), OperationKind::Reserve);
        let r = &consumed.resource;
        assert_eq!(r.role, "svc-role");
        assert!(Uuid::parse_str(r.resource_id().unwrap()).is_ok());
        assert_eq!(r.reservation.as_ref().unwrap().namespace.as_deref(), Some("ns"));
        assert_eq!(pool.unreserved_value("cpus", "*"), Some(&Value::scalar(0.5)));
    }

    #[test]
    fn unchanged_reservation_emits_nothing() {
        let offer = Offer::new("o1", "a1", "h1").with_resource(reserved(1.0, "R"));
        let mut pool = ResourcePool::new(&offer);
        let reservation = spec();
        let consumed = consume(&mut pool, &offer, request(1.0, &reservation, Some("R"))).unwrap();
        assert!(consumed.recommendations.is_empty());
        assert_eq!(consumed.resource.resource_id(), Some("R"));
    }

    #[test]
    fn growth_reserves_the_shortfall_under_the_same_id() {
        let offer = Offer::new("o1", "a1", "h1")
            .with_resource(reserved(1.0, "R"))
            .with_resource(Resource::new("cpus", Value::scalar(1.0)));
        let mut pool = ResourcePool::new(&offer);
        let reservation = spec();
        let consumed = consume(&mut pool, &offer, request(2.0, &reservation, Some("R"))).unwrap();

        assert_eq!(consumed.recommendations.len(), 1);
        let rec = &consumed.recommendations[0];
        assert_eq!(rec.kind(), OperationKind::Reserve);
        let r = rec.operation.resource().unwrap();
        assert_eq!(r.value, Value::scalar(1.0));
        assert_eq!(r.resource_id(), Some("R"));
        assert_eq!(consumed.resource.value, Value::scalar(2.0));
    }

    #[test]
    fn shrink_unreserves_the_surplus() {
        let offer = Offer::new("o1", "a1", "h1").with_resource(reserved(2.0, "R"));
        let mut pool = ResourcePool::new(&offer);
        let reservation = spec();
        let consumed = consume(&mut pool, &offer, request(1.0, &reservation, Some("R"))).unwrap();

        assert_eq!(consumed.recommendations.len(), 1);
        let rec = &consumed.recommendations[0];
        assert_eq!(rec.kind(), OperationKind::Unreserve);
        assert_eq!(rec.operation.resource().unwrap().value, Value::scalar(1.0));
        assert_eq!(consumed.resource.value, Value::scalar(1.0));
        assert!(pool.reserved("cpus", "R").is_none());
    }

    #[test]
    fn missing_reservation_or_capacity_fails() {
        let offer = Offer::new("o1", "a1", "h1").with_resource(Resource::new("cpus", Value::scalar(1.0)));
        let reservation = spec();

        let mut pool = ResourcePool::new(&offer);
        let err = consume(&mut pool, &offer, request(1.0, &reservation, Some("R"))).err().unwrap();
        assert!(err.contains("not found"));

        let mut pool = ResourcePool::new(&offer);
        let err = consume(&mut pool, &offer, request(3.0, &reservation, None)).err().unwrap();
        assert!(err.starts_with("insufficient cpus"));
    }
}
