//! Port reservation, environment and discovery.

use std::collections::BTreeMap;

use offerfit_core::{DiscoveryPort, Labels, Resource, Value, labels};
use sha2::{Digest, Sha256};

use super::StageContext;
use super::resource::{ResourceRequest, consume};
use crate::outcome::EvaluationOutcome;
use crate::pod::{PortSpec, ReservationSpec, VipSpec};
use crate::pod_info::PodInfoBuilder;
use crate::pool::ResourcePool;

const PORTS: &str = "ports";

/// Ports reserved together: same role, principal and prior reservation.
type GroupKey = (String, String, Option<String>);

pub(super) fn evaluate(
    task: &str,
    specs: &[PortSpec],
    pool: &mut ResourcePool,
    builder: &mut PodInfoBuilder,
    ctx: &StageContext<'_>,
) -> EvaluationOutcome {
    let source = format!("ports[{task}]");
    let prior = builder.prior_for_resources(task).cloned();

    let mut assigned = Vec::with_capacity(specs.len());
    for spec in specs {
        let number = if spec.is_dynamic() {
            let reused = prior.as_ref().and_then(|p| p.discovery_port(&spec.port_name));
            match reused.or_else(|| free_port(pool, builder, spec.reservation.source_role())) {
                Some(n) => n,
                None => {
                    return EvaluationOutcome::fail(
                        source,
                        format!("no free port for '{}'", spec.port_name),
                    );
                }
            }
        } else {
            spec.port
        };
        if !builder.state.assigned_ports.insert(number) {
            return EvaluationOutcome::fail(source, format!("port {number} already claimed in pod"));
        }
        assigned.push((spec, number));
    }

    let mut groups: BTreeMap<GroupKey, (&ReservationSpec, Vec<u64>)> = BTreeMap::new();
    for (spec, number) in &assigned {
        let prior_id = prior
            .as_ref()
            .and_then(|p| {
                p.resources.iter().find(|r| {
                    r.name == PORTS
                        && r.value.as_ranges().is_some_and(|ranges| ranges.contains_value(*number))
                })
            })
            .and_then(Resource::resource_id)
            .map(str::to_string);
        let key = (
            spec.reservation.role.clone(),
            spec.reservation.principal.clone(),
            prior_id,
        );
        groups
            .entry(key)
            .or_insert_with(|| (&spec.reservation, Vec::new()))
            .1
            .push(*number);
    }

    let mut recommendations = Vec::new();
    for ((_, _, prior_id), (reservation, numbers)) in &groups {
        let request = ResourceRequest {
            name: PORTS,
            desired: Value::ranges(numbers.iter().map(|n| (*n, *n))),
            reservation: *reservation,
            prior_id: prior_id.as_deref(),
        };
        match consume(pool, ctx.offer, request) {
            Ok(consumed) => {
                builder.add_resource(task, consumed.resource);
                recommendations.extend(consumed.recommendations);
            }
            Err(reason) => return EvaluationOutcome::fail(source, reason),
        }
    }

    let Some(draft) = builder.draft_mut(task) else {
        return EvaluationOutcome::fail(source, "task was not planned");
    };
    for (spec, number) in &assigned {
        let key = spec.env_key(*number);
        let value = number.to_string();
        draft.info.env.insert(key.clone(), value.clone());
        for check in [&mut draft.info.health_check, &mut draft.info.readiness_check]
            .into_iter()
            .flatten()
        {
            check.env.insert(key.clone(), value.clone());
        }
        draft.port_env.insert(key, value);
        draft.info.discovery.ports.push(discovery_port(spec, *number));
    }

    let numbers: Vec<String> = assigned.iter().map(|(_, n)| n.to_string()).collect();
    EvaluationOutcome::pass(source, format!("assigned ports [{}]", numbers.join(",")))
        .with_recommendations(recommendations)
}

/// Lowest offered port not yet claimed by any task of the pod.
fn free_port(pool: &ResourcePool, builder: &PodInfoBuilder, role: &str) -> Option<u64> {
    pool.unreserved_value(PORTS, role)?
        .as_ranges()?
        .values()
        .find(|n| !builder.state.assigned_ports.contains(n))
}

fn discovery_port(spec: &PortSpec, number: u64) -> DiscoveryPort {
    let mut port_labels = Labels::new();
    let protocol = match &spec.vip {
        Some(vip) => {
            port_labels.set(vip_label_key(vip), format!("{}:{}", vip.name, vip.port));
            Some(vip.protocol.clone())
        }
        None => None,
    };
    DiscoveryPort {
        name: spec.port_name.clone(),
        number,
        protocol,
        visibility: spec.visibility.clone(),
        labels: port_labels,
    }
}

/// `VIP_<8 hex chars>`, stable for a given VIP name and port.
pub(crate) fn vip_label_key(vip: &VipSpec) -> String {
    let digest = Sha256::digest(format!("{}-{}", vip.name, vip.port).as_bytes());
    format!("{}{}", labels::VIP_PREFIX, &hex::encode(digest)[..8])
}
