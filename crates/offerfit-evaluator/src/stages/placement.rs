//! Placement stage.

use offerfit_placement::{PlacementContext, PlacementRule};

use super::StageContext;
use crate::outcome::EvaluationOutcome;
use crate::pod_info::PodInfoBuilder;
use crate::pool::ResourcePool;

pub(super) fn evaluate(
    task: &str,
    rule: &PlacementRule,
    pool: &mut ResourcePool,
    builder: &PodInfoBuilder,
    ctx: &StageContext<'_>,
) -> EvaluationOutcome {
    let source = format!("placement[{task}]");
    let placement = PlacementContext::new(&builder.pod, ctx.tasks)
        .with_local_region(ctx.config.region.as_deref());
    let outcome = rule.evaluate(ctx.offer, &placement);
    if !outcome.passed() {
        return EvaluationOutcome::fail(source, outcome.reason);
    }
    pool.retain(&outcome.offer.resources);
    EvaluationOutcome::pass(source, outcome.reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::{GoalState, PodInstanceRequirement, PodSpec, ReservationSpec, ResourceSet, TaskSpec};
    use offerfit_core::{ANY_ROLE, EvaluatorConfig, Offer, Resource, TaskInfo, Value, labels};
    use std::collections::BTreeMap;

    fn make_builder() -> PodInfoBuilder {
        let pod = PodSpec {
            pod_type: "hello".into(),
            count: 2,
            shared_executor: false,
            executor_reservation: ReservationSpec::new("r", "p"),
            resource_sets: vec![ResourceSet {
                id: "rs".into(),
                resources: vec![],
                volumes: vec![],
                ports: vec![],
            }],
            tasks: vec![TaskSpec {
                name: "server".into(),
                goal_state: GoalState::Running,
                resource_set_id: "rs".into(),
                env: BTreeMap::new(),
                health_check: None,
                readiness_check: None,
                transport_encryption: vec![],
            }],
            placement: None,
        };
        let req = PodInstanceRequirement::new(pod, 1, vec!["server".into()]);
        PodInfoBuilder::new(&req, "cfg", &[])
    }

    fn make_offer() -> Offer {
        Offer::new("o1", "a1", "host-1").with_resource(Resource::new("cpus", Value::scalar(4.0)))
    }

    #[test]
    fn rejection_fails_without_touching_pool() {
        let offer = make_offer();
        let config = EvaluatorConfig::default();
        let mut other = TaskInfo::new("hello-0-server");
        other.labels.set(labels::TASK_TYPE, "hello");
        other.labels.set(labels::INDEX, "0");
        other.labels.set(labels::OFFER_HOSTNAME, "host-1");
        let tasks = vec![other];
        let ctx = StageContext {
            offer: &offer,
            config: &config,
            tasks: &tasks,
            tls_issuer: None,
        };
        let builder = make_builder();
        let mut pool = ResourcePool::new(&offer);

        let outcome = evaluate("server", &PlacementRule::max_per_hostname(1), &mut pool, &builder, &ctx);
        assert!(!outcome.passed);
        assert!(outcome.recommendations.is_empty());
        assert_eq!(pool.unreserved_value("cpus", ANY_ROLE), Some(&Value::scalar(4.0)));
    }

    #[test]
    fn acceptance_keeps_the_pool() {
        let offer = make_offer();
        let config = EvaluatorConfig::default();
        let ctx = StageContext {
            offer: &offer,
            config: &config,
            tasks: &[],
            tls_issuer: None,
        };
        let builder = make_builder();
        let mut pool = ResourcePool::new(&offer);
        let outcome = evaluate("server", &PlacementRule::Passthrough, &mut pool, &builder, &ctx);
        assert!(outcome.passed);
        assert_eq!(pool.unreserved_value("cpus", ANY_ROLE), Some(&Value::scalar(4.0)));
    }
}
