//! Colocation and avoidance by pod type.

use offerfit_core::Offer;

use crate::rule::{PlacementContext, RuleOutcome, TaskTypeBehavior};

pub(crate) fn evaluate(
    task_type: &str,
    behavior: TaskTypeBehavior,
    offer: &Offer,
    ctx: &PlacementContext<'_>,
) -> RuleOutcome {
    let mut matching = ctx
        .tasks
        .iter()
        .filter(|t| t.task_type() == Some(task_type))
        .filter(|t| !ctx.is_own_slot(t))
        .peekable();

    if matching.peek().is_none() {
        // First placement of either side is unconstrained.
        return RuleOutcome::accept(offer, format!("no tasks of type '{task_type}' exist"));
    }
    let on_agent = matching.any(|t| t.agent_id == offer.agent_id);

    match (behavior, on_agent) {
        (TaskTypeBehavior::Avoid, true) => RuleOutcome::reject(
            offer,
            format!("found a task of avoided type '{task_type}' on this agent"),
        ),
        (TaskTypeBehavior::Avoid, false) => RuleOutcome::accept(
            offer,
            format!("no task of avoided type '{task_type}' on this agent"),
        ),
        (TaskTypeBehavior::Colocate, true) => RuleOutcome::accept(
            offer,
            format!("found a task of colocated type '{task_type}' on this agent"),
        ),
        (TaskTypeBehavior::Colocate, false) => RuleOutcome::reject(
            offer,
            format!("no task of colocated type '{task_type}' on this agent"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use offerfit_core::{Offer, PodInstance, TaskInfo, labels};

    use crate::rule::{PlacementContext, PlacementRule, TaskTypeBehavior};

    fn task_on(pod_type: &str, index: u32, agent: &str) -> TaskInfo {
        let mut t = TaskInfo::new(format!("{pod_type}-{index}-server"));
        t.agent_id = agent.to_string();
        t.labels.set(labels::TASK_TYPE, pod_type);
        t.labels.set(labels::INDEX, index.to_string());
        t
    }

    fn rule(task_type: &str, behavior: TaskTypeBehavior) -> PlacementRule {
        PlacementRule::TaskType {
            task_type: task_type.into(),
            behavior,
        }
    }

    #[test]
    fn colocate_accepts_anything_when_none_exist() {
        let pod = PodInstance::new("data", 0);
        let tasks: Vec<TaskInfo> = vec![];
        let ctx = PlacementContext::new(&pod, &tasks);
        let offer = Offer::new("o", "agent-1", "h");
        assert!(rule("index", TaskTypeBehavior::Colocate).evaluate(&offer, &ctx).passed());
        assert!(rule("index", TaskTypeBehavior::Avoid).evaluate(&offer, &ctx).passed());
    }

    #[test]
    fn colocate_requires_same_agent() {
        let pod = PodInstance::new("data", 0);
        let tasks = vec![task_on("index", 0, "agent-1")];
        let ctx = PlacementContext::new(&pod, &tasks);
        let colocate = rule("index", TaskTypeBehavior::Colocate);
        assert!(colocate.evaluate(&Offer::new("o1", "agent-1", "h1"), &ctx).passed());
        assert!(!colocate.evaluate(&Offer::new("o2", "agent-2", "h2"), &ctx).passed());
    }

    #[test]
    fn avoid_rejects_same_agent() {
        let pod = PodInstance::new("data", 1);
        let tasks = vec![task_on("data", 0, "agent-1")];
        let ctx = PlacementContext::new(&pod, &tasks);
        let avoid = rule("data", TaskTypeBehavior::Avoid);
        assert!(!avoid.evaluate(&Offer::new("o1", "agent-1", "h1"), &ctx).passed());
        assert!(avoid.evaluate(&Offer::new("o2", "agent-2", "h2"), &ctx).passed());
    }

    #[test]
    fn self_avoidance_ignores_own_prior_launch() {
        let pod = PodInstance::new("data", 0);
        let tasks = vec![task_on("data", 0, "agent-1")];
        let ctx = PlacementContext::new(&pod, &tasks);
        let avoid = rule("data", TaskTypeBehavior::Avoid);
        assert!(avoid.evaluate(&Offer::new("o1", "agent-1", "h1"), &ctx).passed());
    }
}
