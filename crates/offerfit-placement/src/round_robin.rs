//! Even spread across grouping keys.
//!
//! Builds a histogram of distinct task names per key and only admits offers
//! whose key is among the least occupied. With a known key count, unseen
//! keys stay eligible until that many keys are known.

use std::collections::{BTreeMap, BTreeSet};

use offerfit_core::Offer;

use crate::grouping::Grouping;
use crate::matcher::StringMatcher;
use crate::rule::{PlacementContext, RuleOutcome};

pub(crate) fn evaluate(
    grouping: &Grouping<'_>,
    total_count: Option<u32>,
    task_filter: &StringMatcher,
    offer: &Offer,
    ctx: &PlacementContext<'_>,
) -> RuleOutcome {
    let label = grouping.label();
    let Some(candidate) = grouping.offer_keys(offer).into_iter().next() else {
        return RuleOutcome::reject(offer, format!("offer lacks a {label}"));
    };

    let mut histogram: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for task in ctx.tasks {
        if ctx.is_own_slot(task) || !task_filter.matches(&task.name) {
            continue;
        }
        for key in grouping.task_keys(task) {
            histogram.entry(key).or_default().insert(task.name.as_str());
        }
    }

    let known = histogram.len();
    let room_for_unseen = total_count.is_none_or(|total| known < total as usize);
    let min = if total_count.is_some() && room_for_unseen {
        0
    } else {
        histogram.values().map(BTreeSet::len).min().unwrap_or(0)
    };

    match histogram.get(&candidate) {
        Some(names) if names.len() <= min => RuleOutcome::accept(
            offer,
            format!(
                "{label} '{candidate}' has {} tasks, at the minimum {min}",
                names.len()
            ),
        ),
        Some(names) => RuleOutcome::reject(
            offer,
            format!(
                "{label} '{candidate}' has {} tasks, above the minimum {min}",
                names.len()
            ),
        ),
        None if room_for_unseen => {
            RuleOutcome::accept(offer, format!("{label} '{candidate}' is not yet used"))
        }
        None => RuleOutcome::reject(
            offer,
            format!("{label} '{candidate}' is unknown and all {known} slots are known"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use offerfit_core::{Attribute, Offer, PodInstance, Resource, TaskInfo, Value, labels};

    use crate::matcher::StringMatcher;
    use crate::rule::{PlacementContext, PlacementRule};

    fn make_offer(host: &str) -> Offer {
        Offer::new(format!("offer-{host}"), format!("agent-{host}"), host)
            .with_resource(Resource::new("cpus", Value::scalar(1.0)))
    }

    fn on_host(name: &str, index: u32, host: &str) -> TaskInfo {
        let mut t = TaskInfo::new(name);
        t.labels.set(labels::TASK_TYPE, "hello");
        t.labels.set(labels::INDEX, index.to_string());
        t.labels.set(labels::OFFER_HOSTNAME, host);
        t
    }

    fn by_hostname(total: Option<u32>) -> PlacementRule {
        PlacementRule::RoundRobinByHostname {
            agent_count: total,
            task_filter: StringMatcher::Any,
        }
    }

    #[test]
    fn balanced_hosts_all_accept() {
        let pod = PodInstance::new("hello", 3);
        let tasks = vec![
            on_host("hello-0-server", 0, "A"),
            on_host("hello-1-server", 1, "B"),
            on_host("hello-2-server", 2, "C"),
        ];
        let ctx = PlacementContext::new(&pod, &tasks);
        let rule = by_hostname(Some(3));
        for host in ["A", "B", "C"] {
            assert!(rule.evaluate(&make_offer(host), &ctx).passed(), "{host}");
        }
        // All three slots are known, so a fourth host is never eligible.
        assert!(!rule.evaluate(&make_offer("D"), &ctx).passed());
    }

    #[test]
    fn overloaded_host_is_skipped() {
        let pod = PodInstance::new("hello", 4);
        let tasks = vec![
            on_host("hello-0-server", 0, "A"),
            on_host("hello-1-server", 1, "B"),
            on_host("hello-2-server", 2, "C"),
            on_host("hello-3-server", 3, "A"),
        ];
        let ctx = PlacementContext::new(&pod, &tasks);
        let rule = by_hostname(Some(3));
        assert!(!rule.evaluate(&make_offer("A"), &ctx).passed());
        assert!(rule.evaluate(&make_offer("B"), &ctx).passed());
        assert!(rule.evaluate(&make_offer("C"), &ctx).passed());
    }

    #[test]
    fn unseen_hosts_are_preferred_while_slots_remain() {
        let pod = PodInstance::new("hello", 1);
        let tasks = vec![on_host("hello-0-server", 0, "A")];
        let ctx = PlacementContext::new(&pod, &tasks);
        let rule = by_hostname(Some(3));
        assert!(!rule.evaluate(&make_offer("A"), &ctx).passed());
        assert!(rule.evaluate(&make_offer("B"), &ctx).passed());
    }

    #[test]
    fn open_world_accepts_any_new_host() {
        let pod = PodInstance::new("hello", 2);
        let tasks = vec![
            on_host("hello-0-server", 0, "A"),
            on_host("hello-1-server", 1, "B"),
        ];
        let ctx = PlacementContext::new(&pod, &tasks);
        let rule = by_hostname(None);
        assert!(rule.evaluate(&make_offer("A"), &ctx).passed());
        assert!(rule.evaluate(&make_offer("Z"), &ctx).passed());
    }

    #[test]
    fn own_prior_slot_is_excluded() {
        let pod = PodInstance::new("hello", 0);
        let tasks = vec![
            on_host("hello-0-server", 0, "A"),
            on_host("hello-1-server", 1, "B"),
        ];
        let ctx = PlacementContext::new(&pod, &tasks);
        // Without its own record, A is empty while B holds one task.
        let rule = by_hostname(Some(2));
        assert!(rule.evaluate(&make_offer("A"), &ctx).passed());
    }

    #[test]
    fn by_attribute_rejects_offers_without_it() {
        let pod = PodInstance::new("hello", 1);
        let mut t = on_host("hello-0-server", 0, "A");
        t.labels.set(labels::OFFER_ATTRIBUTES, "rack:r1");
        let tasks = vec![t];
        let ctx = PlacementContext::new(&pod, &tasks);
        let rule = PlacementRule::RoundRobinByAttribute {
            attribute: "rack".into(),
            total_count: Some(2),
            task_filter: StringMatcher::Any,
        };
        assert!(!rule.evaluate(&make_offer("B"), &ctx).passed());
        let r1 = make_offer("B").with_attribute(Attribute::text("rack", "r1"));
        let r2 = make_offer("C").with_attribute(Attribute::text("rack", "r2"));
        assert!(!rule.evaluate(&r1, &ctx).passed());
        assert!(rule.evaluate(&r2, &ctx).passed());
    }

    #[test]
    fn attribute_name_ignores_case() {
        let pod = PodInstance::new("hello", 1);
        let mut t = on_host("hello-0-server", 0, "A");
        t.labels.set(labels::OFFER_ATTRIBUTES, "Rack:r1");
        let tasks = vec![t];
        let ctx = PlacementContext::new(&pod, &tasks);
        let rule = PlacementRule::RoundRobinByAttribute {
            attribute: "rack".into(),
            total_count: Some(2),
            task_filter: StringMatcher::Any,
        };
        let r1 = make_offer("B").with_attribute(Attribute::text("RACK", "r1"));
        let r2 = make_offer("C").with_attribute(Attribute::text("RACK", "r2"));
        assert!(!rule.evaluate(&r1, &ctx).passed());
        assert!(rule.evaluate(&r2, &ctx).passed());
    }
}
