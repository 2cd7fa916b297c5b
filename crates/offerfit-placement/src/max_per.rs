//! Upper bound on tasks per grouping key.
//!
//! Counts distinct task names already placed under each key the offer
//! carries. An offer is rejected once any of its keys holds `max` or more.

use std::collections::{BTreeMap, BTreeSet};

use offerfit_core::Offer;

use crate::grouping::Grouping;
use crate::matcher::StringMatcher;
use crate::rule::{PlacementContext, RuleOutcome};

pub(crate) fn evaluate(
    grouping: &Grouping<'_>,
    max: u32,
    task_filter: &StringMatcher,
    offer: &Offer,
    ctx: &PlacementContext<'_>,
) -> RuleOutcome {
    let label = grouping.label();
    let offer_keys = grouping.offer_keys(offer);
    if offer_keys.is_empty() {
        return RuleOutcome::accept(offer, format!("offer has no {label} to enforce"));
    }

    let mut occupants: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for task in ctx.tasks {
        let own = ctx.is_own_slot(task);
        if !own && !task_filter.matches(&task.name) {
            continue;
        }
        for key in grouping.task_keys(task) {
            if !offer_keys.contains(&key) {
                continue;
            }
            if own {
                // A relaunch in place never counts against itself.
                return RuleOutcome::accept(
                    offer,
                    format!("{} already occupies {label} '{key}'", ctx.pod),
                );
            }
            occupants.entry(key).or_default().insert(task.name.as_str());
        }
    }

    for key in &offer_keys {
        let count = occupants.get(key).map_or(0, BTreeSet::len);
        if count >= max as usize {
            return RuleOutcome::reject(
                offer,
                format!("{count} tasks on {label} '{key}', max is {max}"),
            );
        }
    }
    RuleOutcome::accept(
        offer,
        format!("every {label} of the offer is below max {max}"),
    )
}

#[cfg(test)]
mod tests {
    use offerfit_core::{Attribute, Offer, PodInstance, Resource, TaskInfo, Value, labels};

    use crate::matcher::StringMatcher;
    use crate::rule::{PlacementContext, PlacementRule};

    fn make_offer(host: &str) -> Offer {
        Offer::new("o1", "agent-1", host)
            .with_resource(Resource::new("cpus", Value::scalar(2.0)))
            .with_attribute(Attribute::text("rack", "r1"))
    }

    fn placed(name: &str, pod_type: &str, index: u32, host: &str, attrs: &str) -> TaskInfo {
        let mut t = TaskInfo::new(name);
        t.labels.set(labels::TASK_TYPE, pod_type);
        t.labels.set(labels::INDEX, index.to_string());
        t.labels.set(labels::OFFER_HOSTNAME, host);
        t.labels.set(labels::OFFER_ATTRIBUTES, attrs);
        t
    }

    #[test]
    fn max_per_hostname_one() {
        let pod = PodInstance::new("hello", 1);
        let rule = PlacementRule::max_per_hostname(1);
        let offer = make_offer("host-1");

        let empty: Vec<TaskInfo> = vec![];
        let outcome = rule.evaluate(&offer, &PlacementContext::new(&pod, &empty));
        assert!(outcome.passed());
        assert_eq!(outcome.offer, offer);

        let tasks = vec![placed("hello-0-server", "hello", 0, "host-1", "")];
        let outcome = rule.evaluate(&offer, &PlacementContext::new(&pod, &tasks));
        assert!(!outcome.passed());
        assert!(outcome.offer.resources.is_empty());

        // Other hosts are unaffected.
        let other = make_offer("host-2");
        assert!(rule.evaluate(&other, &PlacementContext::new(&pod, &tasks)).passed());
    }

    #[test]
    fn task_filter_excludes_other_types() {
        let pod = PodInstance::new("hello", 1);
        let rule = PlacementRule::MaxPerHostname {
            max: 1,
            task_filter: StringMatcher::regex("hello-.*").unwrap(),
        };
        let tasks = vec![placed("world-0-server", "world", 0, "host-1", "")];
        assert!(
            rule.evaluate(&make_offer("host-1"), &PlacementContext::new(&pod, &tasks))
                .passed()
        );
    }

    #[test]
    fn duplicate_names_count_once() {
        let pod = PodInstance::new("hello", 2);
        let rule = PlacementRule::max_per_hostname(2);
        let tasks = vec![
            placed("hello-0-server", "hello", 0, "host-1", ""),
            placed("hello-0-server", "hello", 0, "host-1", ""),
        ];
        assert!(
            rule.evaluate(&make_offer("host-1"), &PlacementContext::new(&pod, &tasks))
                .passed()
        );
    }

    #[test]
    fn relaunch_passes_even_at_zero() {
        let pod = PodInstance::new("hello", 0);
        let rule = PlacementRule::max_per_hostname(0);
        let tasks = vec![placed("hello-0-server", "hello", 0, "host-1", "")];
        let ctx = PlacementContext::new(&pod, &tasks);
        assert!(rule.evaluate(&make_offer("host-1"), &ctx).passed());
        // A fresh host still forbids placement.
        assert!(!rule.evaluate(&make_offer("host-2"), &ctx).passed());
    }

    #[test]
    fn max_per_attribute_groups_by_value() {
        let pod = PodInstance::new("hello", 3);
        let rule = PlacementRule::MaxPerAttribute {
            max: 2,
            matcher: StringMatcher::attribute_regex("rack", ".*").unwrap(),
            task_filter: StringMatcher::Any,
        };
        let tasks = vec![
            placed("hello-0-server", "hello", 0, "h0", "rack:r1"),
            placed("hello-1-server", "hello", 1, "h1", "rack:r1"),
            placed("hello-2-server", "hello", 2, "h2", "rack:r2"),
        ];
        let ctx = PlacementContext::new(&pod, &tasks);
        assert!(!rule.evaluate(&make_offer("h3"), &ctx).passed());

        let r2 = Offer::new("o2", "agent-2", "h4").with_attribute(Attribute::text("rack", "r2"));
        assert!(rule.evaluate(&r2, &ctx).passed());

        let bare = Offer::new("o3", "agent-3", "h5");
        assert!(rule.evaluate(&bare, &ctx).passed());
    }

    #[test]
    fn max_per_zone_ignores_offers_without_domain() {
        let pod = PodInstance::new("hello", 1);
        let rule = PlacementRule::MaxPerZone {
            max: 1,
            task_filter: StringMatcher::Any,
        };
        let mut t = placed("hello-0-server", "hello", 0, "h0", "");
        t.labels.set(labels::OFFER_ZONE, "z1");
        let tasks = vec![t];
        let ctx = PlacementContext::new(&pod, &tasks);
        assert!(rule.evaluate(&make_offer("h1"), &ctx).passed());
        assert!(
            !rule
                .evaluate(&make_offer("h1").with_domain("r", "z1"), &ctx)
                .passed()
        );
        assert!(
            rule.evaluate(&make_offer("h1").with_domain("r", "z2"), &ctx)
                .passed()
        );
    }
}
