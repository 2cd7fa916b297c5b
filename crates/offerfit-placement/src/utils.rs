//! Builders for common rule trees.

use crate::rule::{PlacementRule, TaskTypeBehavior};

/// Keep off `avoid` agents and stay on `colocate` agents.
///
/// Returns `None` when both lists are empty. Single-element lists collapse
/// to their one child without an `Or` wrapper.
pub fn agent_rule(avoid: &[String], colocate: &[String]) -> Option<PlacementRule> {
    let avoid_rule = any_agent(avoid).map(PlacementRule::not);
    let colocate_rule = any_agent(colocate);
    match (avoid_rule, colocate_rule) {
        (Some(a), Some(c)) => Some(PlacementRule::and([a, c])),
        (a, c) => a.or(c),
    }
}

/// Avoid or colocate with pod types, ANDed with an optional custom rule.
pub fn task_type_rule(
    avoid: &[String],
    colocate: &[String],
    custom: Option<PlacementRule>,
) -> Option<PlacementRule> {
    let mut rules: Vec<PlacementRule> = avoid
        .iter()
        .map(|t| PlacementRule::TaskType {
            task_type: t.clone(),
            behavior: TaskTypeBehavior::Avoid,
        })
        .chain(colocate.iter().map(|t| PlacementRule::TaskType {
            task_type: t.clone(),
            behavior: TaskTypeBehavior::Colocate,
        }))
        .collect();
    rules.extend(custom);
    collapse(rules, |rules| PlacementRule::and(rules))
}

fn any_agent(agents: &[String]) -> Option<PlacementRule> {
    collapse(
        agents.iter().map(|a| PlacementRule::agent(a.as_str())).collect(),
        |rules| PlacementRule::or(rules),
    )
}

fn collapse(
    mut rules: Vec<PlacementRule>,
    combine: fn(Vec<PlacementRule>) -> PlacementRule,
) -> Option<PlacementRule> {
    match rules.len() {
        0 => None,
        1 => rules.pop(),
        _ => Some(combine(rules)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nothing_requested() {
        assert_eq!(agent_rule(&[], &[]), None);
        assert_eq!(task_type_rule(&[], &[], None), None);
    }

    #[test]
    fn single_agents_collapse() {
        assert_eq!(
            agent_rule(&ids(&["a1"]), &[]),
            Some(PlacementRule::not(PlacementRule::agent("a1")))
        );
        assert_eq!(
            agent_rule(&[], &ids(&["a2"])),
            Some(PlacementRule::agent("a2"))
        );
    }

    #[test]
    fn avoid_and_colocate_lists() {
        let rule = agent_rule(&ids(&["a1", "a2"]), &ids(&["a3"])).unwrap();
        let expected = PlacementRule::and([
            PlacementRule::not(PlacementRule::or([
                PlacementRule::agent("a1"),
                PlacementRule::agent("a2"),
            ])),
            PlacementRule::agent("a3"),
        ]);
        assert_eq!(rule, expected);
    }

    #[test]
    fn task_types_with_custom_rule() {
        let single = task_type_rule(&ids(&["data"]), &[], None).unwrap();
        assert_eq!(
            single,
            PlacementRule::TaskType {
                task_type: "data".into(),
                behavior: TaskTypeBehavior::Avoid
            }
        );

        let combined = task_type_rule(
            &ids(&["data"]),
            &ids(&["index"]),
            Some(PlacementRule::max_per_hostname(1)),
        )
        .unwrap();
        match combined {
            PlacementRule::And { rules } => {
                assert_eq!(rules.len(), 3);
                assert_eq!(rules[2], PlacementRule::max_per_hostname(1));
            }
            other => panic!("expected and, got {other:?}"),
        }
    }
}
