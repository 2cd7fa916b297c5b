//! The placement rule tree.
//!
//! Rules are a closed, serializable tree. Leaves test one offer field,
//! `And`/`Or`/`Not` combine children, and the spread rules (`TaskType`,
//! `MaxPer*`, `RoundRobinBy*`) consult the snapshot of launched tasks.
//!
//! Every rule maps an offer to an offer whose resources are a subset of the
//! input: accept returns it unchanged, reject returns a zero-resource copy.

use offerfit_core::{Offer, PodInstance, TaskInfo};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::grouping::Grouping;
use crate::matcher::StringMatcher;
use crate::{max_per, round_robin, task_type};

/// Read-only inputs shared by every rule in one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct PlacementContext<'a> {
    /// The pod instance being placed.
    pub pod: &'a PodInstance,
    /// Launched-task snapshot for the whole scheduling round.
    pub tasks: &'a [TaskInfo],
    /// Region the scheduler itself runs in, when known.
    pub local_region: Option<&'a str>,
}

impl<'a> PlacementContext<'a> {
    pub fn new(pod: &'a PodInstance, tasks: &'a [TaskInfo]) -> Self {
        Self {
            pod,
            tasks,
            local_region: None,
        }
    }

    pub fn with_local_region(mut self, region: Option<&'a str>) -> Self {
        self.local_region = region;
        self
    }

    /// True when `task` is a prior launch of the pod instance being placed.
    pub fn is_own_slot(&self, task: &TaskInfo) -> bool {
        task.belongs_to(self.pod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Reject,
}

/// The filtered offer plus why.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub offer: Offer,
    pub verdict: Verdict,
    pub reason: String,
}

impl RuleOutcome {
    pub fn accept(offer: &Offer, reason: impl Into<String>) -> Self {
        Self {
            offer: offer.clone(),
            verdict: Verdict::Accept,
            reason: reason.into(),
        }
    }

    pub fn reject(offer: &Offer, reason: impl Into<String>) -> Self {
        Self {
            offer: offer.without_resources(),
            verdict: Verdict::Reject,
            reason: reason.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Accept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTypeBehavior {
    Avoid,
    Colocate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementRule {
    Passthrough,
    Agent {
        matcher: StringMatcher,
    },
    Hostname {
        matcher: StringMatcher,
    },
    Attribute {
        matcher: StringMatcher,
    },
    Region {
        matcher: StringMatcher,
    },
    Zone {
        matcher: StringMatcher,
    },
    IsLocalRegion,
    And {
        rules: Vec<PlacementRule>,
    },
    Or {
        rules: Vec<PlacementRule>,
    },
    Not {
        rule: Box<PlacementRule>,
    },
    TaskType {
        task_type: String,
        behavior: TaskTypeBehavior,
    },
    MaxPerAttribute {
        max: u32,
        matcher: StringMatcher,
        #[serde(default)]
        task_filter: StringMatcher,
    },
    MaxPerHostname {
        max: u32,
        #[serde(default)]
        task_filter: StringMatcher,
    },
    MaxPerRegion {
        max: u32,
        #[serde(default)]
        task_filter: StringMatcher,
    },
    MaxPerZone {
        max: u32,
        #[serde(default)]
        task_filter: StringMatcher,
    },
    RoundRobinByAttribute {
        attribute: String,
        #[serde(default)]
        total_count: Option<u32>,
        #[serde(default)]
        task_filter: StringMatcher,
    },
    RoundRobinByHostname {
        #[serde(default)]
        agent_count: Option<u32>,
        #[serde(default)]
        task_filter: StringMatcher,
    },
    RoundRobinByRegion {
        #[serde(default)]
        region_count: Option<u32>,
        #[serde(default)]
        task_filter: StringMatcher,
    },
    RoundRobinByZone {
        #[serde(default)]
        zone_count: Option<u32>,
        #[serde(default)]
        task_filter: StringMatcher,
    },
}

impl PlacementRule {
    pub fn and(rules: impl IntoIterator<Item = PlacementRule>) -> Self {
        PlacementRule::And {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn or(rules: impl IntoIterator<Item = PlacementRule>) -> Self {
        PlacementRule::Or {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn not(rule: PlacementRule) -> Self {
        PlacementRule::Not {
            rule: Box::new(rule),
        }
    }

    pub fn agent(agent_id: impl Into<String>) -> Self {
        PlacementRule::Agent {
            matcher: StringMatcher::exact(agent_id),
        }
    }

    pub fn max_per_hostname(max: u32) -> Self {
        PlacementRule::MaxPerHostname {
            max,
            task_filter: StringMatcher::Any,
        }
    }

    /// Short identifier used in logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            PlacementRule::Passthrough => "passthrough",
            PlacementRule::Agent { .. } => "agent",
            PlacementRule::Hostname { .. } => "hostname",
            PlacementRule::Attribute { .. } => "attribute",
            PlacementRule::Region { .. } => "region",
            PlacementRule::Zone { .. } => "zone",
            PlacementRule::IsLocalRegion => "is_local_region",
            PlacementRule::And { .. } => "and",
            PlacementRule::Or { .. } => "or",
            PlacementRule::Not { .. } => "not",
            PlacementRule::TaskType { .. } => "task_type",
            PlacementRule::MaxPerAttribute { .. } => "max_per_attribute",
            PlacementRule::MaxPerHostname { .. } => "max_per_hostname",
            PlacementRule::MaxPerRegion { .. } => "max_per_region",
            PlacementRule::MaxPerZone { .. } => "max_per_zone",
            PlacementRule::RoundRobinByAttribute { .. } => "round_robin_by_attribute",
            PlacementRule::RoundRobinByHostname { .. } => "round_robin_by_hostname",
            PlacementRule::RoundRobinByRegion { .. } => "round_robin_by_region",
            PlacementRule::RoundRobinByZone { .. } => "round_robin_by_zone",
        }
    }

    /// Filter `offer`, returning only the resources this rule allows.
    pub fn filter(&self, offer: &Offer, ctx: &PlacementContext<'_>) -> Offer {
        self.evaluate(offer, ctx).offer
    }

    /// Filter `offer` and report the verdict with a reason.
    pub fn evaluate(&self, offer: &Offer, ctx: &PlacementContext<'_>) -> RuleOutcome {
        let outcome = self.evaluate_inner(offer, ctx);
        trace!(
            rule = self.kind(),
            offer = %offer.id,
            passed = outcome.passed(),
            reason = %outcome.reason,
            "evaluated placement rule"
        );
        outcome
    }

    fn evaluate_inner(&self, offer: &Offer, ctx: &PlacementContext<'_>) -> RuleOutcome {
        match self {
            PlacementRule::Passthrough => RuleOutcome::accept(offer, "passthrough"),
            PlacementRule::Agent { matcher } => {
                field_rule(offer, "agent", Some(offer.agent_id.as_str()), matcher)
            }
            PlacementRule::Hostname { matcher } => {
                field_rule(offer, "hostname", Some(offer.hostname.as_str()), matcher)
            }
            PlacementRule::Region { matcher } => field_rule(offer, "region", offer.region(), matcher),
            PlacementRule::Zone { matcher } => field_rule(offer, "zone", offer.zone(), matcher),
            PlacementRule::Attribute { matcher } => attribute_rule(offer, matcher),
            PlacementRule::IsLocalRegion => local_region_rule(offer, ctx.local_region),
            PlacementRule::And { rules } => and_rule(rules, offer, ctx),
            PlacementRule::Or { rules } => or_rule(rules, offer, ctx),
            PlacementRule::Not { rule } => not_rule(rule, offer, ctx),
            PlacementRule::TaskType {
                task_type,
                behavior,
            } => task_type::evaluate(task_type, *behavior, offer, ctx),
            PlacementRule::MaxPerAttribute {
                max,
                matcher,
                task_filter,
            } => max_per::evaluate(&Grouping::Matching(matcher), *max, task_filter, offer, ctx),
            PlacementRule::MaxPerHostname { max, task_filter } => {
                max_per::evaluate(&Grouping::Hostname, *max, task_filter, offer, ctx)
            }
            PlacementRule::MaxPerRegion { max, task_filter } => {
                max_per::evaluate(&Grouping::Region, *max, task_filter, offer, ctx)
            }
            PlacementRule::MaxPerZone { max, task_filter } => {
                max_per::evaluate(&Grouping::Zone, *max, task_filter, offer, ctx)
            }
            PlacementRule::RoundRobinByAttribute {
                attribute,
                total_count,
                task_filter,
            } => round_robin::evaluate(
                &Grouping::Named(attribute),
                *total_count,
                task_filter,
                offer,
                ctx,
            ),
            PlacementRule::RoundRobinByHostname {
                agent_count,
                task_filter,
            } => round_robin::evaluate(&Grouping::Hostname, *agent_count, task_filter, offer, ctx),
            PlacementRule::RoundRobinByRegion {
                region_count,
                task_filter,
            } => round_robin::evaluate(&Grouping::Region, *region_count, task_filter, offer, ctx),
            PlacementRule::RoundRobinByZone {
                zone_count,
                task_filter,
            } => round_robin::evaluate(&Grouping::Zone, *zone_count, task_filter, offer, ctx),
        }
    }
}

fn field_rule(
    offer: &Offer,
    field: &str,
    value: Option<&str>,
    matcher: &StringMatcher,
) -> RuleOutcome {
    match value {
        Some(v) if matcher.matches(v) => {
            RuleOutcome::accept(offer, format!("{field} '{v}' matches {matcher}"))
        }
        Some(v) => RuleOutcome::reject(offer, format!("{field} '{v}' doesn't match {matcher}")),
        None => RuleOutcome::reject(offer, format!("offer has no {field}")),
    }
}

fn attribute_rule(offer: &Offer, matcher: &StringMatcher) -> RuleOutcome {
    match offer
        .attributes
        .iter()
        .map(|a| a.to_string())
        .find(|s| matcher.matches(s))
    {
        Some(found) => RuleOutcome::accept(offer, format!("attribute '{found}' matches {matcher}")),
        None => RuleOutcome::reject(offer, format!("no attribute matches {matcher}")),
    }
}

fn local_region_rule(offer: &Offer, local_region: Option<&str>) -> RuleOutcome {
    match (offer.region(), local_region) {
        (None, _) => RuleOutcome::accept(offer, "offer has no region, treated as local"),
        (Some(_), None) => RuleOutcome::accept(offer, "scheduler region unknown"),
        (Some(region), Some(local)) if region == local => {
            RuleOutcome::accept(offer, format!("region '{region}' is local"))
        }
        (Some(region), Some(local)) => RuleOutcome::reject(
            offer,
            format!("region '{region}' is not the local region '{local}'"),
        ),
    }
}

fn and_rule(rules: &[PlacementRule], offer: &Offer, ctx: &PlacementContext<'_>) -> RuleOutcome {
    // Each child sees the previous child's output, so the result is the
    // intersection of what every child allows.
    let mut current = offer.clone();
    let mut reasons = Vec::with_capacity(rules.len());
    for rule in rules {
        let outcome = rule.evaluate(&current, ctx);
        if !outcome.passed() {
            return RuleOutcome::reject(offer, format!("and: {}", outcome.reason));
        }
        reasons.push(outcome.reason);
        current = outcome.offer;
    }
    RuleOutcome {
        offer: current,
        verdict: Verdict::Accept,
        reason: format!("and: [{}]", reasons.join("; ")),
    }
}

fn or_rule(rules: &[PlacementRule], offer: &Offer, ctx: &PlacementContext<'_>) -> RuleOutcome {
    let mut reasons = Vec::with_capacity(rules.len());
    for rule in rules {
        let outcome = rule.evaluate(offer, ctx);
        if outcome.passed() {
            return RuleOutcome {
                reason: format!("or: {}", outcome.reason),
                ..outcome
            };
        }
        reasons.push(outcome.reason);
    }
    RuleOutcome::reject(offer, format!("or: none passed [{}]", reasons.join("; ")))
}

fn not_rule(rule: &PlacementRule, offer: &Offer, ctx: &PlacementContext<'_>) -> RuleOutcome {
    let outcome = rule.evaluate(offer, ctx);
    if outcome.passed() {
        RuleOutcome::reject(offer, format!("not: {}", outcome.reason))
    } else {
        RuleOutcome::accept(offer, format!("not: {}", outcome.reason))
    }
}
