//! Grouping keys shared by the spread rules.
//!
//! A grouping extracts the keys an offer falls under (its hostname, its
//! region, the attributes it carries) and the keys a launched task was
//! placed under, read back from the task's labels.

use offerfit_core::{AttributeString, Offer, TaskInfo};

use crate::matcher::StringMatcher;

pub(crate) enum Grouping<'r> {
    /// Canonical attribute strings accepted by a matcher.
    Matching(&'r StringMatcher),
    /// The attribute with this name, compared ignoring ASCII case. Keys
    /// are spelled with the rule's name so either casing groups together.
    Named(&'r str),
    Hostname,
    Region,
    Zone,
}

impl Grouping<'_> {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Grouping::Matching(_) | Grouping::Named(_) => "attribute",
            Grouping::Hostname => "hostname",
            Grouping::Region => "region",
            Grouping::Zone => "zone",
        }
    }

    pub(crate) fn offer_keys(&self, offer: &Offer) -> Vec<String> {
        match self {
            Grouping::Matching(matcher) => offer
                .attributes
                .iter()
                .map(|a| a.to_string())
                .filter(|s| matcher.matches(s))
                .collect(),
            Grouping::Named(name) => offer
                .attributes
                .iter()
                .filter(|a| a.name.eq_ignore_ascii_case(name))
                .map(|a| format!("{name}:{}", a.value))
                .take(1)
                .collect(),
            Grouping::Hostname => vec![offer.hostname.clone()],
            Grouping::Region => offer.region().map(str::to_string).into_iter().collect(),
            Grouping::Zone => offer.zone().map(str::to_string).into_iter().collect(),
        }
    }

    pub(crate) fn task_keys(&self, task: &TaskInfo) -> Vec<String> {
        match self {
            Grouping::Matching(matcher) => task
                .offer_attributes()
                .iter()
                .map(AttributeString::to_string)
                .filter(|s| matcher.matches(s))
                .collect(),
            Grouping::Named(name) => task
                .offer_attributes()
                .into_iter()
                .filter(|a| a.name.eq_ignore_ascii_case(name))
                .map(|a| format!("{name}:{}", a.value))
                .take(1)
                .collect(),
            Grouping::Hostname => task.hostname().map(str::to_string).into_iter().collect(),
            Grouping::Region => task.region().map(str::to_string).into_iter().collect(),
            Grouping::Zone => task.zone().map(str::to_string).into_iter().collect(),
        }
    }
}
