//! Durable task labels.
//!
//! Labels are the only state an evaluation writes back onto a launched task.
//! Later evaluations read them to recognize relaunches and to feed placement
//! rules.

use serde::{Deserialize, Serialize};

pub const GOAL_STATE: &str = "goal_state";
pub const INDEX: &str = "index";
pub const OFFER_ATTRIBUTES: &str = "offer_attributes";
pub const OFFER_HOSTNAME: &str = "offer_hostname";
pub const OFFER_REGION: &str = "offer_region";
pub const OFFER_ZONE: &str = "offer_zone";
pub const TARGET_CONFIGURATION: &str = "target_configuration";
pub const TASK_TYPE: &str = "task_type";
pub const PERMANENTLY_FAILED: &str = "permanently_failed";

/// Prefix for named-VIP labels; the rest of the key is a short hash.
pub const VIP_PREFIX: &str = "VIP_";

/// A single key/value label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

/// Ordered labels. Insertion order is kept; re-setting a key replaces the
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(Vec<Label>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|l| l.key == key)
            .map(|l| l.value.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|l| l.key == key) {
            Some(existing) => existing.value = value,
            None => self.0.push(Label { key, value }),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.0.iter().position(|l| l.key == key)?;
        Some(self.0.remove(pos).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|l| l.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = Labels::new();
        for (k, v) in iter {
            labels.set(k, v);
        }
        labels
    }
}
