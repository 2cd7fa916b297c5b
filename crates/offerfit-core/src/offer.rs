//! Resource offers from a single agent.

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::resource::Resource;

/// Fault-domain placement of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub region: String,
    pub zone: String,
}

/// An offer of resources on one agent.
///
/// Offers are treated as immutable inputs. Anything that narrows an offer
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub agent_id: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainInfo>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Executors already running on the agent for this framework.
    #[serde(default)]
    pub executor_ids: Vec<String>,
}

impl Offer {
    pub fn new(
        id: impl Into<String>,
        agent_id: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            hostname: hostname.into(),
            domain: None,
            resources: Vec::new(),
            attributes: Vec::new(),
            executor_ids: Vec::new(),
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_domain(mut self, region: impl Into<String>, zone: impl Into<String>) -> Self {
        self.domain = Some(DomainInfo {
            region: region.into(),
            zone: zone.into(),
        });
        self
    }

    pub fn with_executor(mut self, executor_id: impl Into<String>) -> Self {
        self.executor_ids.push(executor_id.into());
        self
    }

    /// The same offer stripped of all resources.
    pub fn without_resources(&self) -> Self {
        self.with_resources(Vec::new())
    }

    /// The same offer carrying `resources` instead of its own.
    pub fn with_resources(&self, resources: Vec<Resource>) -> Self {
        Self {
            id: self.id.clone(),
            agent_id: self.agent_id.clone(),
            hostname: self.hostname.clone(),
            domain: self.domain.clone(),
            resources,
            attributes: self.attributes.clone(),
            executor_ids: self.executor_ids.clone(),
        }
    }

    pub fn region(&self) -> Option<&str> {
        self.domain.as_ref().map(|d| d.region.as_str())
    }

    pub fn zone(&self) -> Option<&str> {
        self.domain.as_ref().map(|d| d.zone.as_str())
    }

    pub fn has_executor(&self, executor_id: &str) -> bool {
        self.executor_ids.iter().any(|e| e == executor_id)
    }

    /// Find a resource carrying the given reservation id.
    pub fn resource_by_id(&self, resource_id: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.resource_id() == Some(resource_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn stripping_resources_keeps_identity() {
        let offer = Offer::new("o1", "a1", "host-1")
            .with_domain("us-east", "us-east-1a")
            .with_resource(Resource::new("cpus", Value::scalar(2.0)))
            .with_attribute(Attribute::text("rack", "r1"));
        let empty = offer.without_resources();
        assert!(empty.resources.is_empty());
        assert_eq!(empty.id, "o1");
        assert_eq!(empty.attributes, offer.attributes);
        assert_eq!(offer.resources.len(), 1);
        assert_eq!(empty.region(), Some("us-east"));
        assert_eq!(empty.zone(), Some("us-east-1a"));
    }

    #[test]
    fn executor_lookup() {
        let offer = Offer::new("o1", "a1", "h").with_executor("exec-1");
        assert!(offer.has_executor("exec-1"));
        assert!(!offer.has_executor("exec-2"));
    }
}
