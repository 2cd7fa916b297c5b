//! Launched-task records.
//!
//! `TaskInfo` is both what the evaluator emits in a LAUNCH and what the
//! scheduler's state snapshot hands back on later evaluations. Everything
//! the evaluator needs to recognize a relaunch is read from its labels.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute::AttributeString;
use crate::labels::{self, Labels};
use crate::resource::Resource;

/// Identity of one pod instance: its type plus ordinal index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodInstance {
    pub pod_type: String,
    pub index: u32,
}

impl PodInstance {
    pub fn new(pod_type: impl Into<String>, index: u32) -> Self {
        Self {
            pod_type: pod_type.into(),
            index,
        }
    }

    /// Name of a task within this pod instance: `<type>-<index>-<task>`.
    pub fn task_name(&self, task: &str) -> String {
        format!("{}-{}-{}", self.pod_type, self.index, task)
    }
}

impl fmt::Display for PodInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pod_type, self.index)
    }
}

/// Last reported state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl TaskState {
    /// True while the task still occupies its executor.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskState::Staging | TaskState::Starting | TaskState::Running
        )
    }
}

/// A health or readiness check command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInfo {
    pub command: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// A port advertised for service discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryPort {
    pub name: String,
    pub number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    #[serde(default)]
    pub ports: Vec<DiscoveryPort>,
}

/// A volume mounted into the task's container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerVolume {
    pub container_path: String,
    /// Secret store path when the volume is backed by a secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Executor shared by the tasks of one pod instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorInfo {
    pub executor_id: String,
    pub name: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// A launched (or about to be launched) task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub task_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<CheckInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_check: Option<CheckInfo>,
    #[serde(default)]
    pub discovery: DiscoveryInfo,
    #[serde(default)]
    pub volumes: Vec<ContainerVolume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskState>,
}

impl TaskInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_id: String::new(),
            agent_id: String::new(),
            resources: Vec::new(),
            labels: Labels::new(),
            env: BTreeMap::new(),
            health_check: None,
            readiness_check: None,
            discovery: DiscoveryInfo::default(),
            volumes: Vec::new(),
            executor: None,
            status: None,
        }
    }

    pub fn task_type(&self) -> Option<&str> {
        self.labels.get(labels::TASK_TYPE)
    }

    pub fn index(&self) -> Option<u32> {
        self.labels.get(labels::INDEX)?.parse().ok()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.labels.get(labels::OFFER_HOSTNAME)
    }

    pub fn region(&self) -> Option<&str> {
        self.labels.get(labels::OFFER_REGION)
    }

    pub fn zone(&self) -> Option<&str> {
        self.labels.get(labels::OFFER_ZONE)
    }

    pub fn target_configuration(&self) -> Option<&str> {
        self.labels.get(labels::TARGET_CONFIGURATION)
    }

    /// Canonical attribute strings of the agent the task was placed on.
    pub fn offer_attributes(&self) -> Vec<AttributeString> {
        self.labels
            .get(labels::OFFER_ATTRIBUTES)
            .map(AttributeString::parse_list)
            .unwrap_or_default()
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.labels
            .get(labels::PERMANENTLY_FAILED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// True when this record belongs to the given pod instance.
    pub fn belongs_to(&self, pod: &PodInstance) -> bool {
        self.task_type() == Some(pod.pod_type.as_str()) && self.index() == Some(pod.index)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_some_and(|s| s.is_active())
    }

    pub fn executor_id(&self) -> Option<&str> {
        self.executor.as_ref().map(|e| e.executor_id.as_str())
    }

    /// Reservation ids held by the task's own resources.
    pub fn resource_ids(&self) -> Vec<&str> {
        self.resources.iter().filter_map(|r| r.resource_id()).collect()
    }

    pub fn discovery_port(&self, name: &str) -> Option<u64> {
        self.discovery
            .ports
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.number)
    }
}
