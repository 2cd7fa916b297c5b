//! What a pod asks for.
//!
//! A [`PodSpec`] declares tasks and the resource sets they draw from. A
//! [`PodInstanceRequirement`] picks one instance of that pod and the subset
//! of its tasks to (re)launch.

use std::collections::BTreeMap;
use std::fmt;

use offerfit_core::{ANY_ROLE, CheckInfo, PodInstance, Value};
use offerfit_placement::PlacementRule;
use serde::{Deserialize, Serialize};

use crate::error::{EvaluatorError, EvaluatorResult};

/// Who a reservation is made for and which unreserved role it draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSpec {
    pub role: String,
    pub principal: String,
    /// Role whose unreserved capacity is consumed. Defaults to `*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_reserved_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ReservationSpec {
    pub fn new(role: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            principal: principal.into(),
            pre_reserved_role: None,
            namespace: None,
        }
    }

    pub fn source_role(&self) -> &str {
        self.pre_reserved_role.as_deref().unwrap_or(ANY_ROLE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    pub value: Value,
    #[serde(flatten)]
    pub reservation: ReservationSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    Root,
    Mount,
    Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub kind: VolumeKind,
    pub container_path: String,
    /// Size in MB.
    pub size: f64,
    #[serde(flatten)]
    pub reservation: ReservationSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipSpec {
    pub name: String,
    pub port: u64,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    pub port_name: String,
    /// Zero requests a dynamically assigned port.
    #[serde(default)]
    pub port: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip: Option<VipSpec>,
    #[serde(flatten)]
    pub reservation: ReservationSpec,
}

impl PortSpec {
    pub fn is_dynamic(&self) -> bool {
        self.port == 0
    }

    /// Environment variable carrying the port number.
    pub fn env_key(&self, number: u64) -> String {
        if let Some(key) = &self.env_key {
            return key.clone();
        }
        if self.port_name.is_empty() {
            format!("PORT_{number}")
        } else {
            format!("PORT_{}", self.port_name.to_uppercase().replace('-', "_"))
        }
    }
}

/// A named group of resources, volumes and ports a task consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSet {
    pub id: String,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalState {
    Running,
    Finished,
    Once,
}

impl fmt::Display for GoalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GoalState::Running => "RUNNING",
            GoalState::Finished => "FINISHED",
            GoalState::Once => "ONCE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionKind {
    Tls,
    Keystore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEncryptionSpec {
    pub name: String,
    pub kind: EncryptionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub goal_state: GoalState,
    pub resource_set_id: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<CheckInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_check: Option<CheckInfo>,
    #[serde(default)]
    pub transport_encryption: Vec<TransportEncryptionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    pub pod_type: String,
    pub count: u32,
    /// Tasks share one executor whose resources are reserved once per pod.
    #[serde(default)]
    pub shared_executor: bool,
    /// Reservation used for the shared executor's resources.
    pub executor_reservation: ReservationSpec,
    #[serde(default)]
    pub resource_sets: Vec<ResourceSet>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementRule>,
}

impl PodSpec {
    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn resource_set(&self, id: &str) -> Option<&ResourceSet> {
        self.resource_sets.iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployKind {
    #[default]
    Normal,
    /// The pod's previous agent is gone for good; start over elsewhere.
    PermanentReplacement,
}

/// One pod instance and the tasks to launch in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodInstanceRequirement {
    pub pod: PodSpec,
    pub index: u32,
    pub tasks_to_launch: Vec<String>,
    #[serde(default)]
    pub deploy_kind: DeployKind,
}

impl PodInstanceRequirement {
    pub fn new(pod: PodSpec, index: u32, tasks_to_launch: Vec<String>) -> Self {
        Self {
            pod,
            index,
            tasks_to_launch,
            deploy_kind: DeployKind::Normal,
        }
    }

    pub fn pod_instance(&self) -> PodInstance {
        PodInstance::new(self.pod.pod_type.clone(), self.index)
    }

    /// Check that every referenced task and resource set exists.
    pub fn validate(&self) -> EvaluatorResult<()> {
        let invalid = |reason: String| EvaluatorError::InvalidRequirement {
            pod: self.pod_instance().to_string(),
            reason,
        };
        if self.tasks_to_launch.is_empty() {
            return Err(invalid("no tasks to launch".to_string()));
        }
        if let Some(missing) = self
            .tasks_to_launch
            .iter()
            .find(|name| self.pod.task(name).is_none())
        {
            return Err(invalid(format!("unknown task '{missing}'")));
        }
        if let Some(task) = self
            .pod
            .tasks
            .iter()
            .find(|t| self.pod.resource_set(&t.resource_set_id).is_none())
        {
            return Err(invalid(format!(
                "task '{}' references unknown resource set '{}'",
                task.name, task.resource_set_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod() -> PodSpec {
        PodSpec {
            pod_type: "hello".into(),
            count: 1,
            shared_executor: false,
            executor_reservation: ReservationSpec::new("hello-role", "hello-principal"),
            resource_sets: vec![ResourceSet {
                id: "server-resources".into(),
                resources: vec![ResourceSpec {
                    name: "cpus".into(),
                    value: Value::scalar(1.0),
                    reservation: ReservationSpec::new("hello-role", "hello-principal"),
                }],
                volumes: vec![],
                ports: vec![],
            }],
            tasks: vec![TaskSpec {
                name: "server".into(),
                goal_state: GoalState::Running,
                resource_set_id: "server-resources".into(),
                env: BTreeMap::new(),
                health_check: None,
                readiness_check: None,
                transport_encryption: vec![],
            }],
            placement: None,
        }
    }

    #[test]
    fn valid_requirement() {
        let req = PodInstanceRequirement::new(pod(), 0, vec!["server".into()]);
        assert!(req.validate().is_ok());
        assert_eq!(req.pod_instance().to_string(), "hello-0");
    }

    #[test]
    fn unknown_task_is_invalid() {
        let req = PodInstanceRequirement::new(pod(), 0, vec!["missing".into()]);
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("unknown task 'missing'"));
    }

    #[test]
    fn unknown_resource_set_is_invalid() {
        let mut p = pod();
        p.tasks[0].resource_set_id = "nope".into();
        let req = PodInstanceRequirement::new(p, 0, vec!["server".into()]);
        assert!(matches!(
            req.validate(),
            Err(EvaluatorError::InvalidRequirement { .. })
        ));
    }

    #[test]
    fn port_env_keys() {
        let mut port = PortSpec {
            port_name: "http-admin".into(),
            port: 0,
            env_key: None,
            visibility: None,
            vip: None,
            reservation: ReservationSpec::new("r", "p"),
        };
        assert_eq!(port.env_key(8080), "PORT_HTTP_ADMIN");
        port.port_name.clear();
        assert_eq!(port.env_key(8080), "PORT_8080");
        port.env_key = Some("ADMIN".into());
        assert_eq!(port.env_key(8080), "ADMIN");
    }

    #[test]
    fn reservation_spec_flattens() {
        let json = r#"{"name":"mem","value":{"type":"scalar","value":256.0},"role":"r","principal":"p"}"#;
        let spec: ResourceSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.reservation.source_role(), ANY_ROLE);
        assert_eq!(spec.reservation.role, "r");
    }
}
