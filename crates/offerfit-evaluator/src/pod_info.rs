//! Accumulated launch state for one (requirement, offer) trial.
//!
//! Stages write into a [`PodInfoBuilder`]: each task gets a [`TaskDraft`]
//! holding the `TaskInfo` being assembled, and [`PodState`] carries the
//! pod-level context shared across tasks (the executor and its one-time
//! reservation, dynamic ports already handed out).

use std::collections::{BTreeMap, BTreeSet};

use offerfit_core::{ExecutorInfo, PodInstance, Resource, TaskInfo};

use crate::pod::{DeployKind, PodInstanceRequirement, ResourceSet, TaskSpec};

/// Pod-level state threaded through every task's stages.
#[derive(Debug, Clone, Default)]
pub struct PodState {
    /// Executor every task of the pod launches under, when shared.
    pub executor: Option<ExecutorInfo>,
    /// Set once the executor has been resolved for this trial.
    pub executor_resolved: bool,
    /// Ports claimed by any task of the pod in this trial.
    pub assigned_ports: BTreeSet<u64>,
}

/// A task being assembled for launch.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub spec: TaskSpec,
    pub resource_set: ResourceSet,
    pub info: TaskInfo,
    /// False for tasks evaluated only to hold their resource set.
    pub launch: bool,
    /// Earlier task in the plan that owns this task's resource set.
    pub resource_owner: Option<String>,
    /// Port environment variables written by the port stage.
    pub port_env: BTreeMap<String, String>,
    /// Set by the launch stage once the task is complete.
    pub ready: bool,
}

pub struct PodInfoBuilder {
    pub pod: PodInstance,
    pub target_config: String,
    pub state: PodState,
    drafts: Vec<TaskDraft>,
    /// Resource set id of every task in the pod, by task name.
    task_sets: BTreeMap<String, String>,
    prior_tasks: BTreeMap<String, TaskInfo>,
    treat_as_new: bool,
}

impl PodInfoBuilder {
    /// Plan the tasks to evaluate for `requirement`.
    ///
    /// Tasks to launch come first, in pod order. Remaining tasks whose
    /// resource set is not yet covered are added as bookkeeping entries so
    /// their reservations are kept. `tasks` is the round's launched-task
    /// snapshot; records of this pod instance become the prior tasks.
    pub fn new(
        requirement: &PodInstanceRequirement,
        target_config: impl Into<String>,
        tasks: &[TaskInfo],
    ) -> Self {
        let pod = requirement.pod_instance();
        let prior_tasks: BTreeMap<String, TaskInfo> = tasks
            .iter()
            .filter(|t| t.belongs_to(&pod))
            .map(|t| (t.name.clone(), t.clone()))
            .collect();

        let failed = prior_tasks.values().any(TaskInfo::is_permanently_failed);
        let has_reservations = prior_tasks.values().any(|t| !t.resource_ids().is_empty());
        let treat_as_new = requirement.deploy_kind == DeployKind::PermanentReplacement
            || failed
            || !has_reservations;

        let mut builder = Self {
            pod,
            target_config: target_config.into(),
            state: PodState::default(),
            drafts: Vec::new(),
            task_sets: requirement
                .pod
                .tasks
                .iter()
                .map(|t| (t.name.clone(), t.resource_set_id.clone()))
                .collect(),
            prior_tasks,
            treat_as_new,
        };

        let launching = requirement
            .pod
            .tasks
            .iter()
            .filter(|t| requirement.tasks_to_launch.contains(&t.name));
        for spec in launching {
            builder.plan(requirement, spec, true);
        }
        for spec in &requirement.pod.tasks {
            let covered = builder
                .drafts
                .iter()
                .any(|d| d.resource_set.id == spec.resource_set_id);
            if !covered {
                builder.plan(requirement, spec, false);
            }
        }
        builder
    }

    fn plan(&mut self, requirement: &PodInstanceRequirement, spec: &TaskSpec, launch: bool) {
        // Validated by the evaluator before planning.
        let Some(resource_set) = requirement.pod.resource_set(&spec.resource_set_id) else {
            return;
        };
        let resource_owner = self
            .drafts
            .iter()
            .find(|d| d.resource_set.id == spec.resource_set_id)
            .map(|d| d.spec.name.clone());
        let mut info = TaskInfo::new(self.pod.task_name(&spec.name));
        info.env = spec.env.clone();
        info.health_check = spec.health_check.clone();
        info.readiness_check = spec.readiness_check.clone();
        self.drafts.push(TaskDraft {
            spec: spec.clone(),
            resource_set: resource_set.clone(),
            info,
            launch,
            resource_owner,
            port_env: BTreeMap::new(),
            ready: false,
        });
    }

    /// True when prior reservations must be ignored: a permanent
    /// replacement, a pod labeled as failed, or one that never reserved.
    pub fn treat_as_new(&self) -> bool {
        self.treat_as_new
    }

    pub fn drafts(&self) -> &[TaskDraft] {
        &self.drafts
    }

    pub fn draft(&self, task: &str) -> Option<&TaskDraft> {
        self.drafts.iter().find(|d| d.spec.name == task)
    }

    pub fn draft_mut(&mut self, task: &str) -> Option<&mut TaskDraft> {
        self.drafts.iter_mut().find(|d| d.spec.name == task)
    }

    /// The draft holding `task`'s resources: its owner when it shares a
    /// resource set with an earlier task, otherwise itself.
    pub fn resource_draft(&self, task: &str) -> Option<&TaskDraft> {
        let draft = self.draft(task)?;
        match &draft.resource_owner {
            Some(owner) => self.draft(owner),
            None => Some(draft),
        }
    }

    /// Prior launch of `task`, unless the pod is being treated as new.
    pub fn prior_task(&self, task: &str) -> Option<&TaskInfo> {
        if self.treat_as_new {
            return None;
        }
        self.prior_tasks.get(&self.pod.task_name(task))
    }

    /// Prior record holding `task`'s resource set: its own, or that of any
    /// task in the pod sharing the set, whether planned in this trial or not.
    pub fn prior_for_resources(&self, task: &str) -> Option<&TaskInfo> {
        if let Some(prior) = self.prior_task(task) {
            return Some(prior);
        }
        let set_id = self.task_sets.get(task)?;
        self.task_sets
            .iter()
            .filter(|(name, set)| *set == set_id && name.as_str() != task)
            .find_map(|(name, _)| self.prior_task(name))
    }

    /// Every prior record of this pod instance, regardless of reuse.
    pub fn prior_tasks(&self) -> impl Iterator<Item = &TaskInfo> {
        self.prior_tasks.values()
    }

    /// A prior task still running on its executor, if any.
    pub fn running_prior(&self) -> Option<&TaskInfo> {
        if self.treat_as_new {
            return None;
        }
        self.prior_tasks
            .values()
            .find(|t| t.is_active() && t.executor.is_some())
    }

    /// Prior executor whose resource ids may be reused.
    pub fn prior_executor(&self) -> Option<&ExecutorInfo> {
        if self.treat_as_new {
            return None;
        }
        self.prior_tasks.values().find_map(|t| t.executor.as_ref())
    }

    /// Target configuration recorded on prior tasks, if any.
    pub fn recorded_target_config(&self) -> Option<&str> {
        self.prior_tasks
            .values()
            .find_map(TaskInfo::target_configuration)
    }

    pub fn add_resource(&mut self, task: &str, resource: Resource) {
        if let Some(draft) = self.draft_mut(task) {
            draft.info.resources.push(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::{GoalState, PodSpec, ReservationSpec};
    use offerfit_core::{Reservation, Value, labels};

    fn task(name: &str, set: &str) -> TaskSpec {
        TaskSpec {
            name: name.into(),
            goal_state: GoalState::Running,
            resource_set_id: set.into(),
            env: BTreeMap::from([("MODE".to_string(), name.to_string())]),
            health_check: None,
            readiness_check: None,
            transport_encryption: vec![],
        }
    }

    fn set(id: &str) -> ResourceSet {
        ResourceSet {
            id: id.into(),
            resources: vec![],
            volumes: vec![],
            ports: vec![],
        }
    }

    fn requirement(launch: &[&str]) -> PodInstanceRequirement {
        let pod = PodSpec {
            pod_type: "hello".into(),
            count: 2,
            shared_executor: true,
            executor_reservation: ReservationSpec::new("r", "p"),
            resource_sets: vec![set("a"), set("b")],
            tasks: vec![task("init", "a"), task("server", "a"), task("sidecar", "b")],
            placement: None,
        };
        PodInstanceRequirement::new(pod, 1, launch.iter().map(|s| s.to_string()).collect())
    }

    fn prior(name: &str, index: u32, resource_id: &str) -> TaskInfo {
        let mut t = TaskInfo::new(name);
        t.labels.set(labels::TASK_TYPE, "hello");
        t.labels.set(labels::INDEX, index.to_string());
        t.labels.set(labels::TARGET_CONFIGURATION, "cfg-old");
        t.resources.push(
            offerfit_core::Resource::new("cpus", Value::scalar(1.0)).with_reservation(
                Reservation {
                    principal: "p".into(),
                    resource_id: resource_id.into(),
                    namespace: None,
                },
            ),
        );
        t
    }

    #[test]
    fn plans_launches_then_uncovered_sets() {
        let builder = PodInfoBuilder::new(&requirement(&["server"]), "cfg", &[]);
        let names: Vec<(&str, bool)> = builder
            .drafts()
            .iter()
            .map(|d| (d.spec.name.as_str(), d.launch))
            .collect();
        assert_eq!(names, vec![("server", true), ("sidecar", false)]);
        assert_eq!(builder.drafts()[0].info.name, "hello-1-server");
        assert_eq!(builder.drafts()[0].info.env.get("MODE").map(String::as_str), Some("server"));
    }

    #[test]
    fn shared_resource_set_has_an_owner() {
        let builder = PodInfoBuilder::new(&requirement(&["init", "server"]), "cfg", &[]);
        assert_eq!(builder.draft("server").unwrap().resource_owner.as_deref(), Some("init"));
        assert_eq!(builder.resource_draft("server").unwrap().spec.name, "init");
    }

    #[test]
    fn priors_are_scoped_to_the_pod_instance() {
        let tasks = vec![prior("hello-1-server", 1, "rid-1"), prior("hello-0-server", 0, "rid-0")];
        let builder = PodInfoBuilder::new(&requirement(&["server"]), "cfg", &tasks);
        assert!(!builder.treat_as_new());
        assert_eq!(builder.prior_tasks().count(), 1);
        assert_eq!(builder.prior_task("server").unwrap().resource_ids(), vec!["rid-1"]);
        assert_eq!(builder.recorded_target_config(), Some("cfg-old"));
    }

    #[test]
    fn shared_set_falls_back_to_unplanned_sibling() {
        let tasks = vec![prior("hello-1-init", 1, "rid-init")];
        let builder = PodInfoBuilder::new(&requirement(&["server"]), "cfg", &tasks);
        assert!(builder.draft("init").is_none());
        let prior = builder.prior_for_resources("server").unwrap();
        assert_eq!(prior.name, "hello-1-init");
        assert!(builder.prior_for_resources("sidecar").is_none());
    }

    #[test]
    fn failed_or_replaced_pods_are_new() {
        let mut failed = prior("hello-1-server", 1, "rid-1");
        failed.labels.set(labels::PERMANENTLY_FAILED, "true");
        let builder = PodInfoBuilder::new(&requirement(&["server"]), "cfg", &[failed]);
        assert!(builder.treat_as_new());
        assert!(builder.prior_task("server").is_none());

        let mut req = requirement(&["server"]);
        req.deploy_kind = DeployKind::PermanentReplacement;
        let tasks = vec![prior("hello-1-server", 1, "rid-1")];
        let builder = PodInfoBuilder::new(&req, "cfg", &tasks);
        assert!(builder.treat_as_new());
        assert!(builder.prior_for_resources("server").is_none());
    }
}
