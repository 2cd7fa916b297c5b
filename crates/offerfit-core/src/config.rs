//! offerfit.toml configuration parser.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Evaluator settings loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub service_name: String,
    /// Region of the scheduler itself; used by local-region placement.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub volumes: VolumesConfig,
    #[serde(default)]
    pub tls: TlsConfig,
}

/// Resources reserved once per pod for its shared executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_cpus")]
    pub cpus: f64,
    #[serde(default = "default_executor_mem")]
    pub mem: f64,
    #[serde(default = "default_executor_disk")]
    pub disk: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumesConfig {
    /// Restrict MOUNT volumes to disks under this root. Any root when unset.
    #[serde(default)]
    pub mount_root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub secrets_namespace: Option<String>,
    #[serde(default = "default_issue_timeout_secs")]
    pub issue_timeout_secs: u64,
}

fn default_executor_cpus() -> f64 {
    0.1
}

fn default_executor_mem() -> f64 {
    32.0
}

fn default_executor_disk() -> f64 {
    256.0
}

fn default_issue_timeout_secs() -> u64 {
    30
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            cpus: default_executor_cpus(),
            mem: default_executor_mem(),
            disk: default_executor_disk(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            secrets_namespace: None,
            issue_timeout_secs: default_issue_timeout_secs(),
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            service_name: "offerfit".to_string(),
            region: None,
            executor: ExecutorConfig::default(),
            volumes: VolumesConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

impl EvaluatorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: EvaluatorConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Namespace under which TLS secrets are stored. Falls back to the
    /// service name.
    pub fn secrets_namespace(&self) -> &str {
        self.tls
            .secrets_namespace
            .as_deref()
            .unwrap_or(&self.service_name)
    }
}
