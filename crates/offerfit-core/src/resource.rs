//! Offered and reserved resources.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The default, unreserved role.
pub const ANY_ROLE: &str = "*";

/// A dynamic reservation stamped onto a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub principal: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Where a disk's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiskSource {
    /// A dedicated filesystem that can only be consumed whole.
    Mount { root: String },
    /// A directory carved out of a shared filesystem.
    Path { root: String },
}

/// Persistent volume metadata carried by a `disk` resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DiskSource>,
}

/// A named quantity, optionally reserved to a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub value: Value,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<Reservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskInfo>,
}

fn default_role() -> String {
    ANY_ROLE.to_string()
}

impl Resource {
    /// An unreserved resource in the default role.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            role: default_role(),
            reservation: None,
            disk: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_reservation(mut self, reservation: Reservation) -> Self {
        self.reservation = Some(reservation);
        self
    }

    pub fn with_disk(mut self, disk: DiskInfo) -> Self {
        self.disk = Some(disk);
        self
    }

    /// Same resource metadata, different quantity.
    pub fn with_value(&self, value: Value) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.reservation.as_ref().map(|r| r.resource_id.as_str())
    }

    pub fn persistence_id(&self) -> Option<&str> {
        self.disk.as_ref()?.persistence_id.as_deref()
    }

    pub fn is_reserved(&self) -> bool {
        self.reservation.is_some()
    }

    /// True for a whole-filesystem disk.
    pub fn is_mount_disk(&self) -> bool {
        matches!(
            self.disk.as_ref().and_then(|d| d.source.as_ref()),
            Some(DiskSource::Mount { .. })
        )
    }

    pub fn mount_root(&self) -> Option<&str> {
        match self.disk.as_ref()?.source.as_ref()? {
            DiskSource::Mount { root } => Some(root),
            DiskSource::Path { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_resource_exposes_ids() {
        let r = Resource::new("disk", Value::scalar(100.0))
            .with_role("svc-role")
            .with_reservation(Reservation {
                principal: "svc".into(),
                resource_id: "rid-1".into(),
                namespace: None,
            })
            .with_disk(DiskInfo {
                persistence_id: Some("pid-1".into()),
                container_path: Some("data".into()),
                source: None,
            });
        assert_eq!(r.resource_id(), Some("rid-1"));
        assert_eq!(r.persistence_id(), Some("pid-1"));
        assert!(r.is_reserved());
        assert!(!r.is_mount_disk());
    }

    #[test]
    fn mount_disk_detection() {
        let r = Resource::new("disk", Value::scalar(2000.0)).with_disk(DiskInfo {
            source: Some(DiskSource::Mount {
                root: "/mnt/a".into(),
            }),
            ..Default::default()
        });
        assert!(r.is_mount_disk());
        assert_eq!(r.mount_root(), Some("/mnt/a"));
    }

    #[test]
    fn role_defaults_to_any_when_missing() {
        let json = r#"{"name":"cpus","value":{"type":"scalar","value":1.0}}"#;
        let r: Resource = serde_json::from_str(json).unwrap();
        assert_eq!(r.role, ANY_ROLE);
        assert!(r.reservation.is_none());
    }
}
