//! Call contract for TLS artifact issuance.
//!
//! Issuing certificates and keystores is somebody else's job. The TLS stage
//! only needs to ask for artifacts to be written to the secret store and to
//! know whether that worked, so it can mount them by path.

use std::future::Future;
use std::pin::Pin;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::pod::{EncryptionKind, TransportEncryptionSpec};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum TlsIssueError {
    #[error("secret store unavailable: {0}")]
    Unavailable(String),

    #[error("issuance rejected for '{name}': {reason}")]
    Rejected { name: String, reason: String },
}

pub type TlsIssueResult<T> = Result<T, TlsIssueError>;

/// What to issue, and where the resulting secrets must end up.
#[derive(Debug, Clone, PartialEq)]
pub struct TlsRequest {
    /// Fully qualified task name the artifacts are for.
    pub task_name: String,
    pub encryption: TransportEncryptionSpec,
    /// Subject alternative names, sorted.
    pub sans: Vec<String>,
    /// Secret store path prefix the issuer writes under.
    pub secret_prefix: String,
}

impl TlsRequest {
    pub fn new(
        namespace: &str,
        task_name: impl Into<String>,
        encryption: TransportEncryptionSpec,
        mut sans: Vec<String>,
    ) -> Self {
        sans.sort();
        sans.dedup();
        let task_name = task_name.into();
        let secret_prefix = format!(
            "{namespace}/{task_name}/{}__{}",
            san_hash(&sans),
            encryption.name
        );
        Self {
            task_name,
            encryption,
            sans,
            secret_prefix,
        }
    }

    /// `(secret path, container path)` for every artifact of this request.
    pub fn artifacts(&self) -> Vec<(String, String)> {
        let suffixes: &[&str] = match self.encryption.kind {
            EncryptionKind::Tls => &["crt", "key", "ca"],
            EncryptionKind::Keystore => &["keystore", "truststore"],
        };
        suffixes
            .iter()
            .map(|suffix| {
                (
                    format!("{}.{suffix}", self.secret_prefix),
                    format!("{}.{suffix}", self.encryption.name),
                )
            })
            .collect()
    }
}

/// First 8 hex chars of sha256 over the comma-joined names.
fn san_hash(sans: &[String]) -> String {
    let digest = Sha256::digest(sans.join(",").as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Writes TLS artifacts for a task into the secret store.
pub trait TlsArtifactIssuer: Send + Sync {
    fn issue<'a>(&'a self, request: &'a TlsRequest) -> BoxFuture<'a, TlsIssueResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: EncryptionKind) -> TransportEncryptionSpec {
        TransportEncryptionSpec {
            name: "server".into(),
            kind,
        }
    }

    #[test]
    fn tls_artifacts_use_fixed_container_paths() {
        let req = TlsRequest::new(
            "svc",
            "hello-0-server",
            spec(EncryptionKind::Tls),
            vec!["b.example".into(), "a.example".into(), "a.example".into()],
        );
        assert_eq!(req.sans, vec!["a.example", "b.example"]);
        let paths: Vec<String> = req.artifacts().into_iter().map(|(_, c)| c).collect();
        assert_eq!(paths, vec!["server.crt", "server.key", "server.ca"]);
        assert!(req.secret_prefix.starts_with("svc/hello-0-server/"));
        assert!(req.secret_prefix.ends_with("__server"));
    }

    #[test]
    fn keystore_artifacts() {
        let req = TlsRequest::new("svc", "t", spec(EncryptionKind::Keystore), vec![]);
        let artifacts = req.artifacts();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].1, "server.keystore");
        assert_eq!(artifacts[1].1, "server.truststore");
        assert_eq!(artifacts[1].0, format!("{}.truststore", req.secret_prefix));
    }

    #[test]
    fn san_hash_depends_on_names() {
        let a = TlsRequest::new("svc", "t", spec(EncryptionKind::Tls), vec!["x".into()]);
        let b = TlsRequest::new("svc", "t", spec(EncryptionKind::Tls), vec!["y".into()]);
        assert_ne!(a.secret_prefix, b.secret_prefix);
    }
}
