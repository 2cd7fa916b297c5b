//! TLS stage: issues transport-encryption artifacts and mounts them as secrets.

use std::time::Duration;

use offerfit_core::ContainerVolume;
use tracing::warn;

use super::StageContext;
use crate::outcome::EvaluationOutcome;
use crate::pod::TransportEncryptionSpec;
use crate::pod_info::PodInfoBuilder;
use crate::tls::TlsRequest;

/// Issue TLS artifacts for every transport-encryption spec of a task and
/// mount them as secret volumes. Volumes are attached only when every
/// issuance succeeds.
pub(super) async fn evaluate(
    task: &str,
    specs: &[TransportEncryptionSpec],
    builder: &mut PodInfoBuilder,
    ctx: &StageContext<'_>,
) -> EvaluationOutcome {
    let source = format!("tls[{task}]");
    let Some(issuer) = ctx.tls_issuer else {
        return EvaluationOutcome::fail(source, "no TLS artifact issuer configured");
    };
    let task_name = builder.pod.task_name(task);
    let sans = vec![
        format!("{task_name}.{}", ctx.config.service_name),
        ctx.offer.hostname.clone(),
    ];
    let timeout = Duration::from_secs(ctx.config.tls.issue_timeout_secs);

    let mut volumes: Vec<ContainerVolume> = Vec::new();
    for spec in specs {
        let request = TlsRequest::new(
            ctx.config.secrets_namespace(),
            task_name.clone(),
            spec.clone(),
            sans.clone(),
        );
        match tokio::time::timeout(timeout, issuer.issue(&request)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(task = %task_name, encryption = %spec.name, error = %e, "TLS issuance failed");
                return EvaluationOutcome::fail(source, format!("TLS issuance for '{}' failed: {e}", spec.name));
            }
            Err(_) => {
                warn!(task = %task_name, encryption = %spec.name, ?timeout, "TLS issuance timed out");
                return EvaluationOutcome::fail(
                    source,
                    format!("TLS issuance for '{}' timed out after {timeout:?}", spec.name),
                );
            }
        }
        for (secret, container_path) in request.artifacts() {
            if volumes.iter().all(|v| v.container_path != container_path) {
                volumes.push(ContainerVolume {
                    container_path,
                    secret: Some(secret),
                });
            }
        }
    }

    let count = volumes.len();
    if let Some(draft) = builder.draft_mut(task) {
        draft.info.volumes.extend(volumes);
    }
    EvaluationOutcome::pass(source, format!("mounted {count} TLS artifacts"))
}
