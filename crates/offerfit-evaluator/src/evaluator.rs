//! Offer evaluator — runs every planned task of a requirement through the
//! stage pipeline against each offer and returns the first fit.

use std::sync::Arc;

use offerfit_core::{EvaluatorConfig, Offer, TaskInfo};
use offerfit_placement::PlacementRule;
use tracing::{debug, info};

use crate::error::EvaluatorResult;
use crate::metrics::{EvaluationMetrics, NoopMetrics, StageKind};
use crate::outcome::EvaluationOutcome;
use crate::pod::{DeployKind, PodInstanceRequirement};
use crate::pod_info::PodInfoBuilder;
use crate::pool::ResourcePool;
use crate::recommendation::OfferRecommendation;
use crate::stages::{StageContext, stages_for_task};
use crate::tls::TlsArtifactIssuer;

pub struct OfferEvaluator {
    config: EvaluatorConfig,
    tls_issuer: Option<Arc<dyn TlsArtifactIssuer>>,
    metrics: Arc<dyn EvaluationMetrics>,
}

impl OfferEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            config,
            tls_issuer: None,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_tls_issuer(mut self, issuer: Arc<dyn TlsArtifactIssuer>) -> Self {
        self.tls_issuer = Some(issuer);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn EvaluationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Find operations that satisfy `requirement` on one of `offers`.
    ///
    /// `tasks` is the launched-task snapshot for this scheduling round and
    /// `target_config` the configuration id new launches should record.
    /// Returns an empty list when no offer fits; errors only when the
    /// requirement itself is malformed.
    pub async fn evaluate(
        &self,
        requirement: &PodInstanceRequirement,
        offers: &[Offer],
        tasks: &[TaskInfo],
        target_config: &str,
    ) -> EvaluatorResult<Vec<OfferRecommendation>> {
        requirement.validate()?;
        let pod = requirement.pod_instance();

        let recommendations = match self
            .select_first_fit(requirement, offers, tasks, target_config)
            .await
        {
            Some(outcome) => outcome.recommendations,
            None => {
                info!(pod = %pod, offers = offers.len(), "no offer satisfies requirement");
                Vec::new()
            }
        };
        for recommendation in &recommendations {
            self.metrics.recommendation_emitted(recommendation.kind());
        }
        Ok(recommendations)
    }

    /// First-fit: offers are tried in input order and the first passing
    /// trial wins.
    async fn select_first_fit(
        &self,
        requirement: &PodInstanceRequirement,
        offers: &[Offer],
        tasks: &[TaskInfo],
        target_config: &str,
    ) -> Option<EvaluationOutcome> {
        let pod = requirement.pod_instance();
        for offer in offers {
            let outcome = self
                .evaluate_offer(requirement, offer, tasks, target_config)
                .await;
            self.metrics.offer_evaluated(outcome.passed);
            if outcome.passed {
                info!(
                    pod = %pod,
                    offer = %offer.id,
                    hostname = %offer.hostname,
                    recommendations = outcome.recommendations.len(),
                    "offer accepted"
                );
                return Some(outcome);
            }
            info!(
                pod = %pod,
                offer = %offer.id,
                failures = outcome.failure_count(),
                "offer declined"
            );
            debug!(offer = %offer.id, "evaluation:\n{outcome}");
        }
        None
    }

    /// Evaluate a requirement against a single offer with a fresh pool.
    ///
    /// The returned outcome carries one child per planned task and, when it
    /// passed, the flattened recommendations.
    pub async fn evaluate_offer(
        &self,
        requirement: &PodInstanceRequirement,
        offer: &Offer,
        tasks: &[TaskInfo],
        target_config: &str,
    ) -> EvaluationOutcome {
        let mut pool = ResourcePool::new(offer);
        let mut builder = PodInfoBuilder::new(requirement, target_config, tasks);
        if requirement.deploy_kind == DeployKind::PermanentReplacement {
            if let Some(recorded) = builder.recorded_target_config().map(str::to_string) {
                builder.target_config = recorded;
            }
        }

        let ctx = StageContext {
            offer,
            config: &self.config,
            tasks,
            tls_issuer: self.tls_issuer.as_deref(),
        };
        let rule = requirement
            .pod
            .placement
            .clone()
            .unwrap_or(PlacementRule::Passthrough);
        let executor = requirement
            .pod
            .shared_executor
            .then_some(&requirement.pod.executor_reservation);

        let names: Vec<String> = builder.drafts().iter().map(|d| d.spec.name.clone()).collect();
        let mut task_outcomes = Vec::with_capacity(names.len());
        let mut reservations = Vec::new();
        let mut reclaims = Vec::new();
        for name in &names {
            let mut children = Vec::new();
            let mut failure = None;
            for stage in stages_for_task(&builder, name, &rule, executor) {
                let outcome = stage.evaluate(&mut pool, &mut builder, &ctx).await;
                if !outcome.passed {
                    self.metrics.stage_failed(stage.kind());
                    failure = Some(outcome.reason.clone());
                    children.push(outcome);
                    break;
                }
                match stage.kind() {
                    StageKind::Reclaim => reclaims.extend(outcome.recommendations.iter().cloned()),
                    _ => reservations.extend(outcome.recommendations.iter().cloned()),
                }
                children.push(outcome);
            }
            let source = format!("task {}", builder.pod.task_name(name));
            let outcome = match failure {
                Some(reason) => EvaluationOutcome::fail(source, reason),
                None => EvaluationOutcome::pass(source, "all stages passed"),
            };
            task_outcomes.push(outcome.with_children(children));
        }

        let failed = task_outcomes.iter().filter(|o| !o.passed).count();
        let source = format!("offer {}", offer.id);
        if failed > 0 {
            return EvaluationOutcome::fail(source, format!("{failed} of {} tasks failed", names.len()))
                .with_children(task_outcomes);
        }

        let mut recommendations = reservations;
        recommendations.extend(reclaims);
        recommendations.extend(launches(requirement, offer, &builder));
        EvaluationOutcome::pass(source, format!("{} tasks fit", names.len()))
            .with_recommendations(recommendations)
            .with_children(task_outcomes)
    }
}

/// LAUNCH operations for the finished drafts: one combined launch when the
/// pod shares an executor, otherwise one per task. Bookkeeping tasks are
/// recorded but not sent.
fn launches(
    requirement: &PodInstanceRequirement,
    offer: &Offer,
    builder: &PodInfoBuilder,
) -> Vec<OfferRecommendation> {
    let ready = builder.drafts().iter().filter(|d| d.ready);
    let (launched, held): (Vec<_>, Vec<_>) = ready.partition(|d| d.launch);
    let executor = builder.state.executor.clone();

    let mut out = Vec::new();
    if requirement.pod.shared_executor {
        let tasks = launched.iter().map(|d| d.info.clone()).collect();
        out.push(OfferRecommendation::launch(offer, executor.clone(), tasks, true));
    } else {
        out.extend(
            launched
                .iter()
                .map(|d| OfferRecommendation::launch(offer, None, vec![d.info.clone()], true)),
        );
    }
    out.extend(held.iter().map(|d| {
        OfferRecommendation::launch(offer, executor.clone(), vec![d.info.clone()], false)
    }));
    out
}
