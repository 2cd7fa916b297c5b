use std::collections::BTreeMap;
use std::sync::Arc;

use offerfit_core::{EvaluatorConfig, Offer, Resource, Value};
use offerfit_evaluator::{
    GoalState, OfferEvaluator, OperationKind, PodInstanceRequirement, PodSpec, ReservationSpec,
    ResourceSet, ResourceSpec, StageKind, TaskSpec,
};
use offerfit_metrics::{MetricsCollector, render_prometheus};

fn make_requirement() -> PodInstanceRequirement {
    let reservation = ReservationSpec::new("web-role", "web");
    let pod = PodSpec {
        pod_type: "web".into(),
        count: 1,
        shared_executor: false,
        executor_reservation: reservation.clone(),
        resource_sets: vec![ResourceSet {
            id: "web-resources".into(),
            resources: vec![ResourceSpec {
                name: "mem".into(),
                value: Value::scalar(512.0),
                reservation,
            }],
            volumes: vec![],
            ports: vec![],
        }],
        tasks: vec![TaskSpec {
            name: "server".into(),
            goal_state: GoalState::Running,
            resource_set_id: "web-resources".into(),
            env: BTreeMap::new(),
            health_check: None,
            readiness_check: None,
            transport_encryption: vec![],
        }],
        placement: None,
    };
    PodInstanceRequirement::new(pod, 0, vec!["server".into()])
}

#[tokio::test]
async fn evaluator_reports_into_collector() {
    let collector = Arc::new(MetricsCollector::new());
    let evaluator = OfferEvaluator::new(EvaluatorConfig::default()).with_metrics(collector.clone());
    let offers = vec![
        Offer::new("o1", "a1", "h1").with_resource(Resource::new("mem", Value::scalar(128.0))),
        Offer::new("o2", "a2", "h2").with_resource(Resource::new("mem", Value::scalar(2048.0))),
    ];

    let recs = evaluator
        .evaluate(&make_requirement(), &offers, &[], "cfg-1")
        .await
        .unwrap();
    assert_eq!(recs.len(), 2);

    let snap = collector.snapshot();
    assert_eq!(snap.offers_accepted, 1);
    assert_eq!(snap.offers_declined, 1);
    assert_eq!(snap.stage_failures_for(StageKind::Resource), 1);
    assert_eq!(snap.operations_for(OperationKind::Reserve), 1);
    assert_eq!(snap.operations_for(OperationKind::Launch), 1);

    let text = render_prometheus(&snap);
    assert!(text.contains("offerfit_stage_failures_total{stage=\"resource\"} 1"));
    assert!(text.contains("offerfit_recommendations_total{operation=\"launch\"} 1"));
}
