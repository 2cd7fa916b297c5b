//! Prometheus text exposition format.
//!
//! Renders a metrics snapshot into the Prometheus text exposition format
//! for scraping by a Prometheus server or compatible agent.

use crate::collector::MetricsSnapshot;

/// Render a snapshot into Prometheus text format.
///
/// All metrics are COUNTERs; stage and operation counters carry a label.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    out.push_str("# HELP offerfit_offers_evaluated_total Offers evaluated against a requirement.\n");
    out.push_str("# TYPE offerfit_offers_evaluated_total counter\n");
    out.push_str(&format!(
        "offerfit_offers_evaluated_total{{result=\"accepted\"}} {}\n",
        snapshot.offers_accepted
    ));
    out.push_str(&format!(
        "offerfit_offers_evaluated_total{{result=\"declined\"}} {}\n",
        snapshot.offers_declined
    ));

    out.push_str("# HELP offerfit_stage_failures_total Tasks failed by each evaluation stage.\n");
    out.push_str("# TYPE offerfit_stage_failures_total counter\n");
    for (stage, count) in &snapshot.stage_failures {
        out.push_str(&format!(
            "offerfit_stage_failures_total{{stage=\"{stage}\"}} {count}\n"
        ));
    }

    out.push_str("# HELP offerfit_recommendations_total Operations returned for accepted offers.\n");
    out.push_str("# TYPE offerfit_recommendations_total counter\n");
    for (operation, count) in &snapshot.operations {
        out.push_str(&format!(
            "offerfit_recommendations_total{{operation=\"{operation}\"}} {count}\n"
        ));
    }

    out
}
