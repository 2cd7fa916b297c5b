//! offerfit-metrics — observability for offer evaluation.
//!
//! Counts offers accepted and declined, stage failures and emitted
//! operations, and renders them in Prometheus text format.
//!
//! # Architecture
//!
//! ```text
//! MetricsCollector (implements EvaluationMetrics)
//!   ├── offer_evaluated() / stage_failed() / recommendation_emitted()
//!   └── snapshot() → MetricsSnapshot
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for a /metrics endpoint
//! ```

pub mod collector;
pub mod prometheus;

pub use collector::{MetricsCollector, MetricsSnapshot};
pub use prometheus::render_prometheus;
