//! Observability: reconciliation telemetry and the sink abstraction.
//!
//! The reconciler never touches counters directly; every event flows
//! through `sink::record`.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{AssociationSummary, EventReport, EventState};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
