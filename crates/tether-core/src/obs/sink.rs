//! Metrics sink boundary.
//!
//! Reconciliation logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
use crate::{
    changeset::Action,
    model::{AssociationDescriptor, Cardinality, OnReplace},
    obs::metrics,
    relation::Outcome,
};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Debug, PartialEq)]
pub enum MetricsEvent {
    Reconcile {
        association: String,
        cardinality: Cardinality,
        inserts: u64,
        updates: u64,
        deletes: u64,
        nilified: u64,
        changed: bool,
        valid: bool,
    },
    Replace {
        association: String,
        policy: OnReplace,
    },
    InvalidShape {
        association: String,
    },
    Required {
        association: String,
    },
    Rejected {
        association: String,
        reason: &'static str,
    },
}

impl MetricsEvent {
    /// Summarize a finished reconciliation.
    pub(crate) fn reconcile(descriptor: &AssociationDescriptor, outcome: &Outcome) -> Self {
        let (mut inserts, mut updates, mut deletes, mut nilified) = (0u64, 0u64, 0u64, 0u64);

        for changeset in outcome.reconciled.changesets() {
            match changeset.action() {
                _ if changeset.is_detached() => nilified += 1,
                Some(Action::Insert) => inserts += 1,
                Some(Action::Update) => updates += 1,
                Some(Action::Delete) => deletes += 1,
                Some(Action::Ignore) | None => {}
            }
        }

        Self::Reconcile {
            association: descriptor.path(),
            cardinality: descriptor.cardinality,
            inserts,
            updates,
            deletes,
            nilified,
            changed: outcome.changed,
            valid: outcome.is_valid(),
        }
    }
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default thread-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::Reconcile {
                association,
                cardinality,
                inserts,
                updates,
                deletes,
                nilified,
                changed,
                valid,
            } => {
                metrics::with_state_mut(|m| {
                    match cardinality {
                        Cardinality::One => {
                            m.ops.reconcile_one_calls = m.ops.reconcile_one_calls.saturating_add(1);
                        }
                        Cardinality::Many => {
                            m.ops.reconcile_many_calls =
                                m.ops.reconcile_many_calls.saturating_add(1);
                        }
                    }
                    m.ops.inserts = m.ops.inserts.saturating_add(inserts);
                    m.ops.updates = m.ops.updates.saturating_add(updates);
                    m.ops.deletes = m.ops.deletes.saturating_add(deletes);
                    m.ops.nilified = m.ops.nilified.saturating_add(nilified);
                    if !changed {
                        m.ops.unchanged = m.ops.unchanged.saturating_add(1);
                    }
                    if !valid {
                        m.ops.invalid_outcomes = m.ops.invalid_outcomes.saturating_add(1);
                    }

                    let entry = m.associations.entry(association).or_default();
                    entry.reconcile_calls = entry.reconcile_calls.saturating_add(1);
                    entry.inserts = entry.inserts.saturating_add(inserts);
                    entry.updates = entry.updates.saturating_add(updates);
                    entry.deletes = entry.deletes.saturating_add(deletes);
                    entry.nilified = entry.nilified.saturating_add(nilified);
                });
            }

            MetricsEvent::Replace { association, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.replacements = m.ops.replacements.saturating_add(1);
                    let entry = m.associations.entry(association).or_default();
                    entry.replacements = entry.replacements.saturating_add(1);
                });
            }

            MetricsEvent::InvalidShape { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.invalid_shapes = m.ops.invalid_shapes.saturating_add(1);
                });
            }

            MetricsEvent::Required { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.required_errors = m.ops.required_errors.saturating_add(1);
                });
            }

            MetricsEvent::Rejected { association, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.rejected = m.ops.rejected.saturating_add(1);
                    let entry = m.associations.entry(association).or_default();
                    entry.rejected = entry.rejected.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    // Clone out of the slot so a sink may itself install overrides.
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());

    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
/// The previous sink is restored on every exit, including unwind.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///
