use serde::Serialize;
use std::{cell::RefCell, collections::BTreeMap};

///
/// EventState
/// Ephemeral, in-memory reconciliation counters.
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub associations: BTreeMap<String, AssociationCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventOps {
    // Entrypoints
    pub reconcile_one_calls: u64,
    pub reconcile_many_calls: u64,
    pub rejected: u64,

    // Produced changesets
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub nilified: u64,

    // Outcomes
    pub unchanged: u64,
    pub invalid_outcomes: u64,
    pub invalid_shapes: u64,
    pub required_errors: u64,

    // Replacement policy applications
    pub replacements: u64,
}

///
/// AssociationCounters
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct AssociationCounters {
    pub reconcile_calls: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub nilified: u64,
    pub replacements: u64,
    pub rejected: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters.
    pub counters: Option<EventState>,
    /// Per-association counters and averages.
    pub association_counters: Vec<AssociationSummary>,
}

///
/// AssociationSummary
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct AssociationSummary {
    pub path: String,
    pub reconcile_calls: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub nilified: u64,
    pub replacements: u64,
    pub rejected: u64,
    pub avg_changesets_per_call: f64,
}

/// Build a metrics report, busiest associations first.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub(crate) fn report() -> EventReport {
    let snap = with_state(Clone::clone);

    let mut association_counters: Vec<AssociationSummary> = snap
        .associations
        .iter()
        .map(|(path, c)| {
            let produced = c.inserts + c.updates + c.deletes + c.nilified;
            let avg = if c.reconcile_calls > 0 {
                produced as f64 / c.reconcile_calls as f64
            } else {
                0.0
            };

            AssociationSummary {
                path: path.clone(),
                reconcile_calls: c.reconcile_calls,
                inserts: c.inserts,
                updates: c.updates,
                deletes: c.deletes,
                nilified: c.nilified,
                replacements: c.replacements,
                rejected: c.rejected,
                avg_changesets_per_call: avg,
            }
        })
        .collect();

    association_counters.sort_by(|a, b| {
        b.reconcile_calls
            .cmp(&a.reconcile_calls)
            .then_with(|| a.path.cmp(&b.path))
    });

    EventReport {
        counters: Some(snap),
        association_counters,
    }
}

///
/// TESTS
///
