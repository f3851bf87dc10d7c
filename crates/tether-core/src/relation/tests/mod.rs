mod one;
mod property;

use crate::{
    changeset::{Action, Changeset},
    entity::Entity,
    error::InternalError,
    model::Schema,
    params::ParamMap,
    relation::{CastOptions, Outcome, Reconciler, RelationError},
};

// ---- helpers -----------------------------------------------------------

/// Cast `name` on `owner` from parent parameters.
fn cast(
    schema: &Schema,
    owner: &Entity,
    name: &str,
    options: CastOptions<'_>,
    params: &ParamMap,
) -> Result<Outcome, InternalError> {
    Reconciler::new(schema, owner, name, options)?.cast(params)
}

fn cast_ok(
    schema: &Schema,
    owner: &Entity,
    name: &str,
    options: CastOptions<'_>,
    params: &ParamMap,
) -> Outcome {
    cast(schema, owner, name, options, params).expect("cast should succeed")
}

fn relation_error(err: &InternalError) -> &RelationError {
    err.relation()
        .unwrap_or_else(|| panic!("expected relation error, got {err:?}"))
}

fn actions(changesets: &[Changeset]) -> Vec<Option<Action>> {
    changesets.iter().map(Changeset::action).collect()
}

fn error_messages(outcome: &Outcome) -> Vec<(&str, &str)> {
    outcome
        .errors
        .iter()
        .map(|e| (e.field.as_str(), e.message.as_str()))
        .collect()
}
