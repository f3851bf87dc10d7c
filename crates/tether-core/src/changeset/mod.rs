//! Field-level changesets: the change description for one entity, plus the
//! host-side merge of association outcomes into a parent changeset.


use crate::{
    REQUIRED_MESSAGE,
    entity::{Entity, Identity},
    params::ParamMap,
    relation::{Outcome, Reconciled},
    value::Value,
};
use derive_more::Display;
use serde::Serialize;
use std::collections::BTreeMap;

///
/// Action
///
/// What the persistence layer must do with one changeset.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
pub enum Action {
    #[display("insert")]
    Insert,
    #[display("update")]
    Update,
    #[display("delete")]
    Delete,
    /// Drop this changeset; nothing is persisted for it.
    #[display("ignore")]
    Ignore,
}

///
/// Validation
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Validation {
    Required,
    Invalid,
    Custom,
}

///
/// FieldError
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub validation: Validation,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, validation: Validation) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            validation,
        }
    }
}

///
/// Change
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Change {
    Value(Value),
    Relation(Reconciled),
}

///
/// ChangesetBuilder
///
/// Strategy that casts and validates parameters onto a base entity.
/// Any `Fn(Entity, &ParamMap) -> Changeset` is a builder.
///

pub trait ChangesetBuilder {
    fn build(&self, base: Entity, params: &ParamMap) -> Changeset;
}

impl<F> ChangesetBuilder for F
where
    F: Fn(Entity, &ParamMap) -> Changeset,
{
    fn build(&self, base: Entity, params: &ParamMap) -> Changeset {
        self(base, params)
    }
}

///
/// Changeset
///
/// Base entity, proposed changes, errors, validity and action tag.
/// The action is set by the caller when building input, and otherwise only
/// by the reconciler's transition rules.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Changeset {
    data: Entity,
    changes: BTreeMap<String, Change>,
    errors: Vec<FieldError>,
    valid: bool,
    action: Option<Action>,

    /// Set when the entity was nilified away from its owner.
    detached: bool,
}

impl Changeset {
    /// Empty changeset over `data`.
    #[must_use]
    pub const fn change(data: Entity) -> Self {
        Self {
            data,
            changes: BTreeMap::new(),
            errors: Vec::new(),
            valid: true,
            action: None,
            detached: false,
        }
    }

    ///
    /// BUILDING
    ///

    /// Cast the `permitted` keys found in `params` as field changes.
    /// Nested maps and lists are not castable onto scalar fields.
    #[must_use]
    pub fn cast(mut self, params: &ParamMap, permitted: &[&str]) -> Self {
        for field in permitted {
            let Some(value) = params.get(*field) else {
                continue;
            };

            if value.is_scalar() {
                self.put_change(*field, value.clone());
            } else {
                self.add_error(*field, crate::INVALID_MESSAGE, Validation::Invalid);
            }
        }

        self
    }

    /// Record every field of `entity` that differs from the base data.
    #[must_use]
    pub fn change_fields(mut self, entity: &Entity) -> Self {
        for (field, value) in entity.fields() {
            self.put_change(field.as_str(), value.clone());
        }

        self
    }

    /// Flag blank `fields` (null or whitespace text) as required.
    #[must_use]
    pub fn validate_required(mut self, fields: &[&str]) -> Self {
        for field in fields {
            if self.get_field(field).is_blank() {
                self.add_error(*field, REQUIRED_MESSAGE, Validation::Required);
            }
        }

        self
    }

    /// Tag the changeset with an explicit action.
    #[must_use]
    pub const fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Put a field change; a value equal to the base data clears the change.
    pub fn put_change(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();

        if self.data.get(&field) == &value {
            self.changes.remove(&field);
        } else {
            self.changes.insert(field, Change::Value(value));
        }
    }

    pub fn add_error(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        validation: Validation,
    ) {
        self.errors.push(FieldError::new(field, message, validation));
        self.valid = false;
    }

    ///
    /// ACCESS
    ///

    #[must_use]
    pub const fn data(&self) -> &Entity {
        &self.data
    }

    #[must_use]
    pub const fn changes(&self) -> &BTreeMap<String, Change> {
        &self.changes
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub const fn action(&self) -> Option<Action> {
        self.action
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.detached
    }

    /// Changed value if present, otherwise the base data value.
    #[must_use]
    pub fn get_field(&self, field: &str) -> &Value {
        match self.changes.get(field) {
            Some(Change::Value(value)) => value,
            _ => self.data.get(field),
        }
    }

    #[must_use]
    pub fn get_change(&self, field: &str) -> Option<&Change> {
        self.changes.get(field)
    }

    /// Identity as it would be after the changes are applied.
    #[must_use]
    pub fn identity<S: AsRef<str>>(&self, keys: &[S]) -> Identity {
        Identity::new(
            keys.iter()
                .map(|k| self.get_field(k.as_ref()).clone())
                .collect(),
        )
    }

    /// Apply every change to a copy of the base data.
    /// Association changes are projected onto the record's slots.
    #[must_use]
    pub fn apply(&self) -> Entity {
        let mut entity = self.data.clone();

        for (field, change) in &self.changes {
            match change {
                Change::Value(value) => entity.put(field.as_str(), value.clone()),
                Change::Relation(reconciled) => {
                    if let Some(related) = reconciled.apply() {
                        entity.put_related(field.as_str(), related);
                    }
                }
            }
        }

        entity
    }

    ///
    /// HOST MERGE
    ///

    /// Merge an association outcome under `name`.
    ///
    /// The change map only gains an entry when the outcome changed
    /// something. Errors and invalid children always flip validity.
    pub fn put_relation(&mut self, name: impl Into<String>, outcome: Outcome) {
        let name = name.into();
        let Outcome {
            reconciled,
            changed,
            valid,
            errors,
        } = outcome;

        if !errors.is_empty() {
            self.valid = false;
            self.errors.extend(errors);
        }

        self.valid &= valid;
        if changed {
            self.changes.insert(name, Change::Relation(reconciled));
        }
    }

    ///
    /// RECONCILER TRANSITIONS
    ///

    pub(crate) const fn set_action(&mut self, action: Action) {
        self.action = Some(action);
    }

    pub(crate) fn put_new_action(&mut self, action: Action) {
        self.action.get_or_insert(action);
    }

    /// Re-express the changeset over `base`: field changes become the
    /// difference between the applied result and `base`. Errors, action and
    /// association changes carry over.
    pub(crate) fn rebase(self, base: &Entity) -> Self {
        if &self.data == base {
            return self;
        }

        let applied = self.apply();
        let mut rebased = Self::change(base.clone()).change_fields(&applied);

        for (name, change) in self.changes {
            if matches!(change, Change::Relation(_)) {
                rebased.changes.insert(name, change);
            }
        }
        rebased.errors = self.errors;
        rebased.valid = self.valid;
        rebased.action = self.action;
        rebased.detached = self.detached;

        rebased
    }

    pub(crate) fn nilify(&mut self, foreign_key: &str) {
        self.changes
            .insert(foreign_key.to_string(), Change::Value(Value::Null));
        self.action = Some(Action::Update);
        self.detached = true;
    }
}
