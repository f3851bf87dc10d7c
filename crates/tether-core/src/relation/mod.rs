//! Module: relation
//! Responsibility: reconcile an association's loaded state against new
//! input into per-entity changesets tagged with actions.
//! Does not own: field casting/validation (delegated to a `ChangesetBuilder`)
//! or persistence of the resulting changesets.
//! Boundary: hosts enter through `Reconciler::{cast, reconcile_one, reconcile_many}`
//! and project results with `apply_changes`.

mod action;
mod many;
mod one;
mod replace;

#[cfg(test)]
mod tests;

use crate::{
    changeset::{Action, Changeset, ChangesetBuilder, FieldError, Validation},
    entity::{Entity, Identity, PersistenceState, Related},
    error::InternalError,
    model::{AssociationDescriptor, Cardinality, EntityModel, OnReplace, Schema},
    obs::sink::{MetricsEvent, record},
    params::{CollectionOrder, ParamInput, ParamMap},
    value::Value,
};
use serde::Serialize;
use thiserror::Error as ThisError;

///
/// RelationError
///
/// Fatal reconciliation failures. These are caller bugs, never user-data
/// validation problems, and abort the whole operation.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RelationError {
    #[error(
        "attempting to cast or change association '{association}' that was not loaded; load it before casting or changing it"
    )]
    NotLoaded { association: String },

    #[error(
        "cannot {action} related {entity} because it does not exist in association '{association}'"
    )]
    InconsistentAction {
        association: String,
        action: Action,
        entity: String,
    },

    #[error(
        "cannot insert related {entity} because it is already associated with '{association}'"
    )]
    AlreadyExists { association: String, entity: String },

    #[error(
        "attempting to replace related {entity} in association '{association}' while on_replace is raise_error; choose another on_replace policy to allow it"
    )]
    ReplaceForbidden { association: String, entity: String },

    #[error("association '{association}' expects {expected} cardinality")]
    CardinalityMismatch {
        association: String,
        expected: Cardinality,
    },

    #[error("on_replace={policy} is not supported by association '{association}'")]
    UnsupportedPolicy {
        association: String,
        policy: OnReplace,
    },
}

impl RelationError {
    #[must_use]
    pub const fn class(&self) -> crate::error::ErrorClass {
        use crate::error::ErrorClass;

        match self {
            Self::NotLoaded { .. }
            | Self::InconsistentAction { .. }
            | Self::CardinalityMismatch { .. } => ErrorClass::InvariantViolation,
            Self::AlreadyExists { .. } => ErrorClass::Conflict,
            Self::ReplaceForbidden { .. } | Self::UnsupportedPolicy { .. } => {
                ErrorClass::Unsupported
            }
        }
    }

    /// Stable label used by telemetry.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotLoaded { .. } => "not_loaded",
            Self::InconsistentAction { .. } => "inconsistent_action",
            Self::AlreadyExists { .. } => "already_exists",
            Self::ReplaceForbidden { .. } => "replace_forbidden",
            Self::CardinalityMismatch { .. } => "cardinality_mismatch",
            Self::UnsupportedPolicy { .. } => "unsupported_policy",
        }
    }
}

///
/// CastOptions
///
/// Per-call options. Unset fields fall back to the descriptor.
///

#[derive(Clone, Copy, Default)]
pub struct CastOptions<'a> {
    pub required: bool,
    pub on_replace: Option<OnReplace>,
    pub with: Option<&'a dyn ChangesetBuilder>,
    pub required_message: Option<&'a str>,
    pub invalid_message: Option<&'a str>,

    /// Parent parameter listing collection indices in the desired order.
    pub sort_param: Option<&'a str>,

    /// Parent parameter listing collection indices to drop.
    pub drop_param: Option<&'a str>,
}

impl<'a> CastOptions<'a> {
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn on_replace(mut self, on_replace: OnReplace) -> Self {
        self.on_replace = Some(on_replace);
        self
    }

    #[must_use]
    pub const fn with(mut self, builder: &'a dyn ChangesetBuilder) -> Self {
        self.with = Some(builder);
        self
    }

    #[must_use]
    pub const fn required_message(mut self, message: &'a str) -> Self {
        self.required_message = Some(message);
        self
    }

    #[must_use]
    pub const fn invalid_message(mut self, message: &'a str) -> Self {
        self.invalid_message = Some(message);
        self
    }

    #[must_use]
    pub const fn sort_param(mut self, key: &'a str) -> Self {
        self.sort_param = Some(key);
        self
    }

    #[must_use]
    pub const fn drop_param(mut self, key: &'a str) -> Self {
        self.drop_param = Some(key);
        self
    }
}

///
/// Incoming
///
/// One new related value: raw parameters, a plain entity, or a changeset
/// built by the caller.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Incoming {
    Params(ParamMap),
    Entity(Entity),
    Changeset(Changeset),
}

impl From<ParamMap> for Incoming {
    fn from(params: ParamMap) -> Self {
        Self::Params(params)
    }
}

impl From<Entity> for Incoming {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<Changeset> for Incoming {
    fn from(changeset: Changeset) -> Self {
        Self::Changeset(changeset)
    }
}

///
/// Reconciled
///
/// Reconciled association value.
///
/// `Untouched`  → the current value stands; nothing to merge.
/// `One`        → `changeset: None` means the slot becomes empty; `replaced`
///                carries the delete/nilify change for a displaced entity.
/// `Many`       → displaced current entries first, then entries in input order.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Reconciled {
    Untouched,
    One {
        changeset: Option<Box<Changeset>>,
        replaced: Option<Box<Changeset>>,
    },
    Many(Vec<Changeset>),
}

impl Reconciled {
    /// Every changeset carried by this value, displaced ones first.
    #[must_use]
    pub fn changesets(&self) -> Vec<&Changeset> {
        match self {
            Self::Untouched => Vec::new(),
            Self::One {
                changeset,
                replaced,
            } => replaced
                .iter()
                .chain(changeset.iter())
                .map(Box::as_ref)
                .collect(),
            Self::Many(items) => items.iter().collect(),
        }
    }

    #[must_use]
    pub fn as_one(&self) -> Option<&Changeset> {
        match self {
            Self::One {
                changeset: Some(changeset),
                ..
            } => Some(changeset.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_many(&self) -> &[Changeset] {
        match self {
            Self::Many(items) => items,
            _ => &[],
        }
    }

    /// Plain related value after the changes, or `None` when untouched.
    pub(crate) fn apply(&self) -> Option<Related> {
        match self {
            Self::Untouched => None,
            Self::One { changeset, .. } => Some(Related::one(
                changeset
                    .as_deref()
                    .filter(|cs| survives(cs))
                    .map(Changeset::apply),
            )),
            Self::Many(items) => Some(Related::Many(
                items
                    .iter()
                    .filter(|cs| survives(cs))
                    .map(Changeset::apply)
                    .collect(),
            )),
        }
    }

    // Nothing remains associated after the changes.
    fn resolves_empty(&self) -> bool {
        match self {
            Self::Untouched => false,
            Self::One { changeset, .. } => !changeset.as_deref().is_some_and(survives),
            Self::Many(items) => !items.iter().any(survives),
        }
    }
}

// Still associated with the owner once persisted.
fn survives(changeset: &Changeset) -> bool {
    !changeset.is_detached() && !matches!(changeset.action(), Some(Action::Delete | Action::Ignore))
}

///
/// Outcome
///
/// Result of one reconciliation: the value, whether persistence work is
/// needed, whether every produced changeset is valid, and parent-level
/// errors keyed by the association name.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Outcome {
    pub reconciled: Reconciled,
    pub changed: bool,
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl Outcome {
    const fn untouched() -> Self {
        Self {
            reconciled: Reconciled::Untouched,
            changed: false,
            valid: true,
            errors: Vec::new(),
        }
    }

    fn new(reconciled: Reconciled, changed: bool) -> Self {
        let valid = reconciled.changesets().iter().all(|cs| cs.is_valid());

        Self {
            reconciled,
            changed,
            valid,
            errors: Vec::new(),
        }
    }

    fn one(changeset: Option<Changeset>, replaced: Option<Changeset>, changed: bool) -> Self {
        Self::new(
            Reconciled::One {
                changeset: changeset.map(Box::new),
                replaced: replaced.map(Box::new),
            },
            changed,
        )
    }

    fn many(items: Vec<Changeset>, changed: bool) -> Self {
        Self::new(Reconciled::Many(items), changed)
    }

    fn with_error(mut self, error: FieldError) -> Self {
        self.errors.push(error);
        self.valid = false;
        self
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid && self.errors.is_empty()
    }
}

// Replacement decision for one displaced entity.
enum Replacement {
    Scheduled(Changeset),
    Invalid,
    Keep,
}

///
/// DefaultBuilder
///
/// Casts every declared field of the related model except the foreign key,
/// which only the reconciler sets. Primary key fields are only cast onto
/// entities that do not carry an identity yet.
///

struct DefaultBuilder<'a> {
    model: &'a EntityModel,
    related_key: &'a str,
}

impl ChangesetBuilder for DefaultBuilder<'_> {
    fn build(&self, base: Entity, params: &ParamMap) -> Changeset {
        let has_identity = !base.identity(&self.model.primary_key).is_empty();
        let permitted: Vec<&str> = self
            .model
            .field_names()
            .filter(|f| *f != self.related_key)
            .filter(|f| !(has_identity && self.model.primary_key.iter().any(|k| k == f)))
            .collect();

        Changeset::change(base).cast(params, &permitted)
    }
}

///
/// Reconciler
///
/// Reconciliation context for one association of one owner record.
///

pub struct Reconciler<'a> {
    descriptor: &'a AssociationDescriptor,
    related: &'a EntityModel,
    owner: &'a Entity,
    options: CastOptions<'a>,
    on_replace: OnReplace,
    default_builder: DefaultBuilder<'a>,
}

impl<'a> Reconciler<'a> {
    /// Resolve association `name` of `owner` and bind the call options.
    pub fn new(
        schema: &'a Schema,
        owner: &'a Entity,
        name: &str,
        options: CastOptions<'a>,
    ) -> Result<Self, InternalError> {
        let descriptor = schema.resolve(owner.entity_name(), name)?;
        let related = schema.entity(&descriptor.related)?;
        let on_replace = options.on_replace.unwrap_or(descriptor.on_replace);

        if descriptor.is_many() && on_replace == OnReplace::Update {
            return Err(RelationError::UnsupportedPolicy {
                association: descriptor.path(),
                policy: on_replace,
            }
            .into());
        }

        Ok(Self {
            descriptor,
            related,
            owner,
            options,
            on_replace,
            default_builder: DefaultBuilder {
                model: related,
                related_key: &descriptor.related_key,
            },
        })
    }

    #[must_use]
    pub const fn descriptor(&self) -> &AssociationDescriptor {
        self.descriptor
    }

    ///
    /// ENTRYPOINTS
    ///

    /// Cast the association from the owner's parameters.
    ///
    /// A missing key leaves the association untouched (subject to the
    /// `required` check); a present key is resolved into a `ParamInput`
    /// and reconciled against the owner's loaded slot.
    pub fn cast(&self, params: &ParamMap) -> Result<Outcome, InternalError> {
        let current = self.owner.related(&self.descriptor.name);

        let Some(value) = params.get(&self.descriptor.name) else {
            return self.finish(self.missing(current));
        };

        let order = CollectionOrder {
            sort: self.options.sort_param.and_then(|key| params.get(key)),
            drop: self.options.drop_param.and_then(|key| params.get(key)),
        };
        let input = ParamInput::resolve(self.descriptor.cardinality, value, &order);

        let result = match (self.descriptor.cardinality, input) {
            (Cardinality::One, ParamInput::Absent) => self.one(current, None),
            (Cardinality::One, ParamInput::Map(params)) => {
                self.one(current, Some(Incoming::Params(params)))
            }
            (Cardinality::Many, ParamInput::List(items)) => {
                self.many(current, items.into_iter().map(Incoming::Params).collect())
            }
            _ => self.invalid_shape(current),
        };

        self.finish(result)
    }

    /// Reconcile a one-to-one association against `new`.
    pub fn reconcile_one(
        &self,
        current: &Related,
        new: Option<Incoming>,
    ) -> Result<Outcome, InternalError> {
        self.finish(self.one(current, new))
    }

    /// Reconcile a one-to-many association against `new`.
    pub fn reconcile_many(
        &self,
        current: &Related,
        new: Vec<Incoming>,
    ) -> Result<Outcome, InternalError> {
        self.finish(self.many(current, new))
    }

    /// Reconcile against the owner's own loaded slot (explicit assignment).
    pub fn put_one(&self, new: Option<Incoming>) -> Result<Outcome, InternalError> {
        self.reconcile_one(self.owner.related(&self.descriptor.name), new)
    }

    /// Reconcile against the owner's own loaded slot (explicit assignment).
    pub fn put_many(&self, new: Vec<Incoming>) -> Result<Outcome, InternalError> {
        self.reconcile_many(self.owner.related(&self.descriptor.name), new)
    }

    ///
    /// SHARED STEPS
    ///

    // Record telemetry and lift fatal errors into the crate error type.
    fn finish(&self, result: Result<Outcome, RelationError>) -> Result<Outcome, InternalError> {
        match result {
            Ok(outcome) => {
                record(MetricsEvent::reconcile(self.descriptor, &outcome));
                Ok(outcome)
            }
            Err(err) => {
                record(MetricsEvent::Rejected {
                    association: self.descriptor.path(),
                    reason: err.label(),
                });
                Err(err.into())
            }
        }
    }

    // Owner slot, with not-loaded handling: empty for a built owner,
    // fatal otherwise.
    fn loaded<'r>(&self, current: &'r Related) -> Result<Option<&'r Related>, RelationError> {
        match current {
            Related::NotLoaded if self.owner.state() == PersistenceState::Built => Ok(None),
            Related::NotLoaded => Err(RelationError::NotLoaded {
                association: self.descriptor.path(),
            }),
            other => Ok(Some(other)),
        }
    }

    fn cardinality_mismatch(&self) -> RelationError {
        RelationError::CardinalityMismatch {
            association: self.descriptor.path(),
            expected: self.descriptor.cardinality,
        }
    }

    // No parameters were supplied for this association.
    fn missing(&self, current: &Related) -> Result<Outcome, RelationError> {
        if !self.options.required {
            return Ok(Outcome::untouched());
        }

        let present = match (self.descriptor.cardinality, self.loaded(current)?) {
            (_, None) => self.descriptor.is_many(),
            (Cardinality::One, Some(Related::One(entity))) => entity.is_some(),
            (Cardinality::Many, Some(Related::Many(_))) => true,
            _ => return Err(self.cardinality_mismatch()),
        };

        if present {
            Ok(Outcome::untouched())
        } else {
            Ok(Outcome::untouched().with_error(self.required_error()))
        }
    }

    fn invalid_shape(&self, current: &Related) -> Result<Outcome, RelationError> {
        self.loaded(current)?;
        record(MetricsEvent::InvalidShape {
            association: self.descriptor.path(),
        });

        Ok(self.invalid())
    }

    // Parent-level "is invalid" with no structural change.
    fn invalid(&self) -> Outcome {
        Outcome::untouched().with_error(FieldError::new(
            self.descriptor.name.as_str(),
            self.options
                .invalid_message
                .unwrap_or(&self.descriptor.messages.invalid),
            Validation::Invalid,
        ))
    }

    fn required_error(&self) -> FieldError {
        record(MetricsEvent::Required {
            association: self.descriptor.path(),
        });

        FieldError::new(
            self.descriptor.name.as_str(),
            self.options
                .required_message
                .unwrap_or(&self.descriptor.messages.required),
            Validation::Required,
        )
    }

    // Requiredness is judged on the resolved new state.
    fn require(&self, outcome: Outcome) -> Outcome {
        if self.options.required && outcome.reconciled.resolves_empty() {
            let error = self.required_error();
            outcome.with_error(error)
        } else {
            outcome
        }
    }

    fn builder(&self) -> &dyn ChangesetBuilder {
        self.options.with.unwrap_or(&self.default_builder)
    }

    fn identity_of(&self, incoming: &Incoming) -> Identity {
        match incoming {
            Incoming::Params(params) => self.params_identity(params),
            Incoming::Entity(entity) => entity.identity(&self.related.primary_key),
            Incoming::Changeset(changeset) => changeset.identity(&self.related.primary_key),
        }
    }

    fn params_identity(&self, params: &ParamMap) -> Identity {
        Identity::new(
            self.related
                .primary_key
                .iter()
                .map(|k| params.get(k).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    fn identity_matches(&self, incoming: &Identity, current: &Entity) -> bool {
        incoming.matches(&current.identity(&self.related.primary_key))
    }

    // Fresh related entity for inserted parameters: model defaults, the
    // descriptor defaults (one-to-one only, when no identity was supplied),
    // and the foreign key pointing at the owner.
    fn synthesize(&self, identity: &Identity, with_defaults: bool) -> Entity {
        let mut entity = self.related.build();

        if with_defaults && identity.is_empty() {
            for (field, value) in &self.descriptor.defaults {
                entity.put(field.as_str(), value.clone());
            }
        }

        let owner_value = self.owner.get(&self.descriptor.owner_key);
        if !owner_value.is_null() {
            entity.put(self.descriptor.related_key.as_str(), owner_value.clone());
        }

        entity
    }

    // Human-readable record reference for fatal diagnostics.
    fn describe(&self, entity: &Entity) -> String {
        let identity = entity.identity(&self.related.primary_key);
        let parts: Vec<String> = self
            .related
            .primary_key
            .iter()
            .zip(identity.values())
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        format!("{}({})", entity.entity_name(), parts.join(", "))
    }
}

///
/// apply_changes
///
/// Project a reconciled value onto plain related entities, dropping deleted,
/// ignored and nilified entries. Returns `None` when untouched.
///

pub fn apply_changes(
    descriptor: &AssociationDescriptor,
    reconciled: &Reconciled,
) -> Result<Option<Related>, InternalError> {
    let shape_ok = match reconciled {
        Reconciled::Untouched => true,
        Reconciled::One { .. } => descriptor.cardinality == Cardinality::One,
        Reconciled::Many(_) => descriptor.cardinality == Cardinality::Many,
    };

    if !shape_ok {
        return Err(InternalError::relation_invariant(format!(
            "reconciled value does not match {} cardinality of association '{}'",
            descriptor.cardinality,
            descriptor.path()
        )));
    }

    Ok(reconciled.apply())
}
