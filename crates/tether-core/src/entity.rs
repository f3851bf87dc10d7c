use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

static NULL: Value = Value::Null;

///
/// PersistenceState
///
/// Where a record stands relative to the persistence layer.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum PersistenceState {
    #[default]
    Built,
    Loaded,
    Deleted,
}

///
/// Identity
///
/// Primary key value tuple of a record. An identity whose every component
/// is null means the record has no identity yet.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Identity(Vec<Value>);

impl Identity {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Value::is_null)
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Same record: component-wise key equality. Two empty identities
    /// match, which is how positional correlation pairs unkeyed records.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a.key_eq(b))
    }
}

///
/// Related
///
/// Association slot on a record: either never loaded, or the loaded
/// one-to-one / one-to-many value.
///

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub enum Related {
    #[default]
    NotLoaded,
    One(Option<Box<Entity>>),
    Many(Vec<Entity>),
}

impl Related {
    #[must_use]
    pub fn one(entity: Option<Entity>) -> Self {
        Self::One(entity.map(Box::new))
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        !matches!(self, Self::NotLoaded)
    }

    /// The loaded value holds nothing (`None` or an empty list).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::NotLoaded | Self::One(None) => true,
            Self::One(Some(_)) => false,
            Self::Many(items) => items.is_empty(),
        }
    }

    #[must_use]
    pub fn as_one(&self) -> Option<&Entity> {
        match self {
            Self::One(Some(entity)) => Some(entity.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_many(&self) -> &[Entity] {
        match self {
            Self::Many(items) => items,
            _ => &[],
        }
    }
}

///
/// Entity
///
/// Plain record: entity name, persistence state, field values and loaded
/// association slots. Missing fields read as `Value::Null`; association
/// slots that were never set read as `Related::NotLoaded`.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Entity {
    entity: String,
    state: PersistenceState,
    fields: BTreeMap<String, Value>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    relations: BTreeMap<String, Related>,
}

impl Entity {
    /// A new, not-yet-persisted record.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            state: PersistenceState::Built,
            fields: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    /// A record as returned by the persistence layer.
    pub fn loaded(entity: impl Into<String>) -> Self {
        Self::new(entity).with_state(PersistenceState::Loaded)
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(field, value);
        self
    }

    #[must_use]
    pub fn with_related(mut self, name: impl Into<String>, related: Related) -> Self {
        self.put_related(name, related);
        self
    }

    #[must_use]
    pub const fn with_state(mut self, state: PersistenceState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub const fn state(&self) -> PersistenceState {
        self.state
    }

    #[must_use]
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    pub fn put(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Association slot `name`; `NotLoaded` when never set.
    #[must_use]
    pub fn related(&self, name: &str) -> &Related {
        static NOT_LOADED: Related = Related::NotLoaded;

        self.relations.get(name).unwrap_or(&NOT_LOADED)
    }

    pub fn put_related(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }

    /// Identity under the given primary key fields.
    #[must_use]
    pub fn identity<S: AsRef<str>>(&self, keys: &[S]) -> Identity {
        Identity::new(keys.iter().map(|k| self.get(k.as_ref()).clone()).collect())
    }
}

///
/// TESTS
///
