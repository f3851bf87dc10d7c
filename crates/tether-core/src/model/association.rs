use crate::{INVALID_MESSAGE, REQUIRED_MESSAGE, value::Value};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// Cardinality
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[display("one")]
    One,
    #[display("many")]
    Many,
}

///
/// OnReplace
///
/// What happens to a currently associated entity when new input would
/// drop or displace it. Closed set; `Update` is one-to-one only.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnReplace {
    #[default]
    #[serde(alias = "raise")]
    #[display("raise_error")]
    RaiseError,
    #[serde(alias = "mark_as_invalid")]
    #[display("mark_invalid")]
    MarkInvalid,
    #[display("delete")]
    Delete,
    #[display("nilify")]
    Nilify,
    #[display("update")]
    Update,
    #[display("ignore")]
    Ignore,
}

///
/// Messages
///
/// User-facing validation messages owned by one association.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Messages {
    pub required: String,
    pub invalid: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            required: REQUIRED_MESSAGE.to_string(),
            invalid: INVALID_MESSAGE.to_string(),
        }
    }
}

///
/// AssociationDescriptor
///
/// Immutable metadata for one declared relation of an owner entity.
/// The related entity holds the foreign key (`related_key`), which points
/// at the owner's `owner_key` field.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssociationDescriptor {
    pub name: String,
    pub cardinality: Cardinality,

    /// Owner entity name; filled in when attached to an [`EntityModel`](super::EntityModel).
    pub owner: String,
    pub related: String,
    pub owner_key: String,
    pub related_key: String,
    pub on_replace: OnReplace,

    /// Field values applied to a freshly synthesized one-to-one entity.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, Value>,

    pub messages: Messages,
}

impl AssociationDescriptor {
    fn new(
        name: impl Into<String>,
        cardinality: Cardinality,
        related: impl Into<String>,
        related_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cardinality,
            owner: String::new(),
            related: related.into(),
            owner_key: "id".to_string(),
            related_key: related_key.into(),
            on_replace: OnReplace::default(),
            defaults: BTreeMap::new(),
            messages: Messages::default(),
        }
    }

    /// Declare a one-to-one association.
    pub fn has_one(
        name: impl Into<String>,
        related: impl Into<String>,
        related_key: impl Into<String>,
    ) -> Self {
        Self::new(name, Cardinality::One, related, related_key)
    }

    /// Declare a one-to-many association.
    pub fn has_many(
        name: impl Into<String>,
        related: impl Into<String>,
        related_key: impl Into<String>,
    ) -> Self {
        Self::new(name, Cardinality::Many, related, related_key)
    }

    #[must_use]
    pub fn owner_key(mut self, owner_key: impl Into<String>) -> Self {
        self.owner_key = owner_key.into();
        self
    }

    #[must_use]
    pub const fn on_replace(mut self, on_replace: OnReplace) -> Self {
        self.on_replace = on_replace;
        self
    }

    #[must_use]
    pub fn default_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    #[must_use]
    pub const fn is_many(&self) -> bool {
        matches!(self.cardinality, Cardinality::Many)
    }

    /// `owner.name`, used as the diagnostics and metrics key.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}
