//! Schema metadata: entity models, association descriptors, and the
//! registry the reconciler resolves them from.

mod association;
pub mod config;
mod validate;


use crate::{entity::Entity, value::Value};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

// re-exports
pub use association::{AssociationDescriptor, Cardinality, Messages, OnReplace};

///
/// SchemaError
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("entity not found: '{entity}'")]
    EntityNotFound { entity: String },

    #[error("association not found: '{entity}.{association}'")]
    AssociationNotFound { entity: String, association: String },

    #[error("invalid schema: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },
}

///
/// FieldModel
/// Runtime field metadata; `default` seeds freshly built entities.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldModel {
    pub name: String,
    pub default: Value,
}

impl FieldModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Value::Null,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }
}

///
/// EntityModel
/// Runtime model for one entity type.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityModel {
    /// Stable external name used for routing and diagnostics.
    pub name: String,
    /// Primary key fields (identity of a record).
    pub primary_key: Vec<String>,
    /// Ordered field list.
    pub fields: Vec<FieldModel>,
    /// Declared associations, owned by this entity.
    pub associations: Vec<AssociationDescriptor>,
}

impl EntityModel {
    /// New model with an `id` primary key field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: vec!["id".to_string()],
            fields: vec![FieldModel::new("id")],
            associations: Vec::new(),
        }
    }

    /// Replace the primary key. The implicit `id` field is dropped unless
    /// it is part of the new key; other key fields must be declared.
    #[must_use]
    pub fn primary_key(mut self, fields: &[&str]) -> Self {
        self.primary_key = fields.iter().map(ToString::to_string).collect();
        self.fields.retain(|f| f.name != "id" || fields.contains(&"id"));
        self
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<FieldModel>) -> Self {
        let field = field.into();
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn association(mut self, mut descriptor: AssociationDescriptor) -> Self {
        descriptor.owner.clone_from(&self.name);
        self.associations.push(descriptor);
        self
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    #[must_use]
    pub fn get_association(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Names of all declared fields, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Build a fresh, not-yet-persisted entity with every field at its default.
    #[must_use]
    pub fn build(&self) -> Entity {
        let mut entity = Entity::new(self.name.as_str());
        for field in &self.fields {
            entity.put(field.name.as_str(), field.default.clone());
        }

        entity
    }
}

impl From<&str> for FieldModel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

///
/// Schema
///
/// Validated registry of entity models. Created once, read-only afterwards.
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct Schema {
    entities: BTreeMap<String, EntityModel>,
}

impl Schema {
    /// Register and validate a set of entity models.
    pub fn new(models: impl IntoIterator<Item = EntityModel>) -> Result<Self, SchemaError> {
        let mut errors = Vec::new();
        let mut entities = BTreeMap::new();

        for model in models {
            if entities.contains_key(&model.name) {
                errors.push(format!("duplicate entity '{}'", model.name));
                continue;
            }
            entities.insert(model.name.clone(), model);
        }

        let schema = Self { entities };
        validate::validate_schema(&schema, &mut errors);

        if errors.is_empty() {
            Ok(schema)
        } else {
            Err(SchemaError::Invalid { errors })
        }
    }

    pub fn entity(&self, name: &str) -> Result<&EntityModel, SchemaError> {
        self.entities
            .get(name)
            .ok_or_else(|| SchemaError::EntityNotFound {
                entity: name.to_string(),
            })
    }

    /// Resolve the association `name` declared on `entity`.
    pub fn resolve(&self, entity: &str, name: &str) -> Result<&AssociationDescriptor, SchemaError> {
        self.entity(entity)?
            .get_association(name)
            .ok_or_else(|| SchemaError::AssociationNotFound {
                entity: entity.to_string(),
                association: name.to_string(),
            })
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityModel> {
        self.entities.values()
    }
}
