//! Module: model::config
//! Responsibility: declarative schema definition loaded from TOML.
//! Does not own: schema validation rules (delegated to `Schema::new`).
//!
//! ```toml
//! [[entity]]
//! name = "post"
//! field = [{ name = "id" }, { name = "title" }]
//!
//! [[entity.association]]
//! name = "comments"
//! cardinality = "many"
//! related = "comment"
//! related_key = "post_id"
//! on_replace = "delete"
//! ```

use crate::{
    model::{
        AssociationDescriptor, Cardinality, EntityModel, FieldModel, Messages, OnReplace, Schema,
        SchemaError,
    },
    value::Value,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("schema config parse failed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

///
/// SchemaConfig
///

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityConfig>,
}

impl SchemaConfig {
    /// Parse a TOML document without validating it.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Parse and validate a TOML document into a [`Schema`].
    pub fn from_toml_str(source: &str) -> Result<Schema, ConfigError> {
        Self::parse(source)?.into_schema()
    }

    pub fn into_schema(self) -> Result<Schema, ConfigError> {
        let models = self.entities.into_iter().map(EntityConfig::into_model);

        Ok(Schema::new(models)?)
    }
}

///
/// EntityConfig
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityConfig {
    pub name: String,

    #[serde(default = "default_primary_key")]
    pub primary_key: Vec<String>,

    #[serde(default, rename = "field")]
    pub fields: Vec<FieldConfig>,

    #[serde(default, rename = "association")]
    pub associations: Vec<AssociationConfig>,
}

fn default_primary_key() -> Vec<String> {
    vec!["id".to_string()]
}

impl EntityConfig {
    fn into_model(self) -> EntityModel {
        let mut model = EntityModel {
            name: self.name,
            primary_key: self.primary_key,
            fields: Vec::new(),
            associations: Vec::new(),
        };

        for field in self.fields {
            model = model.field(field.into_model());
        }
        for association in self.associations {
            model = model.association(association.into_descriptor());
        }

        model
    }
}

///
/// FieldConfig
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub name: String,

    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl FieldConfig {
    fn into_model(self) -> FieldModel {
        let field = FieldModel::new(self.name);

        match self.default {
            Some(default) => field.with_default(Value::from(default)),
            None => field,
        }
    }
}

///
/// AssociationConfig
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationConfig {
    pub name: String,
    pub cardinality: Cardinality,
    pub related: String,
    pub related_key: String,

    #[serde(default)]
    pub owner_key: Option<String>,

    #[serde(default)]
    pub on_replace: OnReplace,

    #[serde(default)]
    pub defaults: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub messages: Option<Messages>,
}

impl AssociationConfig {
    fn into_descriptor(self) -> AssociationDescriptor {
        let mut descriptor = match self.cardinality {
            Cardinality::One => {
                AssociationDescriptor::has_one(self.name, self.related, self.related_key)
            }
            Cardinality::Many => {
                AssociationDescriptor::has_many(self.name, self.related, self.related_key)
            }
        }
        .on_replace(self.on_replace);

        if let Some(owner_key) = self.owner_key {
            descriptor = descriptor.owner_key(owner_key);
        }
        for (field, value) in self.defaults {
            descriptor = descriptor.default_value(field, Value::from(value));
        }
        if let Some(messages) = self.messages {
            descriptor = descriptor.messages(messages);
        }

        descriptor
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    const BLOG: &str = r#"
        [[entity]]
        name = "post"
        field = [{ name = "id" }, { name = "title" }]

        [[entity.association]]
        name = "comments"
        cardinality = "many"
        related = "comment"
        related_key = "post_id"
        on_replace = "nilify"

        [[entity.association]]
        name = "profile"
        cardinality = "one"
        related = "profile"
        related_key = "post_id"
        on_replace = "mark_as_invalid"
        defaults = { name = "blank" }
        messages = { required = "is required" }

        [[entity]]
        name = "comment"
        field = [{ name = "id" }, { name = "body" }, { name = "post_id" }]

        [[entity]]
        name = "profile"
        field = [{ name = "id" }, { name = "name", default = "anon" }, { name = "post_id" }]
    "#;

    #[test]
    fn loads_entities_and_associations() {
        let schema = SchemaConfig::from_toml_str(BLOG).expect("config should load");

        let comments = schema
            .resolve("post", "comments")
            .expect("comments should resolve");
        assert_eq!(comments.cardinality, Cardinality::Many);
        assert_eq!(comments.on_replace, OnReplace::Nilify);
        assert_eq!(comments.owner, "post");
        assert_eq!(comments.owner_key, "id");

        let profile = schema
            .resolve("post", "profile")
            .expect("profile should resolve");
        assert_eq!(profile.on_replace, OnReplace::MarkInvalid);
        assert_eq!(profile.defaults["name"], Value::from("blank"));
        assert_eq!(profile.messages.required, "is required");
        assert_eq!(profile.messages.invalid, crate::INVALID_MESSAGE);

        let built = schema.entity("profile").expect("profile model").build();
        assert_eq!(built.get("name"), &Value::from("anon"));
    }

    #[test]
    fn parse_errors_are_reported() {
        let err = SchemaConfig::from_toml_str("[[entity]]\nname = 3").expect_err("bad toml");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn schema_errors_are_reported() {
        let source = r#"
            [[entity]]
            name = "post"
            field = [{ name = "id" }]

            [[entity.association]]
            name = "tags"
            cardinality = "many"
            related = "tag"
            related_key = "post_id"
            on_replace = "update"
        "#;

        let err = SchemaConfig::from_toml_str(source).expect_err("invalid schema");
        let ConfigError::Schema(SchemaError::Invalid { errors }) = err else {
            panic!("expected schema validation error");
        };
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].contains("only supported for one-to-one"));
        assert!(errors[1].contains("unknown entity 'tag'"));
    }
}
