//! Shared fixtures: a small blog schema and validating builders.

use crate::{
    changeset::Changeset,
    entity::{Entity, Related},
    model::{AssociationDescriptor, EntityModel, OnReplace, Schema},
    params::ParamMap,
    value::Value,
};
use serde_json::json;

/// post ─┬─ comments (many, delete)
///       ├─ profile  (one,  delete, defaults name = "anon")
///       └─ summary  (one,  nilify)
pub(crate) fn blog_schema() -> Schema {
    let post = EntityModel::new("post")
        .field("title")
        .association(
            AssociationDescriptor::has_many("comments", "comment", "post_id")
                .on_replace(OnReplace::Delete),
        )
        .association(
            AssociationDescriptor::has_one("profile", "profile", "post_id")
                .on_replace(OnReplace::Delete)
                .default_value("name", "anon"),
        )
        .association(
            AssociationDescriptor::has_one("summary", "summary", "post_id")
                .on_replace(OnReplace::Nilify),
        );

    let comment = EntityModel::new("comment").field("title").field("post_id");
    let profile = EntityModel::new("profile").field("name").field("post_id");
    let summary = EntityModel::new("summary").field("body").field("post_id");

    match Schema::new([post, comment, profile, summary]) {
        Ok(schema) => schema,
        Err(err) => panic!("fixture schema is invalid: {err}"),
    }
}

/// Casts `title` and requires it.
pub(crate) fn comment_builder(base: Entity, params: &ParamMap) -> Changeset {
    Changeset::change(base)
        .cast(params, &["title"])
        .validate_required(&["title"])
}

/// Casts `name` and requires it.
pub(crate) fn profile_builder(base: Entity, params: &ParamMap) -> Changeset {
    Changeset::change(base)
        .cast(params, &["name"])
        .validate_required(&["name"])
}

pub(crate) fn comment(id: i64, title: &str) -> Entity {
    Entity::loaded("comment")
        .with("id", id)
        .with("title", title)
        .with("post_id", 1)
}

pub(crate) fn profile(id: i64, name: &str) -> Entity {
    Entity::loaded("profile")
        .with("id", id)
        .with("name", name)
        .with("post_id", 1)
}

/// Persisted post 1 with the given comments loaded.
pub(crate) fn post_with_comments(comments: Vec<Entity>) -> Entity {
    Entity::loaded("post")
        .with("id", 1)
        .with("title", "hello")
        .with_related("comments", Related::Many(comments))
}

/// Persisted post 1 with the given profile loaded.
pub(crate) fn post_with_profile(profile: Option<Entity>) -> Entity {
    Entity::loaded("post")
        .with("id", 1)
        .with("title", "hello")
        .with_related("profile", Related::one(profile))
}

/// Parameters from a JSON object literal.
pub(crate) fn params(value: serde_json::Value) -> ParamMap {
    match ParamMap::try_from(Value::from(value)) {
        Ok(params) => params,
        Err(other) => panic!("fixture params must be an object, got {other}"),
    }
}

/// `params(json!({ ... }))` for the common case.
pub(crate) fn title(title: &str) -> ParamMap {
    params(json!({ "title": title }))
}
