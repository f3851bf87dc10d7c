use super::*;
use crate::{
    changeset::Change,
    entity::{PersistenceState, Related},
    model::OnReplace,
    relation::{Incoming, Reconciled, apply_changes},
    test_support::{blog_schema, params, post_with_profile, profile, profile_builder},
    value::Value,
};
use serde_json::json;

fn post_with_summary() -> Entity {
    let summary = Entity::loaded("summary")
        .with("id", 5)
        .with("body", "tl;dr")
        .with("post_id", 1);

    Entity::loaded("post")
        .with("id", 1)
        .with_related("summary", Related::one(Some(summary)))
}

#[test]
fn insert_synthesizes_defaults_and_foreign_key() {
    let schema = blog_schema();
    let owner = post_with_profile(None);

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default().with(&profile_builder),
        &params(json!({ "profile": {} })),
    );

    let changeset = outcome.reconciled.as_one().expect("insert changeset");
    assert_eq!(changeset.action(), Some(Action::Insert));
    assert!(changeset.is_valid(), "default name satisfies the builder");

    let inserted = changeset.apply();
    assert_eq!(inserted.get("name"), &Value::from("anon"));
    assert_eq!(inserted.get("post_id"), &Value::Int(1));
    assert!(outcome.changed);
}

#[test]
fn default_builder_keeps_foreign_key_out_of_params() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(3, "ana")));

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default(),
        &params(json!({ "profile": { "id": 3, "name": "bo", "post_id": 99 } })),
    );

    let changeset = outcome.reconciled.as_one().expect("update changeset");
    assert_eq!(changeset.get_change("name"), Some(&Change::Value(Value::from("bo"))));
    assert!(changeset.get_change("post_id").is_none());
    assert_eq!(changeset.apply().get("post_id"), &Value::Int(1));
}

#[test]
fn defaults_are_skipped_when_identity_is_supplied() {
    let schema = blog_schema();
    let owner = post_with_profile(None);

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default(),
        &params(json!({ "profile": { "id": 9 } })),
    );

    let inserted = outcome.reconciled.as_one().expect("insert").apply();
    assert_eq!(inserted.get("id"), &Value::Int(9));
    assert_eq!(inserted.get("name"), &Value::Null);
}

#[test]
fn same_identity_updates_in_place() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default().with(&profile_builder),
        &params(json!({ "profile": { "id": 1, "name": "new" } })),
    );

    let Reconciled::One {
        changeset: Some(changeset),
        replaced: None,
    } = &outcome.reconciled
    else {
        panic!("expected an in-place update, got {:?}", outcome.reconciled);
    };
    assert_eq!(changeset.action(), Some(Action::Update));
    assert_eq!(changeset.data(), &profile(1, "old"));
    assert_eq!(changeset.get_change("name"), Some(&Change::Value(Value::from("new"))));
    assert!(outcome.changed);
}

#[test]
fn same_identity_without_changes_is_unchanged() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default().with(&profile_builder),
        &params(json!({ "profile": { "id": 1, "name": "old" } })),
    );

    assert!(!outcome.changed);
    assert!(outcome.is_valid());
}

#[test]
fn unkeyed_input_over_unkeyed_current_is_an_update() {
    let schema = blog_schema();
    let owner = Entity::new("post").with_related(
        "profile",
        Related::one(Some(Entity::new("profile").with("name", "draft"))),
    );

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default().with(&profile_builder),
        &params(json!({ "profile": { "name": "final" } })),
    );

    let changeset = outcome.reconciled.as_one().expect("update");
    assert_eq!(changeset.action(), Some(Action::Update));
    assert_eq!(changeset.get_field("name"), &Value::from("final"));
}

#[test]
fn replacement_schedules_delete_of_current() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default().with(&profile_builder),
        &params(json!({ "profile": { "name": "new" } })),
    );

    let Reconciled::One {
        changeset: Some(changeset),
        replaced: Some(replaced),
    } = &outcome.reconciled
    else {
        panic!("expected a replacement, got {:?}", outcome.reconciled);
    };
    assert_eq!(changeset.action(), Some(Action::Insert));
    assert_eq!(replaced.action(), Some(Action::Delete));
    assert_eq!(replaced.data(), &profile(1, "old"));

    let descriptor = schema.resolve("post", "profile").expect("descriptor");
    let applied = apply_changes(descriptor, &outcome.reconciled)
        .expect("apply")
        .expect("touched");
    assert_eq!(
        applied.as_one().map(|p| p.get("name").clone()),
        Some(Value::from("new"))
    );
}

#[test]
fn replacement_with_raise_error_is_fatal() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));

    let err = cast(
        &schema,
        &owner,
        "profile",
        CastOptions::default().on_replace(OnReplace::RaiseError),
        &params(json!({ "profile": { "name": "new" } })),
    )
    .expect_err("replacing with raise_error must fail");

    assert!(matches!(
        relation_error(&err),
        RelationError::ReplaceForbidden { .. }
    ));
    assert_eq!(err.class, crate::error::ErrorClass::Unsupported);
}

#[test]
fn replacement_with_mark_invalid_is_a_parent_error() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default().on_replace(OnReplace::MarkInvalid),
        &params(json!({ "profile": null })),
    );

    assert_eq!(outcome.reconciled, Reconciled::Untouched);
    assert_eq!(error_messages(&outcome), vec![("profile", "is invalid")]);
}

#[test]
fn nil_with_nilify_detaches_current() {
    let schema = blog_schema();
    let owner = post_with_summary();

    let outcome = cast_ok(
        &schema,
        &owner,
        "summary",
        CastOptions::default(),
        &params(json!({ "summary": null })),
    );

    let Reconciled::One {
        changeset: None,
        replaced: Some(replaced),
    } = &outcome.reconciled
    else {
        panic!("expected a nilified replacement, got {:?}", outcome.reconciled);
    };
    assert_eq!(replaced.action(), Some(Action::Update));
    assert!(replaced.is_detached());
    assert_eq!(replaced.get_change("post_id"), Some(&Change::Value(Value::Null)));
    assert!(outcome.changed);

    let descriptor = schema.resolve("post", "summary").expect("descriptor");
    assert_eq!(
        apply_changes(descriptor, &outcome.reconciled).expect("apply"),
        Some(Related::One(None))
    );
}

#[test]
fn update_policy_reuses_current_identity() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default().on_replace(OnReplace::Update),
        &params(json!({ "profile": { "id": 2, "name": "new" } })),
    );

    let changeset = outcome.reconciled.as_one().expect("update");
    assert_eq!(changeset.action(), Some(Action::Update));
    assert_eq!(changeset.get_field("id"), &Value::Int(1));
    assert_eq!(changeset.get_field("name"), &Value::from("new"));
}

#[test]
fn update_policy_with_nil_deletes_current() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default().on_replace(OnReplace::Update),
        &params(json!({ "profile": null })),
    );

    let Reconciled::One {
        changeset: None,
        replaced: Some(replaced),
    } = &outcome.reconciled
    else {
        panic!("expected a delete, got {:?}", outcome.reconciled);
    };
    assert_eq!(replaced.action(), Some(Action::Delete));
}

#[test]
fn nil_over_nil_is_unchanged() {
    let schema = blog_schema();
    let owner = post_with_profile(None);

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default(),
        &params(json!({ "profile": null })),
    );

    assert_eq!(
        outcome.reconciled,
        Reconciled::One {
            changeset: None,
            replaced: None
        }
    );
    assert!(!outcome.changed);
    assert!(outcome.is_valid());
}

#[test]
fn required_nil_reports_custom_message() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default().required().required_message("is required"),
        &params(json!({ "profile": null })),
    );

    assert!(outcome.changed);
    assert_eq!(error_messages(&outcome), vec![("profile", "is required")]);
}

#[test]
fn required_missing_key_checks_current() {
    let schema = blog_schema();
    let options = CastOptions::default().required();

    let empty = post_with_profile(None);
    let outcome = cast_ok(&schema, &empty, "profile", options, &ParamMap::new());
    assert_eq!(outcome.reconciled, Reconciled::Untouched);
    assert_eq!(error_messages(&outcome), vec![("profile", "can't be blank")]);

    let present = post_with_profile(Some(profile(1, "old")));
    let outcome = cast_ok(&schema, &present, "profile", options, &ParamMap::new());
    assert!(outcome.is_valid());
}

#[test]
fn list_params_are_invalid_for_one() {
    let schema = blog_schema();
    let owner = post_with_profile(None);

    let outcome = cast_ok(
        &schema,
        &owner,
        "profile",
        CastOptions::default(),
        &params(json!({ "profile": [{ "name": "x" }] })),
    );

    assert_eq!(outcome.reconciled, Reconciled::Untouched);
    assert_eq!(error_messages(&outcome), vec![("profile", "is invalid")]);
}

#[test]
fn changeset_input_is_rebased_onto_current() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));
    let reconciler =
        Reconciler::new(&schema, &owner, "profile", CastOptions::default()).expect("reconciler");

    let partial = Changeset::change(Entity::loaded("profile").with("id", 1))
        .cast(&params(json!({ "name": "new" })), &["name"]);
    let outcome = reconciler
        .put_one(Some(Incoming::Changeset(partial)))
        .expect("put should succeed");

    let changeset = outcome.reconciled.as_one().expect("update");
    assert_eq!(changeset.action(), Some(Action::Update));
    assert_eq!(changeset.data(), &profile(1, "old"));
    assert_eq!(changeset.changes().len(), 1);
    assert_eq!(changeset.get_field("name"), &Value::from("new"));
}

#[test]
fn entity_input_without_identity_replaces_current() {
    let schema = blog_schema();
    let owner = post_with_profile(Some(profile(1, "old")));
    let reconciler =
        Reconciler::new(&schema, &owner, "profile", CastOptions::default()).expect("reconciler");

    let outcome = reconciler
        .put_one(Some(Entity::new("profile").with("name", "fresh").into()))
        .expect("put should succeed");

    let changeset = outcome.reconciled.as_one().expect("insert");
    assert_eq!(changeset.action(), Some(Action::Insert));
    assert_eq!(changeset.data().state(), PersistenceState::Built);
}
