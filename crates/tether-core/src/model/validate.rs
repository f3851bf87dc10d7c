use crate::model::{AssociationDescriptor, Cardinality, EntityModel, OnReplace, Schema};
use std::collections::BTreeSet;

macro_rules! err {
    ($errs:expr, $($arg:tt)*) => {
        $errs.push(format!($($arg)*))
    };
}

// Validate every entity and association in the registry, collecting all issues.
pub(super) fn validate_schema(schema: &Schema, errs: &mut Vec<String>) {
    for entity in schema.entities() {
        validate_entity(entity, errs);

        for descriptor in &entity.associations {
            validate_association(schema, entity, descriptor, errs);
        }
    }
}

fn validate_entity(entity: &EntityModel, errs: &mut Vec<String>) {
    if entity.name.is_empty() {
        err!(errs, "entity name must be non-empty");
    }

    if entity.primary_key.is_empty() {
        err!(errs, "entity '{}' has no primary key", entity.name);
    }
    for key in &entity.primary_key {
        if !entity.has_field(key) {
            err!(
                errs,
                "entity '{}' primary key field '{key}' is not declared",
                entity.name
            );
        }
    }

    let mut seen = BTreeSet::new();
    for descriptor in &entity.associations {
        if !seen.insert(descriptor.name.as_str()) {
            err!(
                errs,
                "entity '{}' declares association '{}' more than once",
                entity.name,
                descriptor.name
            );
        }
        if entity.has_field(&descriptor.name) {
            err!(
                errs,
                "entity '{}' association '{}' shadows a field",
                entity.name,
                descriptor.name
            );
        }
    }
}

fn validate_association(
    schema: &Schema,
    owner: &EntityModel,
    descriptor: &AssociationDescriptor,
    errs: &mut Vec<String>,
) {
    let path = descriptor.path();

    if !owner.has_field(&descriptor.owner_key) {
        err!(
            errs,
            "association '{path}' owner key '{}' is not a field of '{}'",
            descriptor.owner_key,
            owner.name
        );
    }

    if descriptor.cardinality == Cardinality::Many && descriptor.on_replace == OnReplace::Update {
        err!(
            errs,
            "association '{path}' uses on_replace={} which is only supported for one-to-one",
            descriptor.on_replace
        );
    }

    if descriptor.cardinality == Cardinality::Many && !descriptor.defaults.is_empty() {
        err!(
            errs,
            "association '{path}' declares defaults, which only apply to one-to-one"
        );
    }

    let Ok(related) = schema.entity(&descriptor.related) else {
        err!(
            errs,
            "association '{path}' targets unknown entity '{}'",
            descriptor.related
        );
        return;
    };

    if !related.has_field(&descriptor.related_key) {
        err!(
            errs,
            "association '{path}' related key '{}' is not a field of '{}'",
            descriptor.related_key,
            related.name
        );
    }

    for field in descriptor.defaults.keys() {
        if !related.has_field(field) {
            err!(
                errs,
                "association '{path}' default '{field}' is not a field of '{}'",
                related.name
            );
        }
    }
}
