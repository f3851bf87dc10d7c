//! Core runtime for Tether: schema metadata, entities, changesets, and the
//! association reconciler that diffs loaded related state against new input.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod changeset;
pub mod entity;
pub mod error;
pub mod model;
pub mod obs;
pub mod params;
pub mod relation;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Default message attached to a required association that resolved empty.
pub const REQUIRED_MESSAGE: &str = "can't be blank";

/// Default message attached to an association whose input could not be used.
pub const INVALID_MESSAGE: &str = "is invalid";

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, sinks, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        changeset::{Action, Change, Changeset, ChangesetBuilder, FieldError},
        entity::{Entity, Identity, PersistenceState, Related},
        model::{AssociationDescriptor, Cardinality, EntityModel, FieldModel, OnReplace, Schema},
        params::{ParamInput, ParamMap},
        relation::{CastOptions, Incoming, Outcome, Reconciled, Reconciler, apply_changes},
        value::Value,
    };
}
