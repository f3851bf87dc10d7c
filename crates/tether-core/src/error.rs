use crate::{model::SchemaError, model::config::ConfigError, relation::RelationError};
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every fatal reconciliation failure surfaces as one of these; user-data
/// problems ("is invalid", "can't be blank") never do.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a relation-origin invariant violation.
    pub(crate) fn relation_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Relation,
            message.into(),
        )
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    /// Typed relation detail, when this error came from the reconciler.
    #[must_use]
    pub const fn relation(&self) -> Option<&RelationError> {
        match &self.detail {
            Some(ErrorDetail::Relation(err)) => Some(err),
            _ => None,
        }
    }

    /// Typed schema detail, when this error came from schema metadata.
    #[must_use]
    pub const fn schema(&self) -> Option<&SchemaError> {
        match &self.detail {
            Some(ErrorDetail::Schema(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Relation(RelationError),

    #[error("{0}")]
    Schema(SchemaError),

    #[error("{0}")]
    Config(ConfigError),
}

impl From<RelationError> for InternalError {
    fn from(err: RelationError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Relation,
            message: err.to_string(),
            detail: Some(ErrorDetail::Relation(err)),
        }
    }
}

impl From<SchemaError> for InternalError {
    fn from(err: SchemaError) -> Self {
        let class = match err {
            SchemaError::EntityNotFound { .. } | SchemaError::AssociationNotFound { .. } => {
                ErrorClass::NotFound
            }
            SchemaError::Invalid { .. } => ErrorClass::InvariantViolation,
        };

        Self {
            class,
            origin: ErrorOrigin::Schema,
            message: err.to_string(),
            detail: Some(ErrorDetail::Schema(err)),
        }
    }
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self {
            class: ErrorClass::Unsupported,
            origin: ErrorOrigin::Config,
            message: err.to_string(),
            detail: Some(ErrorDetail::Config(err)),
        }
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    NotFound,
    Conflict,
    Unsupported,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Schema,
    Config,
    Relation,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Schema => "schema",
            Self::Config => "config",
            Self::Relation => "relation",
        };
        write!(f, "{label}")
    }
}
