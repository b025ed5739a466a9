//! Error Types
//!
//! Failures in this crate are developer-facing: they describe a schema that
//! cannot be compiled into a dependency table, or input to the differ that
//! breaks its preconditions. Nothing here is transient, so there are no retry
//! hints; callers are expected to surface these loudly.
//!
//! Soft misses (an object with no observable changes, a traversal that finds
//! no related objects) are never errors. They simply contribute nothing.

use thiserror::Error;

use crate::model::{Attribute, EntityKind};

/// Errors raised while compiling entity definitions into a dependency table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The same entity kind was defined twice.
    #[error("entity kind `{0}` is defined more than once")]
    DuplicateKind(EntityKind),

    /// A key path or propagation names a relationship the kind does not declare.
    #[error("`{kind}` has no relationship named `{relationship}`")]
    UnknownRelationship {
        kind: EntityKind,
        relationship: Attribute,
    },

    /// A relationship points at a kind that was never defined.
    #[error("relationship `{kind}.{relationship}` targets undefined kind `{target}`")]
    UnknownTargetKind {
        kind: EntityKind,
        relationship: Attribute,
        target: EntityKind,
    },

    /// A key path or required key names a raw key the kind does not declare.
    #[error("`{kind}` has no raw attribute or relationship named `{key}`")]
    UnknownKey { kind: EntityKind, key: Attribute },

    /// An observable key lists itself among the keys affecting it.
    #[error("observable key `{kind}.{key}` is declared as affecting itself")]
    SelfDependency { kind: EntityKind, key: Attribute },

    /// An observable key depends on another derived key, which would require
    /// chained propagation inside a single pass.
    #[error("observable key `{kind}.{key}` depends on derived key `{dependency}`")]
    DerivedDependency {
        kind: EntityKind,
        key: Attribute,
        dependency: Attribute,
    },

    /// A propagation whose path cannot be resolved from the target back to
    /// the source kind.
    #[error(
        "propagation from `{kind}` via `{via}` expects `{target}.{as_path}` to point back at `{kind}`"
    )]
    UnresolvableTraversal {
        kind: EntityKind,
        via: Attribute,
        target: EntityKind,
        as_path: Attribute,
    },

    /// A propagation that would route a kind's changes back onto its own kind.
    #[error("propagation from `{kind}` via `{via}` leads back to `{kind}`")]
    SelfPropagation { kind: EntityKind, via: Attribute },

    /// A key path string that is not `key` or `relationship.key`.
    #[error("malformed key path `{0}`")]
    MalformedKeyPath(String),
}

/// Errors raised by the ordered-collection differ.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// A move mode name that does not match any supported widget convention.
    #[error("unknown move mode `{0}`")]
    UnknownMoveMode(String),

    /// The same element appears twice in an ordered collection.
    #[error("duplicate element at index {index}")]
    DuplicateElement { index: usize },

    /// An edit script does not fit the collections it is applied to.
    #[error("edit script does not apply: {0}")]
    ScriptMismatch(String),
}

/// Umbrella error for the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    /// A schema document that is not valid JSON or does not match the
    /// definition layout.
    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_errors_name_the_offending_key() {
        let err = SchemaError::SelfDependency {
            kind: EntityKind::new("User"),
            key: Attribute::new("displayName"),
        };
        assert_eq!(
            err.to_string(),
            "observable key `User.displayName` is declared as affecting itself"
        );
    }

    #[test]
    fn umbrella_error_wraps_diff_errors() {
        let err: Error = DiffError::UnknownMoveMode("sideways".into()).into();
        assert!(matches!(err, Error::Diff(DiffError::UnknownMoveMode(_))));
        assert_eq!(err.to_string(), "unknown move mode `sideways`");
    }
}
