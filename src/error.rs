//! Error types for the model graph.
//!
//! Uses `thiserror` for library errors. Every variant is `Clone` so a
//! node that failed during rule execution can re-surface the same error
//! on every later access instead of retrying.

use thiserror::Error;

use crate::node::ModelNodeState;
use crate::path::ModelPath;
use crate::rule::ModelActionRole;

/// Result type alias for model graph operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Main error type for model graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A child with the same name is already linked from the parent
    #[error("duplicate child '{name}' under '{path}'")]
    DuplicateLink { path: ModelPath, name: String },

    /// No child of the given name is linked from the parent
    #[error("no child '{name}' linked from '{path}'")]
    LinkNotFound { path: ModelPath, name: String },

    /// Realizing a node transitively required realizing it again to an
    /// equal-or-later state
    #[error("realization cycle: '{path}' is already being realized towards {state} (rules: {descriptor})")]
    RealizationCycle {
        path: ModelPath,
        state: ModelNodeState,
        descriptor: String,
    },

    /// No projection in the node's chain supports the requested type
    #[error("type '{requested}' is not supported by '{path}', supported types: {supported}")]
    NoSuchViewType {
        path: ModelPath,
        requested: String,
        supported: String,
    },

    /// No registered factory matches the requested type
    #[error("no factory registered for type '{requested}', supported types: {supported}")]
    NoFactoryForType { requested: String, supported: String },

    /// A factory for the same concrete type is already registered
    #[error("a factory for type '{type_name}' is already registered by {existing}")]
    DuplicateFactoryRegistration { type_name: String, existing: String },

    /// A type was used where an incompatible type is required
    #[error("cannot use type '{requested}' where type '{expected}' is required")]
    IncompatibleType { requested: String, expected: String },

    /// A rule was registered for a role the target node has already passed
    #[error("cannot register rule '{descriptor}' for role {role} on '{path}': node is already at {state}")]
    RuleOrderingViolation {
        path: ModelPath,
        role: ModelActionRole,
        state: ModelNodeState,
        descriptor: String,
    },

    /// A mutating operation was attempted outside a mutate-capable window
    #[error("cannot mutate '{subject}' outside of a mutation window")]
    NotMutable { subject: String },

    /// A creator declared a path that is not a direct child of the
    /// node it was given to
    #[error("creator path '{path}' is not a direct child of '{parent}'")]
    InvalidCreatorPath { path: ModelPath, parent: ModelPath },

    /// A reference node was accessed before its target was set
    #[error("reference node '{path}' has no target set")]
    UnsetReference { path: ModelPath },

    /// Resolving a reference target revisited a node already on the
    /// redirect chain
    #[error("reference cycle detected at '{path}'")]
    ReferenceCycle { path: ModelPath },

    /// A view was accessed after it was released
    #[error("view of '{path}' as '{type_name}' has already been closed")]
    ViewClosed { path: ModelPath, type_name: String },

    /// A deliberately-unimplemented operation was invoked
    #[error("{operation} is not supported: {reason}")]
    Unsupported { operation: String, reason: String },
}
