//! Modelgraph - lazy, rule-driven configuration model
//!
//! Modelgraph maintains a build's configuration as a graph of typed,
//! lazily-realized nodes. Rules attach to nodes in staged roles and run
//! only when a node's value is actually demanded, so untouched parts of
//! the model are never computed and every mutation lands in a
//! well-defined window of the node's lifecycle.

pub mod error;
pub mod factory;
pub mod map;
pub mod node;
pub mod path;
pub mod projection;
pub mod rule;
pub mod schema;
pub mod types;
pub mod view;

// Re-exports for convenience
pub use error::{ModelError, ModelResult};
pub use factory::{InstanceFactory, NamedEntityInstantiator};
pub use map::{ChildCreator, NodeBackedModelMap};
pub use node::{ModelCreator, ModelNode, ModelNodeState};
pub use path::ModelPath;
pub use projection::{ChainingModelProjection, ModelProjection, UnmanagedModelProjection};
pub use rule::{ModelAction, ModelActionRole, ModelReference, ModelRuleDescriptor, RuleSource};
pub use schema::{ModelProperty, ModelSchema, ModelSchemaKind, ModelSchemaStore};
pub use types::{ModelElement, ModelType};
pub use view::{ModelView, ModelViewState};
