//! Model element types
//!
//! In place of runtime reflection, every element type carries an
//! explicit capability descriptor: a static name, a declared supertype
//! chain used for assignability checks, and an optional structural
//! description consumed by the schema extractor.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::schema::{ModelProperty, ModelSchemaKind};

/// A type that can live in the model graph.
///
/// Implementations declare their ancestry explicitly via
/// [`ModelElement::supertypes`]; assignability walks that declared
/// chain, transitively. The default descriptor describes an unmanaged
/// leaf type with no properties.
pub trait ModelElement: Any {
    /// Human-readable type name used in diagnostics
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Declared direct supertypes of this type
    fn supertypes() -> Vec<ModelType>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Whether instances are fully graph-managed or externally supplied
    fn schema_kind() -> ModelSchemaKind
    where
        Self: Sized,
    {
        ModelSchemaKind::Unmanaged
    }

    /// Declared structural properties, for schema extraction
    fn properties() -> Vec<ModelProperty>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Runtime descriptor for a [`ModelElement`] type.
///
/// Cheap to clone; equality and hashing are by `TypeId` only.
#[derive(Debug, Clone)]
pub struct ModelType {
    id: TypeId,
    name: &'static str,
    supertypes: Rc<Vec<ModelType>>,
}

impl ModelType {
    /// The descriptor for `T`
    pub fn of<T: ModelElement>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::type_name(),
            supertypes: Rc::new(T::supertypes()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Declared direct supertypes
    pub fn supertypes(&self) -> &[ModelType] {
        &self.supertypes
    }

    /// Whether a value of type `other` can be used where `self` is
    /// required, per the declared supertype chains
    pub fn is_assignable_from(&self, other: &ModelType) -> bool {
        if self == other {
            return true;
        }
        other
            .supertypes
            .iter()
            .any(|parent| self.is_assignable_from(parent))
    }

    pub fn is<T: ModelElement>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModelType {}

impl Hash for ModelType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
