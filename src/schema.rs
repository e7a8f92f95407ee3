//! Model schemas
//!
//! A schema is the memoized structural description of an element type.
//! Extraction is a pure, deterministic walk of the type's declared
//! capability descriptor; it never depends on graph state. The store
//! caches schemas per type for the lifetime of the active type-loading
//! context and must be cleaned up when that context is discarded.

use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::types::{ModelElement, ModelType};

/// Whether instances of a type are fully graph-managed or backed by a
/// concrete, externally-supplied instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSchemaKind {
    Managed,
    Unmanaged,
}

/// One declared property of an element type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProperty {
    pub name: &'static str,
    pub type_name: &'static str,
    pub writable: bool,
}

impl ModelProperty {
    pub fn readable(name: &'static str, type_name: &'static str) -> Self {
        Self {
            name,
            type_name,
            writable: false,
        }
    }

    pub fn writable(name: &'static str, type_name: &'static str) -> Self {
        Self {
            name,
            type_name,
            writable: true,
        }
    }
}

/// Structural description of an element type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSchema {
    ty: ModelType,
    kind: ModelSchemaKind,
    properties: Vec<ModelProperty>,
}

impl ModelSchema {
    pub fn ty(&self) -> &ModelType {
        &self.ty
    }

    pub fn kind(&self) -> ModelSchemaKind {
        self.kind
    }

    pub fn properties(&self) -> &[ModelProperty] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&ModelProperty> {
        self.properties.iter().find(|property| property.name == name)
    }
}

/// Extracts schemas from a type's declared capability descriptor
#[derive(Debug, Default)]
pub struct ModelSchemaExtractor;

impl ModelSchemaExtractor {
    /// Pure function of the type's declared descriptor
    pub fn extract<T: ModelElement>(&self) -> ModelSchema {
        ModelSchema {
            ty: ModelType::of::<T>(),
            kind: T::schema_kind(),
            properties: T::properties(),
        }
    }
}

/// Memoizing schema store
#[derive(Debug, Default)]
pub struct ModelSchemaStore {
    cache: HashMap<TypeId, Rc<ModelSchema>>,
    extractor: ModelSchemaExtractor,
}

impl ModelSchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The memoized schema for `T`, extracting and caching it on first
    /// request
    pub fn get_schema<T: ModelElement>(&mut self) -> Rc<ModelSchema> {
        let extractor = &self.extractor;
        Rc::clone(
            self.cache
                .entry(TypeId::of::<T>())
                .or_insert_with(|| {
                    debug!(ty = T::type_name(), "extracting schema");
                    Rc::new(extractor.extract::<T>())
                }),
        )
    }

    /// Invalidate the cache; must be invoked whenever the type-loading
    /// context is discarded to avoid serving stale schemas
    pub fn clean_up(&mut self) {
        debug!(size = self.cache.len(), "schema cache cleared");
        self.cache.clear();
    }

    pub fn size(&self) -> usize {
        self.cache.len()
    }
}
