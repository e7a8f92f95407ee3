//! Instance factories
//!
//! A typed registry mapping declared types to construction strategies.
//! Lookup is by assignability: the most specific registered type that
//! the requested type can be assigned to wins.

use std::any::Any;
use std::rc::Rc;

use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::node::ModelNode;
use crate::rule::ModelRuleDescriptor;
use crate::types::{ModelElement, ModelType};

type FactoryFn = Box<dyn Fn(&ModelNode, &str) -> Box<dyn Any>>;

struct FactoryRegistration {
    ty: ModelType,
    source: ModelRuleDescriptor,
    create: FactoryFn,
}

/// Registry of construction strategies under one declared base type
pub struct InstanceFactory {
    display_name: String,
    base_type: ModelType,
    registrations: Vec<FactoryRegistration>,
}

impl InstanceFactory {
    pub fn new(display_name: impl Into<String>, base_type: ModelType) -> Self {
        Self {
            display_name: display_name.into(),
            base_type,
            registrations: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn base_type(&self) -> &ModelType {
        &self.base_type
    }

    /// Associate a concrete type with a construction strategy.
    ///
    /// Registering the same concrete type twice is a conflict and
    /// fails fast rather than silently overwriting.
    pub fn register<S: ModelElement>(
        &mut self,
        source: ModelRuleDescriptor,
        create: impl Fn(&ModelNode, &str) -> S + 'static,
    ) -> ModelResult<()> {
        let ty = ModelType::of::<S>();
        if !self.base_type.is_assignable_from(&ty) {
            return Err(ModelError::IncompatibleType {
                requested: ty.name().to_string(),
                expected: self.base_type.name().to_string(),
            });
        }
        if let Some(existing) = self.registrations.iter().find(|r| r.ty == ty) {
            return Err(ModelError::DuplicateFactoryRegistration {
                type_name: ty.name().to_string(),
                existing: existing.source.to_string(),
            });
        }
        debug!(factory = %self.display_name, ty = %ty, source = %source, "factory registered");
        self.registrations.push(FactoryRegistration {
            ty,
            source,
            create: Box::new(move |node, payload| Box::new(create(node, payload))),
        });
        Ok(())
    }

    /// Whether some registered factory can produce the requested type
    pub fn supports(&self, requested: &ModelType) -> bool {
        self.registrations
            .iter()
            .any(|r| r.ty.is_assignable_from(requested))
    }

    /// Resolve the most specific registered factory assignable from
    /// `requested`, invoke it with `(node, payload)`, store the result
    /// as the node's private data and return its concrete type.
    pub fn create(
        &self,
        requested: &ModelType,
        node: &ModelNode,
        payload: &str,
    ) -> ModelResult<ModelType> {
        let registration = self
            .most_specific(requested)
            .ok_or_else(|| ModelError::NoFactoryForType {
                requested: requested.name().to_string(),
                supported: self.supported_type_names().join(", "),
            })?;
        debug!(factory = %self.display_name, requested = %requested, chosen = %registration.ty, payload, "creating instance");
        let instance = (registration.create)(node, payload);
        node.set_private_data_dyn(registration.ty.clone(), instance)?;
        Ok(registration.ty.clone())
    }

    /// Names of all registered types, sorted for stable messages
    pub fn supported_type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registrations
            .iter()
            .map(|r| r.ty.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// The candidate no other candidate is more specific than. An
    /// exact match always wins; ties fall to registration order.
    fn most_specific(&self, requested: &ModelType) -> Option<&FactoryRegistration> {
        let candidates: Vec<&FactoryRegistration> = self
            .registrations
            .iter()
            .filter(|r| r.ty.is_assignable_from(requested))
            .collect();
        candidates
            .iter()
            .find(|candidate| {
                candidates
                    .iter()
                    .all(|other| other.ty.is_assignable_from(&candidate.ty))
            })
            .copied()
            .or_else(|| candidates.first().copied())
    }
}

impl std::fmt::Debug for InstanceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceFactory")
            .field("display_name", &self.display_name)
            .field("base_type", &self.base_type)
            .field("registrations", &self.supported_type_names())
            .finish()
    }
}

/// Creates named entities of a base type; stored as a node's private
/// data so a node-backed collection can instantiate children through
/// its parent.
pub trait NamedEntityInstantiator {
    /// Base type this instantiator can produce subtypes of
    fn base_type(&self) -> &ModelType;

    /// Whether an entity of the requested type can be created
    fn supports(&self, ty: &ModelType) -> bool;

    /// Create the entity, returning its concrete type and instance
    fn create(&self, name: &str, ty: &ModelType) -> ModelResult<(ModelType, Box<dyn Any>)>;
}

impl ModelElement for Rc<dyn NamedEntityInstantiator> {
    fn type_name() -> &'static str {
        "NamedEntityInstantiator"
    }
}
