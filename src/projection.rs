//! Model projections
//!
//! A projection turns a node's stored private data into a typed view.
//! Nodes carry an ordered chain of projections; the first member
//! supporting a requested type wins, for capability queries and for
//! materialization alike.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::node::ModelNode;
use crate::rule::ModelRuleDescriptor;
use crate::types::{ModelElement, ModelType};
use crate::view::ModelView;

/// Polymorphic capability over `{readable, writable}` for a requested
/// type.
///
/// `as_readonly`/`as_writable` return `None` (not an error) when the
/// type is unsupported; callers check before erroring.
pub trait ModelProjection: fmt::Debug {
    /// Pure capability query, no materialization
    fn can_be_viewed_as_readonly(&self, ty: &ModelType) -> bool;

    /// Pure capability query, no materialization
    fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool;

    fn as_readonly(
        &self,
        ty: &ModelType,
        node: &ModelNode,
        descriptor: &ModelRuleDescriptor,
    ) -> Option<ModelView>;

    fn as_writable(
        &self,
        ty: &ModelType,
        node: &ModelNode,
        descriptor: &ModelRuleDescriptor,
        inputs: Vec<ModelView>,
    ) -> Option<ModelView>;

    /// Descriptions of the readable types, for diagnostics
    fn readable_type_descriptions(&self, node: &ModelNode) -> Vec<String>;

    /// Descriptions of the writable types, for diagnostics
    fn writable_type_descriptions(&self, node: &ModelNode) -> Vec<String>;
}

/// Projection over an externally-instantiated value of a declared type.
///
/// Supports any requested type the declared type is assignable to.
#[derive(Debug, Clone)]
pub struct UnmanagedModelProjection {
    ty: ModelType,
}

impl UnmanagedModelProjection {
    pub fn of<T: ModelElement>() -> Self {
        Self {
            ty: ModelType::of::<T>(),
        }
    }

    pub fn of_type(ty: ModelType) -> Self {
        Self { ty }
    }

    fn supports(&self, requested: &ModelType) -> bool {
        requested.is_assignable_from(&self.ty)
    }

    fn view(&self, requested: &ModelType, node: &ModelNode, writable: bool, inputs: Vec<ModelView>) -> Option<ModelView> {
        let (instance_type, instance) = node.private_data_raw()?;
        Some(ModelView::new(
            node.path(),
            requested.clone(),
            instance_type,
            instance,
            writable,
            inputs,
        ))
    }
}

impl ModelProjection for UnmanagedModelProjection {
    fn can_be_viewed_as_readonly(&self, ty: &ModelType) -> bool {
        self.supports(ty)
    }

    fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool {
        self.supports(ty)
    }

    fn as_readonly(
        &self,
        ty: &ModelType,
        node: &ModelNode,
        _descriptor: &ModelRuleDescriptor,
    ) -> Option<ModelView> {
        if !self.supports(ty) {
            return None;
        }
        self.view(ty, node, false, Vec::new())
    }

    fn as_writable(
        &self,
        ty: &ModelType,
        node: &ModelNode,
        _descriptor: &ModelRuleDescriptor,
        inputs: Vec<ModelView>,
    ) -> Option<ModelView> {
        if !self.supports(ty) {
            return None;
        }
        self.view(ty, node, true, inputs)
    }

    fn readable_type_descriptions(&self, _node: &ModelNode) -> Vec<String> {
        vec![self.ty.name().to_string()]
    }

    fn writable_type_descriptions(&self, _node: &ModelNode) -> Vec<String> {
        vec![self.ty.name().to_string()]
    }
}

/// Composes an ordered list of member projections.
///
/// The first member declaring support for a requested type wins, for
/// capability queries and materialization. Description enumeration
/// concatenates all members' descriptions, in order.
#[derive(Debug, Clone, Default)]
pub struct ChainingModelProjection {
    projections: Vec<Rc<dyn ModelProjection>>,
}

impl ChainingModelProjection {
    pub fn new(projections: Vec<Rc<dyn ModelProjection>>) -> Self {
        Self { projections }
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    pub fn members(&self) -> &[Rc<dyn ModelProjection>] {
        &self.projections
    }

    fn first_supporting_readonly(&self, ty: &ModelType) -> Option<&Rc<dyn ModelProjection>> {
        self.projections
            .iter()
            .find(|projection| projection.can_be_viewed_as_readonly(ty))
    }

    fn first_supporting_writable(&self, ty: &ModelType) -> Option<&Rc<dyn ModelProjection>> {
        self.projections
            .iter()
            .find(|projection| projection.can_be_viewed_as_writable(ty))
    }
}

impl ModelProjection for ChainingModelProjection {
    fn can_be_viewed_as_readonly(&self, ty: &ModelType) -> bool {
        let supported = self.first_supporting_readonly(ty).is_some();
        trace!(ty = %ty, supported, "read capability query");
        supported
    }

    fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool {
        let supported = self.first_supporting_writable(ty).is_some();
        trace!(ty = %ty, supported, "write capability query");
        supported
    }

    fn as_readonly(
        &self,
        ty: &ModelType,
        node: &ModelNode,
        descriptor: &ModelRuleDescriptor,
    ) -> Option<ModelView> {
        self.first_supporting_readonly(ty)
            .and_then(|projection| projection.as_readonly(ty, node, descriptor))
    }

    fn as_writable(
        &self,
        ty: &ModelType,
        node: &ModelNode,
        descriptor: &ModelRuleDescriptor,
        inputs: Vec<ModelView>,
    ) -> Option<ModelView> {
        self.first_supporting_writable(ty)
            .and_then(|projection| projection.as_writable(ty, node, descriptor, inputs))
    }

    fn readable_type_descriptions(&self, node: &ModelNode) -> Vec<String> {
        self.projections
            .iter()
            .flat_map(|projection| projection.readable_type_descriptions(node))
            .collect()
    }

    fn writable_type_descriptions(&self, node: &ModelNode) -> Vec<String> {
        self.projections
            .iter()
            .flat_map(|projection| projection.writable_type_descriptions(node))
            .collect()
    }
}

/// Two chains are equal iff their ordered member lists are equal
/// (member identity, not structural equality).
impl PartialEq for ChainingModelProjection {
    fn eq(&self, other: &Self) -> bool {
        self.projections.len() == other.projections.len()
            && self
                .projections
                .iter()
                .zip(&other.projections)
                .all(|(a, b)| Rc::ptr_eq(a, b))
    }
}

impl Eq for ChainingModelProjection {}
