//! Node-backed collections
//!
//! A name-keyed collection view over one node's children, with
//! rule-based bulk configuration. Element membership is decided by
//! declared (not realized) viewability, so queries stay lazy; reads
//! during configuration never grant accidental mutation rights.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{ModelError, ModelResult};
use crate::factory::{InstanceFactory, NamedEntityInstantiator};
use crate::node::{ModelCreator, ModelNode};
use crate::projection::UnmanagedModelProjection;
use crate::rule::{ModelAction, ModelActionRole, ModelReference, ModelRuleDescriptor, RuleSource};
use crate::types::{ModelElement, ModelType};
use crate::view::{ModelView, ModelViewState};

/// Strategy for allocating a new child link
#[derive(Clone)]
pub enum ChildCreator {
    /// Ask the instantiator stored as the parent node's private data
    ParentInstantiator,
    /// Ask a referenced instance-factory service
    Factory(Rc<RefCell<InstanceFactory>>),
    /// Result of `with_type` to a type unrelated to the creation
    /// strategy: `create` always fails, reads and rule registration
    /// keep working
    Unsupported { element: ModelType },
}

/// Name-keyed, rule-schedulable collection built atop a node's
/// children
#[derive(Clone)]
pub struct NodeBackedModelMap {
    description: String,
    element_type: ModelType,
    source_descriptor: ModelRuleDescriptor,
    node: ModelNode,
    eager: bool,
    state: ModelViewState,
    creator: ChildCreator,
}

impl NodeBackedModelMap {
    pub fn of<T: ModelElement>(
        node: ModelNode,
        source_descriptor: ModelRuleDescriptor,
        state: ModelViewState,
        creator: ChildCreator,
    ) -> Self {
        let element_type = ModelType::of::<T>();
        let description = Self::describe(&element_type, &node);
        Self {
            description,
            element_type,
            source_descriptor,
            node,
            eager: false,
            state,
            creator,
        }
    }

    /// An eager collection force-realizes each created child through
    /// `Initialized` immediately; otherwise creation is fully lazy
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn element_type(&self) -> &ModelType {
        &self.element_type
    }

    pub fn backing_node(&self) -> &ModelNode {
        &self.node
    }

    fn describe(element: &ModelType, node: &ModelNode) -> String {
        format!("ModelMap<{}> '{}'", element.name(), node.path())
    }

    // ---- creation ---------------------------------------------------

    /// Allocate a new child link of the element type
    pub fn create<S: ModelElement>(&self, name: &str) -> ModelResult<()> {
        self.create_with::<S>(name, |_| {})
    }

    /// Allocate a new child link of type `S` and schedule `config`
    /// against it in the `Initialize` role. Fails if the name already
    /// exists; callable only inside a mutate-capable window.
    pub fn create_with<S: ModelElement>(
        &self,
        name: &str,
        config: impl Fn(&mut S) + 'static,
    ) -> ModelResult<()> {
        self.state.assert_can_mutate(&self.description)?;
        let ty = ModelType::of::<S>();
        if !self.element_type.is_assignable_from(&ty) {
            return Err(ModelError::IncompatibleType {
                requested: ty.name().to_string(),
                expected: self.element_type.name().to_string(),
            });
        }
        let creator = self.child_creator(&ty, name)?;
        let child = self.node.add_link(creator)?;

        let descriptor = self.source_descriptor.nested(format!("create({name})"));
        let subject = ModelReference::of_path(child.path(), ty);
        self.node.apply_to_link(
            ModelActionRole::Initialize,
            ModelAction::no_inputs::<S>(subject, descriptor, config),
        )?;

        if self.eager {
            child.ensure_usable()?;
        }
        Ok(())
    }

    fn child_creator(&self, ty: &ModelType, name: &str) -> ModelResult<ModelCreator> {
        let path = self.node.path().child(name);
        let descriptor = self.source_descriptor.nested(format!("create({name})"));
        match &self.creator {
            ChildCreator::ParentInstantiator => {
                let parent = self.node.clone();
                let ty = ty.clone();
                let name = name.to_string();
                Ok(ModelCreator::of(path, descriptor)
                    .with_projection(Rc::new(UnmanagedModelProjection::of_type(ty.clone())))
                    .with_initializer(move |node| {
                        let instantiator = stored_instantiator(&parent)?;
                        let (concrete, instance) = instantiator.create(&name, &ty)?;
                        node.set_private_data_dyn(concrete, instance)
                    }))
            }
            ChildCreator::Factory(factory) => {
                let factory = Rc::clone(factory);
                let ty = ty.clone();
                let name = name.to_string();
                Ok(ModelCreator::of(path, descriptor)
                    .with_projection(Rc::new(UnmanagedModelProjection::of_type(ty.clone())))
                    .with_initializer(move |node| {
                        factory.borrow().create(&ty, node, &name).map(|_| ())
                    }))
            }
            ChildCreator::Unsupported { element } => Err(ModelError::IncompatibleType {
                requested: ty.name().to_string(),
                expected: element.name().to_string(),
            }),
        }
    }

    // ---- element access ---------------------------------------------

    /// The named element, realized far enough to be usable. Yields a
    /// writable view only when this collection itself was produced in
    /// a mutate-capable context and the element is still mutable;
    /// incidental reads stay read-only.
    pub fn get(&self, name: &str) -> ModelResult<Option<ModelView>> {
        let Some(link) = self.node.get_link(name)? else {
            return Ok(None);
        };
        link.ensure_usable()?;
        let view = if self.state.can_mutate() && link.is_mutable() {
            link.as_writable(&self.element_type, &self.source_descriptor, Vec::new())?
        } else {
            link.as_read_only(&self.element_type, &self.source_descriptor)?
        };
        Ok(Some(view))
    }

    // ---- bulk configuration -----------------------------------------

    /// Schedule a `Mutate`-role rule against every current-and-future
    /// element viewable as `S`
    pub fn all<S: ModelElement>(&self, config: impl Fn(&mut S) + 'static) -> ModelResult<()> {
        self.schedule_for_all(ModelActionRole::Mutate, "all()", config)
    }

    /// Schedule a `Mutate`-role rule against one named element
    pub fn named<S: ModelElement>(
        &self,
        name: &str,
        config: impl Fn(&mut S) + 'static,
    ) -> ModelResult<()> {
        self.state.assert_can_mutate(&self.description)?;
        let descriptor = self.source_descriptor.nested(format!("named({name})"));
        let subject = ModelReference::of_path(self.node.path().child(name), ModelType::of::<S>());
        self.node.apply_to_link(
            ModelActionRole::Mutate,
            ModelAction::no_inputs::<S>(subject, descriptor, config),
        )
    }

    /// Apply a whole rule bundle to one named element
    pub fn named_with_rules(&self, name: &str, rules: &dyn RuleSource) -> ModelResult<()> {
        self.state.assert_can_mutate(&self.description)?;
        self.node.apply_rules_to_link(name, rules)
    }

    /// Schedule a `Defaults`-role rule against every element viewable
    /// as `S`, independent of creation order
    pub fn before_each<S: ModelElement>(&self, config: impl Fn(&mut S) + 'static) -> ModelResult<()> {
        self.schedule_for_all(ModelActionRole::Defaults, "before_each()", config)
    }

    /// Schedule a `Finalize`-role rule against every element viewable
    /// as `S`, independent of creation order
    pub fn after_each<S: ModelElement>(&self, config: impl Fn(&mut S) + 'static) -> ModelResult<()> {
        self.schedule_for_all(ModelActionRole::Finalize, "after_each()", config)
    }

    fn schedule_for_all<S: ModelElement>(
        &self,
        role: ModelActionRole,
        label: &str,
        config: impl Fn(&mut S) + 'static,
    ) -> ModelResult<()> {
        self.state.assert_can_mutate(&self.description)?;
        let descriptor = self.source_descriptor.nested(label);
        let subject = ModelReference::of_type(ModelType::of::<S>());
        self.node.apply_to_all_links(
            role,
            ModelAction::no_inputs::<S>(subject, descriptor, config),
            false,
        )
    }

    // ---- type filtering ---------------------------------------------

    /// A view of this collection as `ty`.
    ///
    /// The same or a wider type yields this collection unchanged; a
    /// compatible narrower type yields a sub-view sharing the creation
    /// strategy; an unrelated type degrades to a read/callback-only
    /// filter whose `create` always fails.
    pub fn with_type(&self, ty: ModelType) -> NodeBackedModelMap {
        if ty == self.element_type || ty.is_assignable_from(&self.element_type) {
            return self.clone();
        }
        let mut map = self.clone();
        if !self.element_type.is_assignable_from(&ty) {
            map.creator = ChildCreator::Unsupported {
                element: self.element_type.clone(),
            };
        }
        map.description = Self::describe(&ty, &map.node);
        map.element_type = ty;
        map
    }

    // ---- queries ----------------------------------------------------

    /// Names of registered elements declaring viewability for the
    /// element type, in insertion order
    pub fn key_set(&self) -> ModelResult<Vec<String>> {
        self.node.get_link_names(&self.element_type)
    }

    pub fn size(&self) -> ModelResult<usize> {
        self.node.link_count(&self.element_type)
    }

    pub fn is_empty(&self) -> ModelResult<bool> {
        Ok(self.size()? == 0)
    }

    pub fn contains_key(&self, name: &str) -> ModelResult<bool> {
        self.node.has_link(name, &self.element_type)
    }

    /// Views of all elements, in insertion order
    pub fn values(&self) -> ModelResult<Vec<ModelView>> {
        let mut views = Vec::new();
        for name in self.key_set()? {
            if let Some(view) = self.get(&name)? {
                views.push(view);
            }
        }
        Ok(views)
    }

    /// Unsupported by design: deciding membership would require
    /// realizing every element, a cost this collection refuses to pay
    /// implicitly
    pub fn contains_value(&self) -> ModelResult<bool> {
        Err(ModelError::Unsupported {
            operation: "contains_value".to_string(),
            reason: "membership would require realizing every element".to_string(),
        })
    }
}

impl std::fmt::Debug for NodeBackedModelMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

fn stored_instantiator(parent: &ModelNode) -> ModelResult<Rc<dyn NamedEntityInstantiator>> {
    let missing = || ModelError::Unsupported {
        operation: "create".to_string(),
        reason: format!("no instantiator stored on '{}'", parent.path()),
    };
    let (_, cell) = parent.private_data_raw().ok_or_else(missing)?;
    let instance = cell.borrow();
    instance
        .downcast_ref::<Rc<dyn NamedEntityInstantiator>>()
        .cloned()
        .ok_or_else(missing)
}
