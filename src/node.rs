//! Model nodes and the realization state machine
//!
//! A node owns its children, its private data, an ordered projection
//! chain and a queue of pending rules. Nodes advance strictly forward
//! through the realization states; each role boundary executes the
//! rules queued for that role, in registration order. Everything is
//! single-threaded and lock-free; the state machine enforces ordering,
//! not thread safety.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::path::ModelPath;
use crate::projection::{ChainingModelProjection, ModelProjection, UnmanagedModelProjection};
use crate::rule::{ModelAction, ModelActionRole, ModelRuleDescriptor, RuleSource};
use crate::types::{ModelElement, ModelType};
use crate::view::{InstanceCell, ModelView};

/// Realization state of a node, strictly forward-progressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelNodeState {
    Registered,
    Created,
    DefaultsApplied,
    Initialized,
    Mutated,
    Finalized,
    Realized,
}

impl ModelNodeState {
    /// The role whose execution leaves this state, or `None` once all
    /// roles have run
    fn next_role(self) -> Option<ModelActionRole> {
        match self {
            ModelNodeState::Registered => Some(ModelActionRole::Create),
            ModelNodeState::Created => Some(ModelActionRole::Defaults),
            ModelNodeState::DefaultsApplied => Some(ModelActionRole::Initialize),
            ModelNodeState::Initialized => Some(ModelActionRole::Mutate),
            ModelNodeState::Mutated => Some(ModelActionRole::Finalize),
            ModelNodeState::Finalized | ModelNodeState::Realized => None,
        }
    }
}

impl fmt::Display for ModelNodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

type Initializer = Box<dyn Fn(&ModelNode) -> ModelResult<()>>;

/// Declares a node to be linked into the graph: its path, descriptor,
/// projection chain and an initializer run during the `Create` role.
pub struct ModelCreator {
    path: ModelPath,
    descriptor: ModelRuleDescriptor,
    projections: Vec<Rc<dyn ModelProjection>>,
    initializer: Option<Initializer>,
    hidden: bool,
}

impl ModelCreator {
    pub fn of(path: ModelPath, descriptor: ModelRuleDescriptor) -> Self {
        Self {
            path,
            descriptor,
            projections: Vec::new(),
            initializer: None,
            hidden: false,
        }
    }

    /// A creator for an externally-instantiated value of type `T`
    pub fn unmanaged<T: ModelElement>(
        path: ModelPath,
        descriptor: ModelRuleDescriptor,
        make: impl Fn() -> T + 'static,
    ) -> Self {
        Self::of(path, descriptor)
            .with_projection(Rc::new(UnmanagedModelProjection::of::<T>()))
            .with_initializer(move |node| node.set_private_data(make()))
    }

    pub fn with_projection(mut self, projection: Rc<dyn ModelProjection>) -> Self {
        self.projections.push(projection);
        self
    }

    pub fn with_initializer(
        mut self,
        initializer: impl Fn(&ModelNode) -> ModelResult<()> + 'static,
    ) -> Self {
        self.initializer = Some(Box::new(initializer));
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn path(&self) -> &ModelPath {
        &self.path
    }
}

enum NodeKind {
    /// The node owns its content
    Owned {
        data: Option<(ModelType, InstanceCell)>,
    },
    /// The node redirects all reads and writes to a target set after
    /// construction; it never owns private data
    Reference { target: Option<ModelNode> },
}

struct RuleBinding {
    role: ModelActionRole,
    action: ModelAction,
}

/// A rule applying to every current-and-future child of a node
#[derive(Clone)]
struct ScopedRule {
    role: ModelActionRole,
    action: ModelAction,
    transitive: bool,
}

struct NodeData {
    path: ModelPath,
    descriptor: ModelRuleDescriptor,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<(String, ModelNode)>,
    kind: NodeKind,
    projection: ChainingModelProjection,
    state: ModelNodeState,
    /// Boundary state currently being transitioned to, for cycle
    /// detection
    in_transition: Option<ModelNodeState>,
    hidden: bool,
    initializer: Option<Initializer>,
    rules: Vec<RuleBinding>,
    scoped_rules: Vec<ScopedRule>,
    /// First rule failure; re-surfaced unchanged on every later access
    failure: Option<ModelError>,
}

/// A graph element capable of being realized into a concrete object.
///
/// Cheap-clone handle; clones share the same underlying node.
#[derive(Clone)]
pub struct ModelNode {
    inner: Rc<RefCell<NodeData>>,
}

enum TransitionStep {
    Rules(ModelActionRole, Vec<ModelAction>, Option<Initializer>),
    Promote(ModelNodeState),
}

impl ModelNode {
    /// The root of a new model graph.
    ///
    /// The root exists from the start: it is already `Created`, has no
    /// creator and an empty projection chain.
    pub fn root() -> Self {
        Self {
            inner: Rc::new(RefCell::new(NodeData {
                path: ModelPath::root(),
                descriptor: ModelRuleDescriptor::new("model"),
                parent: Weak::new(),
                children: Vec::new(),
                kind: NodeKind::Owned { data: None },
                projection: ChainingModelProjection::default(),
                state: ModelNodeState::Created,
                in_transition: None,
                hidden: false,
                initializer: None,
                rules: Vec::new(),
                scoped_rules: Vec::new(),
                failure: None,
            })),
        }
    }

    pub fn path(&self) -> ModelPath {
        self.inner.borrow().path.clone()
    }

    pub fn state(&self) -> ModelNodeState {
        self.inner.borrow().state
    }

    pub fn descriptor(&self) -> ModelRuleDescriptor {
        self.inner.borrow().descriptor.clone()
    }

    pub fn parent(&self) -> Option<ModelNode> {
        self.inner
            .borrow()
            .parent
            .upgrade()
            .map(|inner| ModelNode { inner })
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.borrow().hidden
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.inner.borrow_mut().hidden = hidden;
    }

    /// Whether the node is still inside its mutate-capable window
    pub fn is_mutable(&self) -> bool {
        self.state() < ModelNodeState::Finalized
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.inner.borrow().kind, NodeKind::Reference { .. })
    }

    // ---- linking ----------------------------------------------------

    /// Insert a new child at the creator's declared path, in
    /// `Registered` state. Fails if a child of that name exists.
    pub fn add_link(&self, creator: ModelCreator) -> ModelResult<ModelNode> {
        self.add_node(creator, false)
    }

    /// Insert a reference node that will redirect to another node's
    /// identity once its target is set. Fails on access before then.
    pub fn add_reference(&self, creator: ModelCreator) -> ModelResult<ModelNode> {
        self.add_node(creator, true)
    }

    fn add_node(&self, creator: ModelCreator, reference: bool) -> ModelResult<ModelNode> {
        let content = self.content_node()?;
        let parent_path = content.path();
        let name = match creator.path.parent() {
            Some(parent) if parent == parent_path => creator
                .path
                .name()
                .expect("non-root path has a name")
                .to_string(),
            _ => {
                return Err(ModelError::InvalidCreatorPath {
                    path: creator.path.clone(),
                    parent: parent_path,
                })
            }
        };

        if content.child_by_name(&name).is_some() {
            return Err(ModelError::DuplicateLink {
                path: parent_path,
                name,
            });
        }

        let kind = if reference {
            NodeKind::Reference { target: None }
        } else {
            NodeKind::Owned { data: None }
        };
        let child = ModelNode {
            inner: Rc::new(RefCell::new(NodeData {
                path: creator.path,
                descriptor: creator.descriptor,
                parent: Rc::downgrade(&content.inner),
                children: Vec::new(),
                kind,
                projection: ChainingModelProjection::new(creator.projections),
                state: ModelNodeState::Registered,
                in_transition: None,
                hidden: creator.hidden,
                initializer: creator.initializer,
                rules: Vec::new(),
                scoped_rules: Vec::new(),
                failure: None,
            })),
        };

        // Bind scoped rules registered on this node and, transitively,
        // on its ancestors, to the new child.
        for scoped in content.scoped_rules_for(&child) {
            child.apply_to_self(scoped.role, scoped.action)?;
        }

        debug!(path = %child.path(), hidden = child.is_hidden(), "node registered");
        content
            .inner
            .borrow_mut()
            .children
            .push((name, child.clone()));
        Ok(child)
    }

    /// Detach and discard the named child and its subtree, including
    /// all rules and data registered for it
    pub fn remove_link(&self, name: &str) -> ModelResult<()> {
        let content = self.content_node()?;
        let mut data = content.inner.borrow_mut();
        let position = data.children.iter().position(|(child, _)| child == name);
        match position {
            Some(index) => {
                data.children.remove(index);
                debug!(path = %data.path, name, "link removed");
                Ok(())
            }
            None => Err(ModelError::LinkNotFound {
                path: data.path.clone(),
                name: name.to_string(),
            }),
        }
    }

    fn child_by_name(&self, name: &str) -> Option<ModelNode> {
        self.inner
            .borrow()
            .children
            .iter()
            .find(|(child, _)| child == name)
            .map(|(_, node)| node.clone())
    }

    /// Scoped rules applying to a prospective child of this node:
    /// this node's own registrations plus transitive registrations of
    /// every ancestor, filtered by the child's declared capabilities.
    fn scoped_rules_for(&self, child: &ModelNode) -> Vec<ScopedRule> {
        let mut matches = Vec::new();
        let mut current = Some(self.clone());
        let mut direct = true;
        while let Some(node) = current {
            for scoped in node.inner.borrow().scoped_rules.iter() {
                if (direct || scoped.transitive)
                    && child.can_be_viewed_as_writable(scoped.action.subject().ty())
                {
                    matches.push(scoped.clone());
                }
            }
            current = node.parent();
            direct = false;
        }
        matches
    }

    // ---- references -------------------------------------------------

    /// Set the redirect target of a reference node
    pub fn set_target(&self, target: &ModelNode) -> ModelResult<()> {
        let mut data = self.inner.borrow_mut();
        match &mut data.kind {
            NodeKind::Reference { target: slot } => {
                *slot = Some(target.clone());
                Ok(())
            }
            NodeKind::Owned { .. } => Err(ModelError::Unsupported {
                operation: "set_target".to_string(),
                reason: format!("'{}' is not a reference node", data.path),
            }),
        }
    }

    pub fn target(&self) -> Option<ModelNode> {
        match &self.inner.borrow().kind {
            NodeKind::Reference { target } => target.clone(),
            NodeKind::Owned { .. } => None,
        }
    }

    /// Resolve redirection to the node owning content. A visited set
    /// rejects redirect cycles.
    fn content_node(&self) -> ModelResult<ModelNode> {
        let mut visited: Vec<ModelPath> = Vec::new();
        let mut current = self.clone();
        loop {
            let next = {
                let data = current.inner.borrow();
                match &data.kind {
                    NodeKind::Owned { .. } => return Ok(current.clone()),
                    NodeKind::Reference { target: Some(target) } => target.clone(),
                    NodeKind::Reference { target: None } => {
                        return Err(ModelError::UnsetReference {
                            path: data.path.clone(),
                        })
                    }
                }
            };
            let path = current.path();
            if visited.contains(&path) {
                return Err(ModelError::ReferenceCycle { path });
            }
            visited.push(path);
            current = next;
        }
    }

    // ---- private data -----------------------------------------------

    pub fn set_private_data<T: ModelElement>(&self, value: T) -> ModelResult<()> {
        self.set_private_data_dyn(ModelType::of::<T>(), Box::new(value))
    }

    pub fn set_private_data_dyn(&self, ty: ModelType, value: Box<dyn Any>) -> ModelResult<()> {
        let content = self.content_node()?;
        let mut data = content.inner.borrow_mut();
        match &mut data.kind {
            NodeKind::Owned { data: slot } => {
                *slot = Some((ty, Rc::new(RefCell::new(value))));
                Ok(())
            }
            NodeKind::Reference { .. } => unreachable!("content node is always owned"),
        }
    }

    /// Declared type of the private data, if any is set
    pub fn private_data_type(&self) -> Option<ModelType> {
        self.private_data_raw().map(|(ty, _)| ty)
    }

    pub(crate) fn private_data_raw(&self) -> Option<(ModelType, InstanceCell)> {
        let content = self.content_node().ok()?;
        let data = content.inner.borrow();
        match &data.kind {
            NodeKind::Owned { data: Some((ty, cell)) } => Some((ty.clone(), Rc::clone(cell))),
            _ => None,
        }
    }

    // ---- rules ------------------------------------------------------

    /// Register an action to run against this node during the given
    /// role. Fails if that role has already executed here.
    pub fn apply_to_self(&self, role: ModelActionRole, action: ModelAction) -> ModelResult<()> {
        let content = self.content_node()?;
        let mut data = content.inner.borrow_mut();
        let boundary = role.target_state();
        let passed =
            boundary <= data.state || data.in_transition.is_some_and(|pending| boundary <= pending);
        if passed {
            return Err(ModelError::RuleOrderingViolation {
                path: data.path.clone(),
                role,
                state: data.state,
                descriptor: action.descriptor().to_string(),
            });
        }
        debug!(path = %data.path, %role, rule = %action.descriptor(), "rule registered");
        data.rules.push(RuleBinding { role, action });
        Ok(())
    }

    /// Register an action against the linked child named by the
    /// action's subject path
    pub fn apply_to_link(&self, role: ModelActionRole, action: ModelAction) -> ModelResult<()> {
        let name = match action.subject().path().and_then(|path| path.name()) {
            Some(name) => name.to_string(),
            None => {
                return Err(ModelError::Unsupported {
                    operation: "apply_to_link".to_string(),
                    reason: "rule subject has no path".to_string(),
                })
            }
        };
        match self.get_link(&name)? {
            Some(child) => child.apply_to_self(role, action),
            None => Err(ModelError::LinkNotFound {
                path: self.path(),
                name,
            }),
        }
    }

    /// Register an action against every current-and-future linked
    /// child whose declared capabilities match the action's subject
    /// type; `transitive` extends this to all transitively linked
    /// descendants.
    pub fn apply_to_all_links(
        &self,
        role: ModelActionRole,
        action: ModelAction,
        transitive: bool,
    ) -> ModelResult<()> {
        let content = self.content_node()?;
        let mut matching = Vec::new();
        content.collect_matching_links(action.subject().ty(), transitive, &mut matching);
        for child in matching {
            child.apply_to_self(role, action.clone())?;
        }
        content.inner.borrow_mut().scoped_rules.push(ScopedRule {
            role,
            action,
            transitive,
        });
        Ok(())
    }

    fn collect_matching_links(&self, ty: &ModelType, transitive: bool, out: &mut Vec<ModelNode>) {
        let children: Vec<ModelNode> = self
            .inner
            .borrow()
            .children
            .iter()
            .map(|(_, child)| child.clone())
            .collect();
        for child in children {
            if child.can_be_viewed_as_writable(ty) {
                out.push(child.clone());
            }
            if transitive {
                if let Ok(content) = child.content_node() {
                    content.collect_matching_links(ty, true, out);
                }
            }
        }
    }

    /// Apply a whole rule bundle to this node
    pub fn apply_rules_to_self(&self, rules: &dyn RuleSource) -> ModelResult<()> {
        for (role, action) in rules.rules() {
            self.apply_to_self(role, action)?;
        }
        Ok(())
    }

    /// Apply a whole rule bundle to a linked child
    pub fn apply_rules_to_link(&self, name: &str, rules: &dyn RuleSource) -> ModelResult<()> {
        match self.get_link(name)? {
            Some(child) => child.apply_rules_to_self(rules),
            None => Err(ModelError::LinkNotFound {
                path: self.path(),
                name: name.to_string(),
            }),
        }
    }

    // ---- link queries -----------------------------------------------

    /// The named child, if any. Hidden children remain addressable by
    /// name.
    pub fn get_link(&self, name: &str) -> ModelResult<Option<ModelNode>> {
        Ok(self.content_node()?.child_by_name(name))
    }

    /// Children declaring read-view support for `ty`, in insertion
    /// order, hidden nodes excluded. The capability check is minimally
    /// lazy: it never realizes a candidate.
    pub fn get_links(&self, ty: &ModelType) -> ModelResult<Vec<ModelNode>> {
        let content = self.content_node()?;
        let children: Vec<ModelNode> = content
            .inner
            .borrow()
            .children
            .iter()
            .map(|(_, child)| child.clone())
            .collect();
        Ok(children
            .into_iter()
            .filter(|child| !child.is_hidden() && child.can_be_viewed_as_readonly(ty))
            .collect())
    }

    pub fn get_link_names(&self, ty: &ModelType) -> ModelResult<Vec<String>> {
        let links = self.get_links(ty)?;
        Ok(links
            .iter()
            .filter_map(|child| child.path().name().map(str::to_string))
            .collect())
    }

    pub fn link_count(&self, ty: &ModelType) -> ModelResult<usize> {
        Ok(self.get_links(ty)?.len())
    }

    pub fn has_link(&self, name: &str, ty: &ModelType) -> ModelResult<bool> {
        Ok(self
            .get_link(name)?
            .is_some_and(|child| !child.is_hidden() && child.can_be_viewed_as_readonly(ty)))
    }

    // ---- views ------------------------------------------------------

    /// Pure capability query against the node's projection chain
    pub fn can_be_viewed_as_readonly(&self, ty: &ModelType) -> bool {
        match self.effective_projection() {
            Ok((_, chain)) => chain.can_be_viewed_as_readonly(ty),
            Err(_) => false,
        }
    }

    /// Pure capability query against the node's projection chain
    pub fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool {
        match self.effective_projection() {
            Ok((_, chain)) => chain.can_be_viewed_as_writable(ty),
            Err(_) => false,
        }
    }

    /// A read-only view of this node as `ty`, lazily realizing the
    /// node far enough for default values to be applied
    pub fn as_read_only(
        &self,
        ty: &ModelType,
        descriptor: &ModelRuleDescriptor,
    ) -> ModelResult<ModelView> {
        self.ensure_usable()?;
        let (content, chain) = self.effective_projection()?;
        chain
            .as_readonly(ty, &content, descriptor)
            .ok_or_else(|| ModelError::NoSuchViewType {
                path: self.path(),
                requested: ty.name().to_string(),
                supported: chain.readable_type_descriptions(&content).join(", "),
            })
    }

    /// A writable view of this node as `ty`. Fails if the node is no
    /// longer inside its mutate-capable window.
    pub fn as_writable(
        &self,
        ty: &ModelType,
        descriptor: &ModelRuleDescriptor,
        implicit_inputs: Vec<ModelView>,
    ) -> ModelResult<ModelView> {
        if !self.is_mutable() {
            return Err(ModelError::NotMutable {
                subject: format!("{} (as {})", self.path(), ty),
            });
        }
        self.ensure_usable()?;
        let (content, chain) = self.effective_projection()?;
        chain
            .as_writable(ty, &content, descriptor, implicit_inputs)
            .ok_or_else(|| ModelError::NoSuchViewType {
                path: self.path(),
                requested: ty.name().to_string(),
                supported: chain.writable_type_descriptions(&content).join(", "),
            })
    }

    /// The chain answering capability and view requests for this node:
    /// its own chain, or the target's when a bare reference declares
    /// none of its own.
    fn effective_projection(&self) -> ModelResult<(ModelNode, ChainingModelProjection)> {
        let own = self.inner.borrow().projection.clone();
        if !self.is_reference() {
            return Ok((self.clone(), own));
        }
        let content = self.content_node()?;
        if own.is_empty() {
            let chain = content.inner.borrow().projection.clone();
            Ok((content, chain))
        } else {
            Ok((content, own))
        }
    }

    // ---- realization ------------------------------------------------

    /// Realize through `Initialized` only: the minimum needed before
    /// returning any view to a caller
    pub fn ensure_usable(&self) -> ModelResult<()> {
        self.transition_to(ModelNodeState::Initialized)
    }

    /// Drive the node, and all its descendants, through every
    /// remaining role. Idempotent.
    pub fn realize(&self) -> ModelResult<()> {
        let content = self.content_node()?;
        content.transition_content(ModelNodeState::Realized)?;
        let children: Vec<ModelNode> = content
            .inner
            .borrow()
            .children
            .iter()
            .map(|(_, child)| child.clone())
            .collect();
        for child in children {
            child.realize()?;
        }
        Ok(())
    }

    /// Advance the node to `target`, executing each intervening role's
    /// rule queue in registration order
    pub fn transition_to(&self, target: ModelNodeState) -> ModelResult<()> {
        self.content_node()?.transition_content(target)
    }

    fn transition_content(&self, target: ModelNodeState) -> ModelResult<()> {
        loop {
            let step = {
                let mut data = self.inner.borrow_mut();
                if let Some(failure) = &data.failure {
                    return Err(failure.clone());
                }
                if data.state >= target {
                    return Ok(());
                }
                if let Some(pending) = data.in_transition {
                    // Re-entry past the boundary currently executing
                    // means a rule transitively required this node
                    // again, at an equal-or-later role.
                    return Err(ModelError::RealizationCycle {
                        path: data.path.clone(),
                        state: pending,
                        descriptor: data.descriptor.to_string(),
                    });
                }
                match data.state.next_role() {
                    Some(role) => {
                        data.in_transition = Some(role.target_state());
                        let mut remaining = Vec::new();
                        let mut actions = Vec::new();
                        for binding in data.rules.drain(..) {
                            if binding.role == role {
                                actions.push(binding.action);
                            } else {
                                remaining.push(binding);
                            }
                        }
                        data.rules = remaining;
                        let initializer = if role == ModelActionRole::Create {
                            data.initializer.take()
                        } else {
                            None
                        };
                        TransitionStep::Rules(role, actions, initializer)
                    }
                    None => TransitionStep::Promote(ModelNodeState::Realized),
                }
            };

            match step {
                TransitionStep::Rules(role, actions, initializer) => {
                    let result = self.execute_role(role, actions, initializer);
                    let mut data = self.inner.borrow_mut();
                    data.in_transition = None;
                    match result {
                        Ok(()) => {
                            debug!(path = %data.path, from = %data.state, to = %role.target_state(), "node transition");
                            data.state = role.target_state();
                        }
                        Err(err) => {
                            data.failure = Some(err.clone());
                            return Err(err);
                        }
                    }
                }
                TransitionStep::Promote(state) => {
                    let mut data = self.inner.borrow_mut();
                    debug!(path = %data.path, to = %state, "node realized");
                    data.state = state;
                }
            }
        }
    }

    fn execute_role(
        &self,
        role: ModelActionRole,
        actions: Vec<ModelAction>,
        initializer: Option<Initializer>,
    ) -> ModelResult<()> {
        if let Some(initializer) = initializer {
            initializer(self)?;
        }
        for action in actions {
            debug!(path = %self.path(), %role, rule = %action.descriptor(), "executing rule");
            let mut view = self.rule_view(action.subject().ty(), action.descriptor())?;
            let result = action.execute(&mut view);
            view.close();
            result?;
        }
        Ok(())
    }

    /// A writable view for internal rule execution. Skips the
    /// mutate-window gate and the usability transition: the node is
    /// mid-transition by construction.
    fn rule_view(&self, ty: &ModelType, descriptor: &ModelRuleDescriptor) -> ModelResult<ModelView> {
        let (content, chain) = self.effective_projection()?;
        chain
            .as_writable(ty, &content, descriptor, Vec::new())
            .ok_or_else(|| ModelError::NoSuchViewType {
                path: self.path(),
                requested: ty.name().to_string(),
                supported: chain.writable_type_descriptions(&content).join(", "),
            })
    }
}

impl fmt::Debug for ModelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.borrow();
        f.debug_struct("ModelNode")
            .field("path", &data.path)
            .field("state", &data.state)
            .field("reference", &matches!(data.kind, NodeKind::Reference { .. }))
            .field("hidden", &data.hidden)
            .field("children", &data.children.len())
            .finish()
    }
}
