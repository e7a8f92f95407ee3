//! Rule machinery
//!
//! External code contributes behavior to the graph only by registering
//! actions keyed by `(subject, role)`. The rule descriptor chain is
//! carried for diagnostics only and never affects behavior.

use std::fmt;
use std::rc::Rc;

use crate::error::ModelResult;
use crate::node::ModelNodeState;
use crate::path::ModelPath;
use crate::types::{ModelElement, ModelType};
use crate::view::ModelView;

/// One ordered phase of rule application.
///
/// Executing all rules queued for a role advances the subject node to
/// the role's target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelActionRole {
    Create,
    Defaults,
    Initialize,
    Mutate,
    Finalize,
}

impl ModelActionRole {
    /// All roles, in execution order
    pub const ALL: [ModelActionRole; 5] = [
        ModelActionRole::Create,
        ModelActionRole::Defaults,
        ModelActionRole::Initialize,
        ModelActionRole::Mutate,
        ModelActionRole::Finalize,
    ];

    /// The node state reached once this role has executed
    pub fn target_state(self) -> ModelNodeState {
        match self {
            ModelActionRole::Create => ModelNodeState::Created,
            ModelActionRole::Defaults => ModelNodeState::DefaultsApplied,
            ModelActionRole::Initialize => ModelNodeState::Initialized,
            ModelActionRole::Mutate => ModelNodeState::Mutated,
            ModelActionRole::Finalize => ModelNodeState::Finalized,
        }
    }
}

impl fmt::Display for ModelActionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Human-readable chain of rule names, e.g. `binaries > create(main)`.
///
/// Used exclusively for error messages and debug dumps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRuleDescriptor {
    segments: Vec<String>,
}

impl ModelRuleDescriptor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            segments: vec![label.into()],
        }
    }

    /// A descriptor with `label` appended to this chain
    pub fn nested(&self, label: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(label.into());
        Self { segments }
    }
}

impl fmt::Display for ModelRuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(" > "))
    }
}

/// Names the subject of a rule: a type, optionally pinned to a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReference {
    path: Option<ModelPath>,
    ty: ModelType,
}

impl ModelReference {
    /// A reference to any node viewable as `ty`
    pub fn of_type(ty: ModelType) -> Self {
        Self { path: None, ty }
    }

    /// A reference to the node at `path`, viewed as `ty`
    pub fn of_path(path: ModelPath, ty: ModelType) -> Self {
        Self {
            path: Some(path),
            ty,
        }
    }

    pub fn path(&self) -> Option<&ModelPath> {
        self.path.as_ref()
    }

    pub fn ty(&self) -> &ModelType {
        &self.ty
    }
}

type ActionFn = Rc<dyn Fn(&mut ModelView) -> ModelResult<()>>;

/// A configuration action registered against a node for one role.
///
/// The closure receives a writable view of the subject. Actions are
/// cheap to clone so one registration can apply to many children.
#[derive(Clone)]
pub struct ModelAction {
    subject: ModelReference,
    descriptor: ModelRuleDescriptor,
    action: ActionFn,
}

impl ModelAction {
    pub fn new(
        subject: ModelReference,
        descriptor: ModelRuleDescriptor,
        action: impl Fn(&mut ModelView) -> ModelResult<()> + 'static,
    ) -> Self {
        Self {
            subject,
            descriptor,
            action: Rc::new(action),
        }
    }

    /// An action over a typed subject, taking no rule inputs
    pub fn no_inputs<T: ModelElement>(
        subject: ModelReference,
        descriptor: ModelRuleDescriptor,
        config: impl Fn(&mut T) + 'static,
    ) -> Self {
        Self {
            subject,
            descriptor,
            action: Rc::new(move |view: &mut ModelView| view.with_mut(|value: &mut T| config(value))),
        }
    }

    pub fn subject(&self) -> &ModelReference {
        &self.subject
    }

    pub fn descriptor(&self) -> &ModelRuleDescriptor {
        &self.descriptor
    }

    pub(crate) fn execute(&self, view: &mut ModelView) -> ModelResult<()> {
        (self.action)(view)
    }
}

impl fmt::Debug for ModelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAction")
            .field("subject", &self.subject)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// A named bundle of rules applied to a node as a set
pub trait RuleSource {
    /// Name of the bundle, appended to descriptor chains
    fn name(&self) -> &str;

    /// The declared rules, in registration order
    fn rules(&self) -> Vec<(ModelActionRole, ModelAction)>;
}
