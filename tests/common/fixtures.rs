//! Reusable element types and graph builders.

use std::any::Any;
use std::rc::Rc;

use modelgraph::{
    ChildCreator, ModelCreator, ModelElement, ModelError, ModelNode, ModelResult,
    ModelRuleDescriptor, ModelType, ModelViewState, NamedEntityInstantiator, NodeBackedModelMap,
    UnmanagedModelProjection,
};

/// Marker base for anything buildable
pub struct ComponentSpec;

/// Base type for binaries produced from components
pub struct BinarySpec;

/// An executable binary, with a tool-chain flag and an ordered log of
/// the configuration that touched it
#[derive(Default)]
pub struct ExecutableBinarySpec {
    pub name: String,
    pub optimized: bool,
    pub log: Vec<String>,
}

/// A library binary
#[derive(Default)]
pub struct LibraryBinarySpec {
    pub name: String,
    pub shared: bool,
}

impl ModelElement for ComponentSpec {
    fn type_name() -> &'static str {
        "ComponentSpec"
    }
}

impl ModelElement for BinarySpec {
    fn type_name() -> &'static str {
        "BinarySpec"
    }
}

impl ModelElement for ExecutableBinarySpec {
    fn type_name() -> &'static str {
        "ExecutableBinarySpec"
    }

    fn supertypes() -> Vec<ModelType> {
        vec![ModelType::of::<BinarySpec>()]
    }
}

impl ModelElement for LibraryBinarySpec {
    fn type_name() -> &'static str {
        "LibraryBinarySpec"
    }

    fn supertypes() -> Vec<ModelType> {
        vec![ModelType::of::<BinarySpec>()]
    }
}

/// Instantiator handing out executable and library binaries by name
pub struct BinaryInstantiator {
    base: ModelType,
}

impl BinaryInstantiator {
    pub fn new() -> Self {
        Self {
            base: ModelType::of::<BinarySpec>(),
        }
    }
}

impl Default for BinaryInstantiator {
    fn default() -> Self {
        Self::new()
    }
}

impl NamedEntityInstantiator for BinaryInstantiator {
    fn base_type(&self) -> &ModelType {
        &self.base
    }

    fn supports(&self, ty: &ModelType) -> bool {
        self.base.is_assignable_from(ty)
    }

    fn create(&self, name: &str, ty: &ModelType) -> ModelResult<(ModelType, Box<dyn Any>)> {
        if ty.is::<ExecutableBinarySpec>() {
            return Ok((
                ty.clone(),
                Box::new(ExecutableBinarySpec {
                    name: name.to_string(),
                    ..Default::default()
                }),
            ));
        }
        if ty.is::<LibraryBinarySpec>() {
            return Ok((
                ty.clone(),
                Box::new(LibraryBinarySpec {
                    name: name.to_string(),
                    ..Default::default()
                }),
            ));
        }
        Err(ModelError::NoFactoryForType {
            requested: ty.name().to_string(),
            supported: "ExecutableBinarySpec, LibraryBinarySpec".to_string(),
        })
    }
}

/// A root with a `binaries` container node. The container's own data
/// is the instantiator, so no initializer may overwrite it later.
pub fn graph_with_binaries() -> (ModelNode, ModelNode) {
    let root = ModelNode::root();
    let instantiator_type = ModelType::of::<Rc<dyn NamedEntityInstantiator>>();
    let binaries = root
        .add_link(
            ModelCreator::of(
                root.path().child("binaries"),
                ModelRuleDescriptor::new("binaries container"),
            )
            .with_projection(Rc::new(UnmanagedModelProjection::of_type(instantiator_type))),
        )
        .expect("fresh root accepts the container link");
    binaries
        .set_private_data::<Rc<dyn NamedEntityInstantiator>>(Rc::new(BinaryInstantiator::new()))
        .expect("container node stores its instantiator");
    (root, binaries)
}

/// A mutable collection over the `binaries` node
pub fn binaries_map(binaries: &ModelNode) -> NodeBackedModelMap {
    NodeBackedModelMap::of::<BinarySpec>(
        binaries.clone(),
        ModelRuleDescriptor::new("binaries rule"),
        ModelViewState::mutable(),
        ChildCreator::ParentInstantiator,
    )
}
