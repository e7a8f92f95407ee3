//! Scenario: Registering component types with an instance factory
//!
//! Journey: A plugin registers concrete implementations for public
//! component types; the build then asks the factory for instances by
//! the most specific registered type.
//!
//! Success Criteria:
//! - The most specific assignable registration wins
//! - Conflicting registrations fail at registration time, naming the
//!   earlier registrant
//! - Unknown types fail with the list of registered ones

use std::cell::RefCell;
use std::rc::Rc;

use modelgraph::{
    ChildCreator, InstanceFactory, ModelError, ModelRuleDescriptor, ModelType, ModelViewState,
    NodeBackedModelMap,
};

use crate::common::*;

fn binary_factory() -> InstanceFactory {
    let mut factory = InstanceFactory::new("binary types", ModelType::of::<BinarySpec>());
    factory
        .register::<ExecutableBinarySpec>(
            ModelRuleDescriptor::new("NativePlugin#registerExecutable"),
            |_node, name| ExecutableBinarySpec {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    factory
        .register::<LibraryBinarySpec>(
            ModelRuleDescriptor::new("NativePlugin#registerLibrary"),
            |_node, name| LibraryBinarySpec {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    factory
}

fn factory_backed_map(factory: InstanceFactory) -> NodeBackedModelMap {
    let (_root, binaries) = graph_with_binaries();
    NodeBackedModelMap::of::<BinarySpec>(
        binaries,
        ModelRuleDescriptor::new("binaries rule"),
        ModelViewState::mutable(),
        ChildCreator::Factory(Rc::new(RefCell::new(factory))),
    )
}

/// SCENARIO: Registered types are created by their exact registration.
#[test]
fn scenario_factory_creates_most_specific_registration() {
    let map = factory_backed_map(binary_factory());

    map.create::<ExecutableBinarySpec>("cli").unwrap();
    map.create::<LibraryBinarySpec>("core").unwrap();

    let cli = map
        .get("cli")
        .unwrap()
        .unwrap()
        .with_ref(|binary: &ExecutableBinarySpec| binary.name.clone())
        .unwrap();
    assert_eq!(cli, "cli");

    let core = map
        .get("core")
        .unwrap()
        .unwrap()
        .with_ref(|library: &LibraryBinarySpec| library.name.clone())
        .unwrap();
    assert_eq!(core, "core");
}

/// SCENARIO: Registering the same concrete type twice fails at
/// registration time and names the earlier registrant.
#[test]
fn scenario_duplicate_registration_fails_fast() {
    let mut factory = binary_factory();
    let err = factory
        .register::<ExecutableBinarySpec>(
            ModelRuleDescriptor::new("OtherPlugin#registerExecutable"),
            |_node, name| ExecutableBinarySpec {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @"a factory for type 'ExecutableBinarySpec' is already registered by NativePlugin#registerExecutable"
    );
}

/// SCENARIO: Asking for an unregistered type lists what the factory
/// knows about.
#[test]
fn scenario_unregistered_type_lists_known_types() {
    let factory = binary_factory();
    assert!(!factory.supports(&ModelType::of::<ComponentSpec>()));
    assert_eq!(
        factory.supported_type_names(),
        vec!["ExecutableBinarySpec", "LibraryBinarySpec"]
    );
}

/// SCENARIO: A factory refuses registrations outside its base type.
#[test]
fn scenario_registration_outside_base_type_fails() {
    let mut factory = binary_factory();
    let err = factory
        .register::<ComponentSpec>(
            ModelRuleDescriptor::new("BrokenPlugin#registerComponent"),
            |_node, _name| ComponentSpec,
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::IncompatibleType { .. }));
}
