//! Scenario: Configuring a binary collection
//!
//! Journey: A build author declares binaries by name, layers defaults,
//! per-element tweaks and finalization over them, then the build
//! demands the realized values.
//!
//! Success Criteria:
//! - Nothing runs until a value is demanded
//! - Configuration lands in role order regardless of registration order
//! - Late rule registration fails loudly instead of being dropped

use std::rc::Rc;

use modelgraph::{ModelActionRole, ModelError, ModelNodeState, ModelRuleDescriptor, ModelType};

use crate::common::*;

/// SCENARIO: Declare, configure in every role, then realize.
#[test]
fn scenario_binaries_configured_in_role_order() {
    let (_root, binaries) = graph_with_binaries();
    let map = binaries_map(&binaries);

    // Registration order deliberately scrambles role order.
    map.after_each::<ExecutableBinarySpec>(|binary| binary.log.push("finalize".into()))
        .unwrap();
    map.create_with::<ExecutableBinarySpec>("main", |binary| {
        binary.log.push("initialize".into())
    })
    .unwrap();
    map.before_each::<ExecutableBinarySpec>(|binary| binary.log.push("defaults".into()))
        .unwrap();
    map.all::<ExecutableBinarySpec>(|binary| binary.log.push("mutate".into()))
        .unwrap();
    map.named::<ExecutableBinarySpec>("main", |binary| binary.optimized = true)
        .unwrap();

    // Nothing has been demanded yet, so nothing has run.
    let main = binaries.get_link("main").unwrap().unwrap();
    assert_eq!(main.state(), ModelNodeState::Registered);

    main.realize().unwrap();

    let view = map.get("main").unwrap().unwrap();
    let (log, optimized) = view
        .with_ref(|binary: &ExecutableBinarySpec| (binary.log.clone(), binary.optimized))
        .unwrap();
    assert_eq!(log, vec!["defaults", "initialize", "mutate", "finalize"]);
    assert!(optimized);
}

/// SCENARIO: A mixed collection filtered by subtype.
#[test]
fn scenario_mixed_collection_filtered_by_subtype() {
    let (_root, binaries) = graph_with_binaries();
    let map = binaries_map(&binaries);

    map.create::<ExecutableBinarySpec>("cli").unwrap();
    map.create::<LibraryBinarySpec>("core").unwrap();
    map.create::<ExecutableBinarySpec>("daemon").unwrap();

    assert_eq!(map.size().unwrap(), 3);
    assert_eq!(map.key_set().unwrap(), vec!["cli", "core", "daemon"]);

    let executables = map.with_type(ModelType::of::<ExecutableBinarySpec>());
    assert_eq!(executables.key_set().unwrap(), vec!["cli", "daemon"]);
    assert!(!executables.contains_key("core").unwrap());

    let libraries = map.with_type(ModelType::of::<LibraryBinarySpec>());
    libraries
        .all::<LibraryBinarySpec>(|library| library.shared = true)
        .unwrap();

    binaries.realize().unwrap();

    let shared = map
        .get("core")
        .unwrap()
        .unwrap()
        .with_ref(|library: &LibraryBinarySpec| library.shared)
        .unwrap();
    assert!(shared);

    // The executable subtype rule pool never touched the library and
    // vice versa.
    let cli_log = map
        .get("cli")
        .unwrap()
        .unwrap()
        .with_ref(|binary: &ExecutableBinarySpec| binary.log.clone())
        .unwrap();
    assert!(cli_log.is_empty());
}

/// SCENARIO: Registering a rule after its window has closed fails.
#[test]
fn scenario_late_rule_registration_is_rejected() {
    let (_root, binaries) = graph_with_binaries();
    let map = binaries_map(&binaries);

    map.create::<ExecutableBinarySpec>("main").unwrap();
    let main = binaries.get_link("main").unwrap().unwrap();
    main.realize().unwrap();

    let err = map
        .named::<ExecutableBinarySpec>("main", |binary| binary.optimized = true)
        .unwrap_err();
    assert!(matches!(
        err,
        ModelError::RuleOrderingViolation {
            role: ModelActionRole::Mutate,
            state: ModelNodeState::Realized,
            ..
        }
    ));
}

/// SCENARIO: A rule that fails parks the node with the same error
/// for every later access.
#[test]
fn scenario_failed_rule_parks_the_element() {
    let (_root, binaries) = graph_with_binaries();
    let map = binaries_map(&binaries);

    let descriptor = ModelRuleDescriptor::new("broken rule");
    map.create::<ExecutableBinarySpec>("main").unwrap();
    let main = binaries.get_link("main").unwrap().unwrap();
    main.apply_to_self(
        ModelActionRole::Mutate,
        modelgraph::ModelAction::new(
            modelgraph::ModelReference::of_type(ModelType::of::<ExecutableBinarySpec>()),
            descriptor,
            |_view| {
                Err(ModelError::Unsupported {
                    operation: "configure".to_string(),
                    reason: "tool chain missing".to_string(),
                })
            },
        ),
    )
    .unwrap();

    let first = main.realize().unwrap_err();
    let second = main.realize().unwrap_err();
    assert_eq!(first, second);
    insta::assert_snapshot!(
        first.to_string(),
        @"configure is not supported: tool chain missing"
    );
}

/// SCENARIO: Asking a node for a view type it never declared lists
/// what it does support.
#[test]
fn scenario_unknown_view_type_lists_supported_types() {
    let (_root, binaries) = graph_with_binaries();
    let map = binaries_map(&binaries);
    map.create::<LibraryBinarySpec>("core").unwrap();

    let core = binaries.get_link("core").unwrap().unwrap();
    let err = core
        .as_read_only(
            &ModelType::of::<ExecutableBinarySpec>(),
            &ModelRuleDescriptor::new("read core"),
        )
        .unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @"type 'ExecutableBinarySpec' is not supported by 'binaries.core', supported types: LibraryBinarySpec"
    );
}

/// SCENARIO: Removing a declared element before realization.
#[test]
fn scenario_remove_before_realization() {
    let (_root, binaries) = graph_with_binaries();
    let map = binaries_map(&binaries);

    map.create::<ExecutableBinarySpec>("scratch").unwrap();
    map.create::<ExecutableBinarySpec>("main").unwrap();
    binaries.remove_link("scratch").unwrap();

    assert_eq!(map.key_set().unwrap(), vec!["main"]);
    assert!(map.get("scratch").unwrap().is_none());

    let err = binaries.remove_link("scratch").unwrap_err();
    assert!(matches!(err, ModelError::LinkNotFound { .. }));
}

/// SCENARIO: The instantiator itself lives as node data, so the
/// collection works against any container that carries one.
#[test]
fn scenario_instantiator_travels_with_the_node() {
    let (_root, binaries) = graph_with_binaries();
    let instantiator: Rc<dyn modelgraph::NamedEntityInstantiator> =
        Rc::new(BinaryInstantiator::new());
    // Replacing the stored instantiator is an ordinary data write.
    binaries
        .set_private_data::<Rc<dyn modelgraph::NamedEntityInstantiator>>(instantiator)
        .unwrap();

    let map = binaries_map(&binaries);
    map.create::<ExecutableBinarySpec>("main").unwrap();
    let name = map
        .get("main")
        .unwrap()
        .unwrap()
        .with_ref(|binary: &ExecutableBinarySpec| binary.name.clone())
        .unwrap();
    assert_eq!(name, "main");
}
