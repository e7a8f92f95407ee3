//! Property tests for model path handling.

use proptest::prelude::*;

use modelgraph::ModelPath;

fn segment() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9]{0,7}").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 96,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: A path built segment by segment parses back from its
    /// display form, and its parent chain unwinds to the root.
    #[test]
    fn property_display_parse_round_trip(
        segments in proptest::collection::vec(segment(), 1..6),
    ) {
        let path = segments
            .iter()
            .fold(ModelPath::root(), |path, name| path.child(name));

        prop_assert_eq!(ModelPath::parse(&path.to_string()), path.clone());
        prop_assert_eq!(path.depth(), segments.len());
        prop_assert_eq!(path.name(), segments.last().map(String::as_str));

        let mut current = path;
        for _ in 0..segments.len() {
            current = current.parent().unwrap();
        }
        prop_assert!(current.is_root());
        prop_assert_eq!(current.parent(), None);
    }

    /// PROPERTY: Every ancestor of a path is a prefix of it, and no
    /// sibling with a different final segment is.
    #[test]
    fn property_ancestors_are_prefixes(
        segments in proptest::collection::vec(segment(), 1..6),
        extra in segment(),
    ) {
        let path = segments
            .iter()
            .fold(ModelPath::root(), |path, name| path.child(name));

        let mut ancestor = Some(path.clone());
        while let Some(current) = ancestor {
            prop_assert!(current.is_prefix_of(&path));
            ancestor = current.parent();
        }

        let sibling = path
            .parent()
            .unwrap()
            .child(&format!("{extra}x"));
        prop_assert!(!sibling.is_prefix_of(&path) || sibling == path);
    }
}
