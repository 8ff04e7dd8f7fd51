use crate::runtime::path::{Component, Path};

#[test]
fn parses_absolute_paths() {
    let path = Path::parse("knot.stitch.3");

    assert!(!path.is_relative());
    assert_eq!(
        path.components(),
        &[
            Component::name("knot"),
            Component::name("stitch"),
            Component::Index(3),
        ]
    );
    assert_eq!(path.to_string(), "knot.stitch.3");
}

#[test]
fn parses_relative_paths() {
    let path = Path::parse(".^.^.c-0");

    assert!(path.is_relative());
    assert_eq!(
        path.components(),
        &[Component::Parent, Component::Parent, Component::name("c-0")]
    );
    assert_eq!(path.to_string(), ".^.^.c-0");
}

#[test]
fn empty_string_is_the_root() {
    let path = Path::parse("");
    assert!(path.is_empty());
    assert!(!path.is_relative());
}

#[test]
fn tail_drops_the_head() {
    let path = Path::parse("a.b.c");
    assert_eq!(path.tail(), Path::parse("b.c"));
    assert_eq!(Path::parse("a").tail(), Path::this());
}

#[test]
fn appending_relative_path_consumes_parents() {
    let origin = Path::parse("knot.5");

    let joined = origin.by_appending_path(&Path::parse(".^.c-0"));
    assert_eq!(joined, Path::parse("knot.c-0"));

    let joined = origin.by_appending_path(&Path::parse(".^.^.other"));
    assert_eq!(joined, Path::parse("other"));
}

#[test]
fn relative_to_shares_leading_components() {
    let own = Path::parse("knot.stitch.4");
    let target = Path::parse("knot.stitch.c-1");

    assert_eq!(own.relative_to(&target).to_string(), ".^.c-1");
    assert_eq!(Path::parse("a.1").relative_to(&Path::parse("b.2")), Path::parse("b.2"));
}

#[test]
fn compact_string_picks_the_shorter_form() {
    let own = Path::parse("knot.stitch.4");

    assert_eq!(own.compact_string(&Path::parse("knot.stitch.c-1")), ".^.c-1");
    assert_eq!(own.compact_string(&Path::parse("end")), "end");
    assert_eq!(own.compact_string(&Path::parse(".^.c-1")), ".^.c-1");
}

#[test]
fn named_component_detection() {
    assert!(Path::parse("knot.0").contains_named_component());
    assert!(!Path::parse("0.1").contains_named_component());
    assert!(!Path::parse(".^.^").contains_named_component());
}
