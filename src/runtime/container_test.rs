use std::rc::Rc;

use crate::runtime::{
    container::{Container, ContentRef, CountFlags},
    control_command::ControlCommand,
    error::StoryError,
    object::Content,
    path::Path,
};

// root: [ "a", [ "b", "c" ], done ] with a named-only "knot": [ "k" ]
fn sample_tree() -> Rc<Container> {
    let inner = Container::builder()
        .push(Content::text("b"))
        .push(Content::text("c"))
        .build()
        .unwrap();
    let knot = Container::builder()
        .name("knot")
        .flags(CountFlags::from_bits(CountFlags::VISITS | CountFlags::COUNT_START_ONLY))
        .push(Content::text("k"))
        .build()
        .unwrap();
    Container::builder()
        .push(Content::text("a"))
        .push(Content::Container(inner))
        .push(Content::Command(ControlCommand::Done))
        .named(knot)
        .build()
        .unwrap()
}

#[test]
fn children_know_their_paths() {
    let root = sample_tree();

    let inner = root.child(1).unwrap();
    let inner = inner.as_container().unwrap();
    assert_eq!(inner.path().to_string(), "1");
    assert!(Rc::ptr_eq(&inner.parent().unwrap(), &root));

    let knot = root.named_content("knot").unwrap();
    assert_eq!(knot.path().to_string(), "knot");
    assert!(Rc::ptr_eq(&knot.root(), &root));
    assert_eq!(root.index_of(knot), None);
}

#[test]
fn exact_lookup_of_a_leaf() {
    let root = sample_tree();

    let result = root.content_at_path(&Path::parse("1.1"), 0, 2);
    assert!(!result.approximate);
    assert_eq!(result.obj.path().to_string(), "1.1");
    assert!(matches!(result.obj, ContentRef::Item { index: 1, .. }));
}

#[test]
fn missing_component_gives_approximate_result() {
    let root = sample_tree();

    let result = root.content_at_path(&Path::parse("knot.missing"), 0, 2);
    assert!(result.approximate);
    assert_eq!(result.obj.path().to_string(), "knot");
    assert!(result.correct_obj().is_none());
}

#[test]
fn walking_through_a_leaf_is_approximate() {
    let root = sample_tree();

    let result = root.content_at_path(&Path::parse("0.1"), 0, 2);
    assert!(result.approximate);
    assert!(result.container().is_some());
}

#[test]
fn relative_paths_resolve_from_the_container() {
    let root = sample_tree();
    let inner = root.child(1).unwrap().as_container().unwrap().clone();

    let result = inner.resolve_path(&Path::parse(".^.knot"));
    assert!(!result.approximate);
    assert_eq!(result.container().unwrap().name(), Some("knot"));

    let absolute = inner.resolve_path(&Path::parse("knot.0"));
    assert_eq!(absolute.obj.path().to_string(), "knot.0");
}

#[test]
fn count_flags_drop_a_lone_start_only_bit() {
    assert_eq!(CountFlags::from_bits(CountFlags::COUNT_START_ONLY).bits(), 0);
    assert_eq!(CountFlags::from_bits(5).bits(), 5);

    let knot = sample_tree().named_content("knot").unwrap().clone();
    assert!(knot.visits_should_be_counted());
    assert!(!knot.turn_index_should_be_counted());
    assert!(knot.counting_at_start_only());
}

#[test]
fn duplicate_names_are_rejected() {
    let first = Container::builder().name("x").build().unwrap();
    let second = Container::builder().name("x").build().unwrap();

    let err = Container::builder().named(first).named(second).build().unwrap_err();
    assert!(matches!(err, StoryError::Format(_)));
}

#[test]
fn named_only_content_needs_a_name() {
    let unnamed = Container::builder().build().unwrap();

    assert!(Container::builder().named(unnamed).build().is_err());
}

// root: [ "a", [ "b", g-0: [ "c" ] ], done ] with named-only
// knot: [ "k", [ "l" ] ] holding named-only stitch: [ "s", [ "t" ] ]
fn deep_tree() -> Rc<Container> {
    let gather = Container::builder()
        .name("g-0")
        .push(Content::text("c"))
        .build()
        .unwrap();
    let inner = Container::builder()
        .push(Content::text("b"))
        .push(Content::Container(gather))
        .build()
        .unwrap();
    let stitch = Container::builder()
        .name("stitch")
        .push(Content::text("s"))
        .push(Content::Container(
            Container::builder().push(Content::text("t")).build().unwrap(),
        ))
        .build()
        .unwrap();
    let knot = Container::builder()
        .name("knot")
        .push(Content::text("k"))
        .push(Content::Container(
            Container::builder().push(Content::text("l")).build().unwrap(),
        ))
        .named(stitch)
        .build()
        .unwrap();
    Container::builder()
        .push(Content::text("a"))
        .push(Content::Container(inner))
        .push(Content::Command(ControlCommand::Done))
        .named(knot)
        .build()
        .unwrap()
}

fn collect_nodes(container: &Rc<Container>, nodes: &mut Vec<ContentRef>) {
    nodes.push(ContentRef::Container(container.clone()));
    for index in 0..container.content().len() {
        match container.child(index) {
            Some(ContentRef::Container(child)) => collect_nodes(&child, nodes),
            Some(item) => nodes.push(item),
            None => {}
        }
    }
    for child in container.named_only() {
        collect_nodes(child, nodes);
    }
}

#[test]
fn every_node_is_found_at_its_own_path() {
    let root = deep_tree();
    let mut nodes = Vec::new();
    collect_nodes(&root, &mut nodes);
    assert_eq!(nodes.len(), 15);

    for node in &nodes {
        let path = node.path();
        let result = root.content_at_path(&path, 0, path.len());
        assert!(!result.approximate, "{path} was approximate");
        assert!(result.obj.same_as(node), "{path} resolved to {:?}", result.obj);
    }

    let paths: Vec<String> = nodes.iter().map(|node| node.path().to_string()).collect();
    assert!(paths.contains(&String::from("1.g-0.0")));
    assert!(paths.contains(&String::from("knot.stitch.1.0")));
}

#[test]
fn relative_paths_lead_back_to_their_targets() {
    let root = deep_tree();
    let mut nodes = Vec::new();
    collect_nodes(&root, &mut nodes);

    for from in &nodes {
        for to in &nodes {
            let own = from.path();
            let target = to.path();
            let relative = own.relative_to(&target);
            if relative.is_relative() {
                assert_eq!(own.by_appending_path(&relative), target, "{own} -> {relative}");
            } else {
                assert_eq!(relative, target);
            }

            if let ContentRef::Container(container) = from {
                let result = container.resolve_path(&relative);
                assert!(!result.approximate, "{own} -> {relative}");
                assert!(result.obj.same_as(to), "{own} -> {relative}");
            }
        }
    }
}
