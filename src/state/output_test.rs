use std::rc::Rc;

use crate::{
    runtime::{
        container::Container, control_command::ControlCommand, list::ListDefinitions,
        object::OutputItem,
    },
    state::{
        StoryState,
        output::{clean_output_whitespace, tags_of, text_of},
    },
};

fn new_state() -> StoryState {
    let root = Container::builder().build().unwrap();
    StoryState::new(root, Rc::new(ListDefinitions::default()))
}

fn push_all(state: &mut StoryState, items: Vec<OutputItem>) {
    for item in items {
        state.push_to_output_stream(item);
    }
}

#[test]
fn whitespace_is_collapsed_and_trimmed_per_line() {
    assert_eq!(clean_output_whitespace("  a   b \n  c "), "a b\nc");
    assert_eq!(clean_output_whitespace("a\t\tb"), "a b");
    assert_eq!(clean_output_whitespace(""), "");
}

#[test]
fn text_skips_dynamic_tag_content() {
    let stream = vec![
        OutputItem::text("Hello"),
        OutputItem::Command(ControlCommand::BeginTag),
        OutputItem::text("mood"),
        OutputItem::Command(ControlCommand::EndTag),
    ];

    assert_eq!(text_of(&stream), "Hello");
    assert_eq!(tags_of(&stream), vec![String::from("mood")]);
}

#[test]
fn static_tags_are_collected_in_order() {
    let stream = vec![
        OutputItem::Tag("a".into()),
        OutputItem::text("x"),
        OutputItem::Tag("b".into()),
    ];

    assert_eq!(tags_of(&stream), vec![String::from("a"), String::from("b")]);
    assert_eq!(text_of(&stream), "x");
}

#[test]
fn leading_newline_is_dropped() {
    let mut state = new_state();

    state.push_to_output_stream(OutputItem::text("\n"));
    assert!(state.output_stream().is_empty());
}

#[test]
fn repeated_newlines_collapse() {
    let mut state = new_state();
    push_all(
        &mut state,
        vec![OutputItem::text("a"), OutputItem::text("\n"), OutputItem::text("\n")],
    );

    assert_eq!(state.output_stream().len(), 2);
    assert_eq!(state.current_text(), "a\n");
}

#[test]
fn glue_removes_the_preceding_newline() {
    let mut state = new_state();
    push_all(
        &mut state,
        vec![
            OutputItem::text("a"),
            OutputItem::text("\n"),
            OutputItem::Glue,
            OutputItem::text("b"),
        ],
    );

    assert_eq!(state.current_text(), "ab");
    assert!(!state.output_stream_ends_in_newline());
}

#[test]
fn text_with_trailing_newline_is_split() {
    let mut state = new_state();

    state.push_to_output_stream(OutputItem::text("a\n"));
    assert_eq!(state.output_stream().len(), 2);
    assert!(state.output_stream_ends_in_newline());
}

#[test]
fn string_evaluation_is_detected() {
    let mut state = new_state();

    state.push_to_output_stream(OutputItem::Command(ControlCommand::BeginString));
    assert!(state.in_string_evaluation());
}
