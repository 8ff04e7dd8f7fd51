use std::rc::Rc;

use crate::runtime::{
    call_stack::CallStack,
    container::Container,
    error::StoryError,
    frame::PushPopType,
    object::Content,
    value::Value,
};

fn new_call_stack() -> CallStack {
    let root: Rc<Container> = Container::builder()
        .push(Content::text("hello"))
        .build()
        .unwrap();
    CallStack::new(&root)
}

#[test]
fn starts_with_a_single_root_frame() {
    let call_stack = new_call_stack();

    assert_eq!(call_stack.depth(), 1);
    assert_eq!(call_stack.threads().len(), 1);
    assert!(!call_stack.can_pop());
    assert!(!call_stack.can_pop_thread());
}

#[test]
fn push_and_pop_frames_by_type() {
    let mut call_stack = new_call_stack();

    call_stack.push(PushPopType::Function, 2, 5);
    assert_eq!(call_stack.depth(), 2);
    assert_eq!(call_stack.current_element().evaluation_stack_height_when_pushed, 2);
    assert_eq!(call_stack.current_element().function_start_in_output_stream, 5);
    assert!(call_stack.can_pop_type(PushPopType::Function));
    assert!(!call_stack.can_pop_type(PushPopType::Tunnel));

    let err = call_stack.pop(Some(PushPopType::Tunnel)).unwrap_err();
    assert!(matches!(err, StoryError::StackDiscipline(_)));

    let frame = call_stack.pop(Some(PushPopType::Function)).unwrap();
    assert_eq!(frame.push_type, PushPopType::Function);
    assert!(call_stack.pop(None).is_err());
}

#[test]
fn temporaries_live_in_their_frame() {
    let mut call_stack = new_call_stack();
    call_stack
        .set_temporary_variable("x", Value::Int(1), true, -1)
        .unwrap();

    call_stack.push(PushPopType::Function, 0, 0);
    call_stack
        .set_temporary_variable("x", Value::Int(2), true, -1)
        .unwrap();

    assert_eq!(call_stack.temporary_variable("x", -1), Some(&Value::Int(2)));
    assert_eq!(call_stack.temporary_variable("x", 1), Some(&Value::Int(1)));
    assert_eq!(call_stack.context_for_variable_named("x"), 2);
    assert_eq!(call_stack.context_for_variable_named("y"), 0);

    call_stack.pop(None).unwrap();
    assert_eq!(call_stack.temporary_variable("x", -1), Some(&Value::Int(1)));
}

#[test]
fn assigning_an_undeclared_temporary_fails() {
    let mut call_stack = new_call_stack();

    let err = call_stack
        .set_temporary_variable("missing", Value::Int(1), false, -1)
        .unwrap_err();
    assert!(err.to_string().contains("could not find temporary variable"));
}

#[test]
fn threads_fork_with_fresh_indices() {
    let mut call_stack = new_call_stack();

    let forked = call_stack.fork_thread();
    assert_eq!(forked.thread_index, 1);
    assert_eq!(call_stack.threads().len(), 1);

    call_stack.push_thread();
    assert_eq!(call_stack.current_thread().thread_index, 2);
    assert!(call_stack.can_pop_thread());
    assert!(call_stack.set_current_thread(forked.clone()).is_err());

    call_stack.pop_thread().unwrap();
    assert!(call_stack.pop_thread().is_err());
    call_stack.set_current_thread(forked).unwrap();
    assert_eq!(call_stack.current_thread().thread_index, 1);
}

#[test]
fn reset_keeps_the_thread_counter() {
    let mut call_stack = new_call_stack();
    call_stack.push_thread();
    call_stack.push(PushPopType::Tunnel, 0, 0);

    call_stack.reset();
    assert_eq!(call_stack.threads().len(), 1);
    assert_eq!(call_stack.depth(), 1);
    assert_eq!(call_stack.thread_counter(), 1);
}

#[test]
fn trace_lists_every_thread() {
    let mut call_stack = new_call_stack();
    call_stack.push_thread();
    call_stack.push(PushPopType::Function, 0, 0);

    insta::assert_snapshot!(call_stack.call_stack_trace().trim_end(), @r"
    === THREAD 1/2 ===
      [TUNNEL] <SOMEWHERE IN 0>
    === THREAD 2/2 (current) ===
      [TUNNEL] <SOMEWHERE IN 0>
      [FUNCTION] <SOMEWHERE IN 0>
    ");
}
