use std::{cell::Cell, rc::Rc};

use crate::runtime::{
    error::StoryError,
    frame::PushPopType,
    story::{FunctionResult, Story},
    value::Value,
};

fn story(root: &str) -> Story {
    Story::from_json(&format!(
        r#"{{"inkVersion":21,"root":{root},"listDefs":{{}}}}"#
    ))
    .unwrap()
}

const CALLS_ADD: &str =
    r#"["ev",2,3,{"x()":"add","exArgs":2},"out","/ev","\n","done",null]"#;

const CALLS_ADD_WITH_FALLBACK: &str = r#"["ev",2,3,{"x()":"add","exArgs":2},"out","/ev","\n","done",{"add":[{"temp=":"b"},{"temp=":"a"},"ev",{"VAR?":"a"},{"VAR?":"b"},"+","/ev","~ret",null]}]"#;

fn add(args: &[Value]) -> Result<Option<Value>, String> {
    match args {
        [Value::Int(a), Value::Int(b)] => Ok(Some(Value::Int(a + b))),
        _ => Err(format!("bad arguments: {args:?}")),
    }
}

#[test]
fn bound_external_receives_arguments_in_order() {
    let mut story = story(CALLS_ADD);
    story.bind_external_function("add", add, true);

    assert_eq!(story.advance().unwrap(), "5\n");
}

#[test]
fn missing_binding_is_reported_before_running() {
    let mut story = story(CALLS_ADD);

    let err = story.advance().unwrap_err();
    assert!(matches!(err, StoryError::Runtime(_)));
    assert!(err.to_string().contains("missing function binding for external: 'add'"));
}

#[test]
fn fallback_knot_runs_when_unbound() {
    let mut story = story(CALLS_ADD_WITH_FALLBACK);
    story.set_allow_external_function_fallbacks(true);

    assert_eq!(story.advance().unwrap(), "5\n");
}

#[test]
fn binding_takes_priority_over_fallback() {
    let mut story = story(CALLS_ADD_WITH_FALLBACK);
    story.set_allow_external_function_fallbacks(true);
    story.bind_external_function("add", |_: &[Value]| Ok(Some(Value::Int(42))), true);

    assert_eq!(story.advance().unwrap(), "42\n");
}

#[test]
fn external_failure_becomes_story_error() {
    let mut story = story(CALLS_ADD);
    story.bind_external_function("add", |_: &[Value]| Err(String::from("boom")), true);

    let err = story.advance().unwrap_err();
    assert!(err.to_string().contains("boom"));
    assert_eq!(story.current_errors().len(), 1);
}

#[test]
fn unbinding_removes_the_function() {
    let mut story = story(CALLS_ADD);
    story.bind_external_function("add", add, true);

    assert!(story.unbind_external_function("add"));
    assert!(!story.unbind_external_function("add"));
    assert!(story.advance().is_err());
}

#[test]
fn lookahead_unsafe_external_runs_once() {
    let mut story = story(
        r#"["^line one","\n","ev",{"x()":"log"},"pop","/ev","^line two","\n","done",null]"#,
    );
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    story.bind_external_function(
        "log",
        move |_: &[Value]| {
            counter.set(counter.get() + 1);
            Ok(None)
        },
        false,
    );

    assert_eq!(story.advance().unwrap(), "line one\n");
    assert_eq!(calls.get(), 0);
    assert_eq!(story.advance().unwrap(), "line two\n");
    assert_eq!(calls.get(), 1);
}

#[test]
fn evaluate_function_returns_value_and_text() {
    let mut story = story(
        r#"["done",{"double":[{"temp=":"x"},"^doubling","\n","ev",{"VAR?":"x"},2,"*","/ev","~ret",null]}]"#,
    );

    let result = story.evaluate_function("double", &[Value::Int(4)]).unwrap();
    assert_eq!(
        result,
        FunctionResult {
            value: Some(Value::Int(8)),
            text: String::from("doubling\n"),
        }
    );
    assert!(story.can_continue());
    assert_eq!(story.current_text(), "");
}

#[test]
fn evaluate_function_without_return_value() {
    let mut story = story(r#"["done",{"say":["^hi","\n","ev","void","/ev","~ret",null]}]"#);

    let result = story.evaluate_function("say", &[]).unwrap();
    assert_eq!(result.value, None);
    assert_eq!(result.text, "hi\n");
}

#[test]
fn evaluate_function_rejects_unknown_names() {
    let mut story = story(r#"["done",null]"#);

    let err = story.evaluate_function("missing", &[]).unwrap_err();
    assert!(err.to_string().contains("doesn't exist"));
    assert!(story.evaluate_function("", &[]).is_err());
}

#[test]
fn divert_targets_are_not_valid_arguments() {
    let mut story = story(r#"["done",{"f":["ev","void","/ev","~ret",null]}]"#);

    let target = Value::DivertTarget(crate::runtime::path::Path::parse("f"));
    assert!(story.evaluate_function("f", &[target]).is_err());
}

#[test]
fn function_frame_records_evaluation_stack_height() {
    let mut story = story(r#"["ev",7,{"f()":"f"},"/ev","done",{"f":["^x","done",null]}]"#);

    assert_eq!(story.advance().unwrap(), "x");
    let call_stack = story.state().call_stack();
    assert_eq!(call_stack.depth(), 2);
    assert_eq!(call_stack.current_element().push_type, PushPopType::Function);
    assert_eq!(call_stack.current_element().evaluation_stack_height_when_pushed, 1);
}

#[test]
fn tunnel_frame_records_evaluation_stack_height() {
    let mut story = story(r#"["ev",1,2,"/ev",{"->t->":"t"},"done",{"t":["^in","done",null]}]"#);

    assert_eq!(story.advance().unwrap(), "in");
    let frame = story.state().call_stack().current_element();
    assert_eq!(frame.push_type, PushPopType::Tunnel);
    assert_eq!(frame.evaluation_stack_height_when_pushed, 2);
}

#[test]
fn fallback_frame_records_evaluation_stack_height() {
    let mut story = story(
        r#"["ev",9,{"x()":"peek"},"/ev","done",{"peek":["^fallback","done",null]}]"#,
    );
    story.set_allow_external_function_fallbacks(true);

    assert_eq!(story.advance().unwrap(), "fallback");
    let frame = story.state().call_stack().current_element();
    assert_eq!(frame.push_type, PushPopType::Function);
    assert_eq!(frame.evaluation_stack_height_when_pushed, 1);
}

#[test]
fn failed_evaluation_leaves_the_main_flow_running() {
    let mut story = story(
        r#"["^one","\n","^two","\n","done",{"bad":["ev",3,"readc","/ev","~ret",null]}]"#,
    );
    assert_eq!(story.advance().unwrap(), "one\n");

    let err = story.evaluate_function("bad", &[]).unwrap_err();
    assert!(matches!(err.root_cause(), StoryError::Type(_)));

    assert!(story.current_errors().is_empty());
    assert!(story.state().evaluation_stack().is_empty());
    assert_eq!(story.state().call_stack().depth(), 1);
    assert_eq!(story.current_text(), "one\n");
    assert!(story.can_continue());
    assert_eq!(story.advance().unwrap(), "two\n");
}

#[test]
fn evaluated_function_counts_as_a_visit() {
    let mut story = story(r##"["done",{"f":["ev",1,"/ev","~ret",{"#f":1}]}]"##);

    assert_eq!(story.visit_count_at_path("f").unwrap(), 0);
    let result = story.evaluate_function("f", &[]).unwrap();
    assert_eq!(result.value, Some(Value::Int(1)));
    assert_eq!(story.visit_count_at_path("f").unwrap(), 1);

    story.evaluate_function("f", &[]).unwrap();
    assert_eq!(story.visit_count_at_path("f").unwrap(), 2);
}
