mod common;

use std::{cell::RefCell, rc::Rc};

use common::{discover_fixtures, fixture, fixtures_root, play_transcript, scripted_choices};
use inkvm::{FunctionResult, Story, Value};

#[test]
fn fixtures_play_their_transcripts() {
    let fixtures = discover_fixtures(&fixtures_root());
    assert!(!fixtures.is_empty(), "no fixtures found");

    let mut failures = Vec::new();
    for fixture in fixtures {
        let mut story = Story::from_json(&fixture.source)
            .unwrap_or_else(|e| panic!("failed to load `{}`: {e}", fixture.name));
        let choices = scripted_choices(&fixture.transcript);
        match play_transcript(&mut story, &choices) {
            Ok(transcript) if transcript == fixture.transcript => {}
            Ok(transcript) => failures.push(format!(
                "{}: expected\n{}\ngot\n{}",
                fixture.name, fixture.transcript, transcript
            )),
            Err(e) => failures.push(format!("{}: {e}", fixture.name)),
        }
    }
    assert!(failures.is_empty(), "{}", failures.join("\n\n"));
}

#[test]
fn saved_story_resumes_where_it_stopped() {
    let fixture = fixture("choices");
    let mut story = Story::from_json(&fixture.source).unwrap();
    let before = play_transcript(&mut story, &[]).unwrap();
    let save = story.save_state().unwrap();

    let mut resumed = Story::from_json(&fixture.source).unwrap();
    resumed.load_state(&save).unwrap();
    let after = play_transcript(&mut resumed, &[2]).unwrap();

    assert_eq!(before, "Hello\n\n1: Choice A\n2: Choice B\n");
    assert_eq!(after, "\n1: Choice A\n2: Choice B\n?> 2\nYou chose B.\nEnd\n");
}

#[test]
fn reset_state_starts_over() {
    let fixture = fixture("globals");
    let mut story = Story::from_json(&fixture.source).unwrap();
    story.continue_maximally().unwrap();
    assert_eq!(story.variable("x"), Some(Value::Int(6)));

    story.reset_state().unwrap();
    assert_eq!(story.variable("x"), Some(Value::Int(5)));
    assert_eq!(story.continue_maximally().unwrap(), "5\n6\n");
}

#[test]
fn observers_see_changes_after_each_line() {
    let fixture = fixture("globals");
    let mut story = Story::from_json(&fixture.source).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    story
        .observe_variable("x", move |name, value| {
            sink.borrow_mut().push(format!("{name}={value}"));
        })
        .unwrap();

    assert_eq!(story.advance().unwrap(), "5\n");
    assert!(seen.borrow().is_empty());
    assert_eq!(story.advance().unwrap(), "6\n");
    assert_eq!(*seen.borrow(), vec![String::from("x=6")]);

    assert!(story.observe_variable("missing", |_, _| {}).is_err());
}

#[test]
fn host_can_call_story_functions() {
    let fixture = fixture("function");
    let mut story = Story::from_json(&fixture.source).unwrap();

    let result = story.evaluate_function("double", &[Value::Int(21)]).unwrap();
    assert_eq!(
        result,
        FunctionResult {
            value: Some(Value::Int(42)),
            text: String::new(),
        }
    );
    assert_eq!(story.advance().unwrap(), "6\n");
}

#[test]
fn choose_path_string_jumps_to_a_knot() {
    let fixture = fixture("choices");
    let mut story = Story::from_json(&fixture.source).unwrap();

    story.choose_path_string("g-0", &[]).unwrap();
    assert_eq!(story.continue_maximally().unwrap(), "End\n");
    assert!(story.current_choices().is_empty());
}
