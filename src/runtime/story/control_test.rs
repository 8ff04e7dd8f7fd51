use crate::runtime::{error::StoryError, story::Story};

const COLOURS: &str = r#"{"colours":{"red":1,"green":2,"blue":3}}"#;

fn story(root: &str) -> Story {
    story_with_lists(root, "{}")
}

fn story_with_lists(root: &str, lists: &str) -> Story {
    Story::from_json(&format!(
        r#"{{"inkVersion":21,"root":{root},"listDefs":{lists}}}"#
    ))
    .unwrap()
}

#[test]
fn turns_starts_at_zero() {
    let mut story = story(r#"["ev","turn","out","/ev","\n","done",null]"#);

    assert_eq!(story.advance().unwrap(), "0\n");
}

#[test]
fn turns_since_unvisited_knot_is_minus_one() {
    let mut story = story(
        r##"["ev",{"^->":"knot"},"turns","out","/ev","\n","done",{"knot":["done",{"#f":3}]}]"##,
    );

    assert_eq!(story.advance().unwrap(), "-1\n");
}

#[test]
fn read_count_of_int_is_a_type_error() {
    let mut story = story(r#"["ev",3,"readc","/ev","done",null]"#);

    let err = story.advance().unwrap_err();
    assert!(matches!(err.root_cause(), StoryError::Type(_)));
}

#[test]
fn visit_index_is_zero_based() {
    let mut story = story(r##"[{"->":"k"},{"k":["ev","visit","out","/ev","\n","done",{"#f":1}]}]"##);

    assert_eq!(story.advance().unwrap(), "0\n");
}

#[test]
fn choice_count_sees_generated_choices() {
    let mut story = story(
        r##"["ev","str","^A","/str","/ev",{"*":".^.c-0","flg":4},"ev","choiceCnt","out","/ev","\n","done",{"c-0":["done",{"#f":5}]}]"##,
    );

    assert_eq!(story.advance().unwrap(), "1\n");
    assert_eq!(story.current_choices().len(), 1);
}

#[test]
fn nested_evaluation_is_an_error() {
    let mut story = story(r#"["ev","ev","done",null]"#);

    let err = story.advance().unwrap_err();
    assert!(matches!(err.root_cause(), StoryError::Runtime(_)));
    assert!(!story.can_continue());
}

#[test]
fn duplicate_copies_the_top_value() {
    let mut story = story(r#"["ev",4,"du","+","out","/ev","\n","done",null]"#);

    assert_eq!(story.advance().unwrap(), "8\n");
}

#[test]
fn string_evaluation_builds_a_value() {
    let mut story = story(r#"["ev","str","^ab","/str","du","+","out","/ev","\n","done",null]"#);

    assert_eq!(story.advance().unwrap(), "abab\n");
}

#[test]
fn random_is_deterministic_for_a_seed() {
    let source = r#"["ev",1,6,"rnd","out","/ev","\n","done",null]"#;

    let mut first = story(source);
    first.set_seed(42);
    let mut second = story(source);
    second.set_seed(42);

    let rolled = first.advance().unwrap();
    assert_eq!(rolled, second.advance().unwrap());

    let value: i32 = rolled.trim().parse().unwrap();
    assert!((1..=6).contains(&value));
}

#[test]
fn random_with_empty_range_is_an_error() {
    let mut story = story(r#"["ev",5,1,"rnd","out","/ev","\n","done",null]"#);

    let err = story.advance().unwrap_err();
    assert!(err.to_string().contains("RANDOM"));
}

#[test]
fn seed_random_reseeds_the_story() {
    let mut story = story(r#"["ev",7,"srnd","pop","/ev","^seeded","\n","done",null]"#);

    assert_eq!(story.advance().unwrap(), "seeded\n");
    assert_eq!(story.state().story_seed(), 7);
}

#[test]
fn shuffle_index_stays_in_range() {
    let mut story = story(r#"["ev",0,3,"seq","out","/ev","\n","done",null]"#);
    story.set_seed(3);

    let index: i32 = story.advance().unwrap().trim().parse().unwrap();
    assert!((0..3).contains(&index));
}

#[test]
fn list_from_int_looks_up_the_item() {
    let mut story = story_with_lists(r#"["ev","^colours",2,"listInt","out","/ev","\n","done",null]"#, COLOURS);

    assert_eq!(story.advance().unwrap(), "green\n");
}

#[test]
fn list_from_int_with_unknown_list_is_an_error() {
    let mut story = story_with_lists(r#"["ev","^nope",1,"listInt","out","/ev","\n","done",null]"#, COLOURS);

    assert!(story.advance().is_err());
}

#[test]
fn list_range_keeps_items_within_bounds() {
    let mut story = story_with_lists(
        r#"["ev",{"list":{"colours.red":1,"colours.green":2,"colours.blue":3}},2,3,"range","out","/ev","\n","done",null]"#,
        COLOURS,
    );

    assert_eq!(story.advance().unwrap(), "green, blue\n");
}

#[test]
fn list_random_of_single_item() {
    let mut story = story_with_lists(
        r#"["ev",{"list":{"colours.blue":3}},"lrnd","out","/ev","\n","done",null]"#,
        COLOURS,
    );

    assert_eq!(story.advance().unwrap(), "blue\n");
}

#[test]
fn tunnel_return_inside_a_function_is_a_stack_error() {
    let mut story = story(r#"[{"f()":"f"},"done",{"f":["ev","void","/ev","->->",null]}]"#);

    let err = story.advance().unwrap_err();
    assert!(matches!(err.root_cause(), StoryError::StackDiscipline(_)));
    assert!(err.to_string().contains("when expected tunnel onwards statement"));
}

#[test]
fn function_return_inside_a_tunnel_is_a_stack_error() {
    let mut story = story(r#"[{"->t->":"t"},"done",{"t":["~ret",null]}]"#);

    let err = story.advance().unwrap_err();
    assert!(matches!(err.root_cause(), StoryError::StackDiscipline(_)));
    assert!(err.to_string().contains("when expected function return statement"));
}
