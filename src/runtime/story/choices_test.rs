use crate::runtime::{error::StoryError, story::Story};

fn story(root: &str) -> Story {
    Story::from_json(&format!(
        r#"{{"inkVersion":21,"root":{root},"listDefs":{{}}}}"#
    ))
    .unwrap()
}

const TWO_CHOICES: &str = r##"["^Hello","\n","ev","str","^Choice A","/str","/ev",{"*":".^.c-0","flg":20},"ev","str","^Choice B","/str","/ev",{"*":".^.c-1","flg":20},"done",{"c-0":["\n","^You chose A.","\n",{"->":"g-0"},{"#f":5}],"c-1":["\n","^You chose B.","\n",{"->":"g-0"},{"#f":5}],"g-0":["^End","\n","done",null]}]"##;

#[test]
fn choices_are_offered_after_text() {
    let mut story = story(TWO_CHOICES);

    assert_eq!(story.advance().unwrap(), "Hello\n");
    assert!(!story.can_continue());

    let choices = story.current_choices();
    assert_eq!(choices.len(), 2);
    assert_eq!(choices[0].text, "Choice A");
    assert_eq!(choices[0].index, 0);
    assert_eq!(choices[1].text, "Choice B");
    assert_eq!(choices[1].index, 1);
    assert_eq!(choices[0].target_path.to_string(), "c-0");
}

#[test]
fn choosing_continues_from_the_choice_target() {
    let mut story = story(TWO_CHOICES);
    story.advance().unwrap();

    story.choose(0).unwrap();
    assert_eq!(story.state().current_turn_index(), 0);
    assert!(story.current_choices().is_empty());

    assert_eq!(story.advance().unwrap(), "You chose A.\n");
    assert_eq!(story.advance().unwrap(), "End\n");
    assert!(!story.can_continue());
    assert_eq!(story.visit_count_at_path("c-0").unwrap(), 1);
    assert_eq!(story.visit_count_at_path("c-1").unwrap(), 0);
}

#[test]
fn out_of_range_choice_is_rejected() {
    let mut story = story(TWO_CHOICES);
    story.advance().unwrap();

    let err = story.choose(5).unwrap_err();
    assert_eq!(err, StoryError::InvalidChoice { index: 5, count: 2 });
    assert_eq!(story.current_choices().len(), 2);
}

#[test]
fn invisible_default_is_hidden_alongside_visible_choices() {
    let mut story = story(
        r##"["ev","str","^A","/str","/ev",{"*":".^.c-0","flg":20},{"*":".^.c-1","flg":24},"done",{"c-0":["^took A","\n","done",{"#f":5}],"c-1":["^fallback","\n","done",{"#f":5}]}]"##,
    );

    assert_eq!(story.advance().unwrap(), "");
    let choices = story.current_choices();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0].text, "A");

    story.choose(0).unwrap();
    assert_eq!(story.advance().unwrap(), "took A\n");
}

#[test]
fn lone_invisible_default_is_followed_automatically() {
    let mut story = story(
        r##"[{"*":".^.c-0","flg":24},"done",{"c-0":["^fallback","\n","done",{"#f":5}]}]"##,
    );

    assert_eq!(story.advance().unwrap(), "fallback\n");
    assert!(story.current_choices().is_empty());
    assert_eq!(story.state().current_turn_index(), -1);
}

#[test]
fn once_only_choice_disappears_after_being_taken() {
    let mut story = story(
        r##"[{"->":"hub"},{"hub":["ev","str","^A","/str","/ev",{"*":".^.c-0","flg":20},"ev","str","^B","/str","/ev",{"*":".^.c-1","flg":4},"done",{"c-0":["^a","\n",{"->":"hub"},{"#f":5}],"c-1":["^b","\n","end",{"#f":5}],"#f":1}]}]"##,
    );

    story.advance().unwrap();
    assert_eq!(story.current_choices().len(), 2);

    story.choose(0).unwrap();
    assert_eq!(story.advance().unwrap(), "a\n");

    let choices = story.current_choices();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0].text, "B");
    assert_eq!(choices[0].index, 0);
}

#[test]
fn choice_tags_are_collected() {
    let mut story = story(
        r##"["ev","str","^Pick","#","^fancy","/#","/str","/ev",{"*":".^.c-0","flg":20},"done",{"c-0":["^ok","\n","done",{"#f":5}]}]"##,
    );

    story.advance().unwrap();
    let choices = story.current_choices();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0].text, "Pick");
    assert_eq!(choices[0].tags, vec![String::from("fancy")]);
}

#[test]
fn false_condition_hides_the_choice() {
    let mut story = story(
        r##"["ev","str","^Hidden","/str",false,"/ev",{"*":".^.c-0","flg":21},"ev","str","^Shown","/str","/ev",{"*":".^.c-1","flg":20},"done",{"c-0":["done",{"#f":5}],"c-1":["done",{"#f":5}]}]"##,
    );

    story.advance().unwrap();
    let choices = story.current_choices();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0].text, "Shown");
}
