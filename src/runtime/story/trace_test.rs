use crate::runtime::{
    container::Container,
    control_command::ControlCommand,
    debug_metadata::DebugMetadata,
    error::StoryError,
    list::ListDefinitions,
    object::{Content, Divert},
    path::Path,
    story::Story,
};

fn story_with_bad_divert(metadata: Option<DebugMetadata>) -> Story {
    let mut builder = Container::builder();
    if let Some(metadata) = metadata {
        builder = builder.debug_metadata(metadata);
    }
    let root = builder
        .push(Content::text("before"))
        .push(Content::Divert(Divert::to_path(Path::parse("nowhere"))))
        .push(Content::Command(ControlCommand::Done))
        .build()
        .unwrap();
    Story::new(root, ListDefinitions::default()).unwrap()
}

#[test]
fn error_location_uses_debug_metadata() {
    let mut story = story_with_bad_divert(Some(DebugMetadata::new(Some("main.ink".into()), 3, 3)));

    let err = story.advance().unwrap_err();
    assert_eq!(
        err.to_string(),
        "RUNTIME ERROR: 'main.ink' line 3: addressing error: failed to find content at path 'nowhere', and no approximation of it was possible"
    );
    assert_eq!(story.current_errors(), [err.to_string()]);
}

#[test]
fn error_location_falls_back_to_path() {
    let mut story = story_with_bad_divert(None);

    let err = story.advance().unwrap_err();
    let StoryError::Located { location, .. } = err else {
        panic!("expected a located error");
    };
    assert_eq!(location, "(1)");
}

#[test]
fn locating_twice_keeps_the_first_location() {
    let story = story_with_bad_divert(None);

    let located = StoryError::Located {
        location: String::from("'a.ink' line 1"),
        error: Box::new(StoryError::runtime("boom")),
    };
    assert_eq!(story.locate(located.clone()), located);
}

#[test]
fn debug_metadata_is_found_on_ancestors() {
    let story = story_with_bad_divert(Some(DebugMetadata::new(None, 7, 9)));

    let metadata = story.current_debug_metadata().unwrap();
    assert_eq!(metadata.to_string(), "lines 7-9");
}
