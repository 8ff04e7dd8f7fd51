#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use inkvm::{Story, StoryError};

pub struct Fixture {
    pub name: String,
    pub source: String,
    pub transcript: String,
}

pub fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// Every `*.ink.json` under `root` together with its `.transcript`.
pub fn discover_fixtures(root: &Path) -> Vec<Fixture> {
    let entries = fs::read_dir(root)
        .unwrap_or_else(|e| panic!("failed to read fixture directory `{}`: {e}", root.display()));

    let mut fixtures = Vec::new();
    for entry in entries {
        let entry = entry.unwrap_or_else(|e| panic!("failed to read fixture entry: {e}"));
        let path = entry.path();
        let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
        let Some(name) = file_name.strip_suffix(".ink.json") else {
            continue;
        };
        let transcript_path = root.join(format!("{name}.transcript"));
        fixtures.push(Fixture {
            name: name.to_string(),
            source: read(&path),
            transcript: read(&transcript_path),
        });
    }
    fixtures.sort_by(|a, b| a.name.cmp(&b.name));
    fixtures
}

pub fn fixture(name: &str) -> Fixture {
    discover_fixtures(&fixtures_root())
        .into_iter()
        .find(|fixture| fixture.name == name)
        .unwrap_or_else(|| panic!("no fixture named `{name}`"))
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read `{}`: {e}", path.display()))
}

/// Choice numbers taken in a transcript, from its `?> n` lines.
pub fn scripted_choices(transcript: &str) -> Vec<usize> {
    transcript
        .lines()
        .filter_map(|line| line.strip_prefix("?> "))
        .map(|number| number.trim().parse().expect("choice number"))
        .collect()
}

/// Plays `story` the way the command line does, taking `choices` (1-based)
/// in order and stopping at the first choice with no answer left.
pub fn play_transcript(story: &mut Story, choices: &[usize]) -> Result<String, StoryError> {
    let mut out = String::new();
    let mut choices = choices.iter();
    loop {
        while story.can_continue() {
            out.push_str(&story.advance()?);
            let tags = story.current_tags();
            if !tags.is_empty() {
                out.push_str(&format!("# {}\n", tags.join(", ")));
            }
        }

        let texts: Vec<String> = story
            .current_choices()
            .iter()
            .map(|choice| choice.text.clone())
            .collect();
        if texts.is_empty() {
            return Ok(out);
        }
        out.push('\n');
        for (i, text) in texts.iter().enumerate() {
            out.push_str(&format!("{}: {}\n", i + 1, text));
        }

        let Some(&number) = choices.next() else {
            return Ok(out);
        };
        out.push_str(&format!("?> {number}\n"));
        story.choose(number - 1)?;
    }
}
