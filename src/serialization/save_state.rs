//! Save-state documents.
//!
//! A save holds everything that changes while a story runs: the current
//! flow (call stack, output, choices), globals that differ from their
//! declared defaults, the evaluation stack, counters and the random seed.
//! Content is referenced by path, so a save only loads against the story
//! it was written from (or a compatible edit of it).
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::{debug, warn};

use crate::{
    runtime::{
        call_stack::{CallStack, Thread},
        choice::Choice,
        error::StoryError,
        frame::{Frame, PushPopType},
        path::Path,
        pointer::Pointer,
    },
    serialization::{INK_VERSION_CURRENT, content},
    state::{DEFAULT_FLOW_NAME, Flow, MIN_COMPATIBLE_LOAD_VERSION, SAVE_STATE_VERSION, StoryState},
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flows: Option<BTreeMap<String, FlowDocument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_flow_name: Option<String>,
    variables_state: Map<String, Json>,
    eval_stack: Vec<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_divert_target: Option<String>,
    visit_counts: BTreeMap<String, i32>,
    turn_indices: BTreeMap<String, i32>,
    turn_idx: i32,
    story_seed: i32,
    #[serde(default)]
    previous_random: i32,
    ink_save_version: i64,
    #[serde(default)]
    ink_format_version: Option<i64>,

    // Saves written before flows existed keep the flow fields at the top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callstack_threads: Option<CallStackDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_stream: Option<Vec<Json>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_choices: Option<Vec<ChoiceDocument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    choice_threads: Option<BTreeMap<String, ThreadDocument>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowDocument {
    callstack: CallStackDocument,
    output_stream: Vec<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    choice_threads: Option<BTreeMap<String, ThreadDocument>>,
    current_choices: Vec<ChoiceDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallStackDocument {
    threads: Vec<ThreadDocument>,
    thread_counter: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadDocument {
    callstack: Vec<FrameDocument>,
    thread_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_content_object: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrameDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    idx: Option<i32>,
    exp: bool,
    #[serde(rename = "type")]
    push_type: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temp: Option<Map<String, Json>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceDocument {
    text: String,
    index: usize,
    original_choice_path: String,
    original_thread_index: usize,
    target_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

fn write_thread(thread: &Thread) -> ThreadDocument {
    let callstack = thread
        .callstack
        .iter()
        .map(|frame| {
            let (c_path, idx) = match &frame.current_pointer.container {
                Some(container) => (
                    Some(container.path().to_string()),
                    Some(frame.current_pointer.index),
                ),
                None => (None, None),
            };
            let temp = (!frame.temporary_variables.is_empty()).then(|| {
                frame
                    .temporary_variables
                    .iter()
                    .map(|(name, value)| (name.to_string(), content::write_value(value)))
                    .collect()
            });
            FrameDocument {
                c_path,
                idx,
                exp: frame.in_expression_evaluation,
                push_type: frame.push_type as i64,
                temp,
            }
        })
        .collect();

    let previous = &thread.previous_pointer;
    let previous_content_object = previous
        .resolve()
        .map(|content| content.path())
        .or_else(|| previous.path())
        .map(|path| path.to_string());

    ThreadDocument {
        callstack,
        thread_index: thread.thread_index,
        previous_content_object,
    }
}

fn write_flow(flow: &Flow) -> FlowDocument {
    let mut choice_threads = BTreeMap::new();
    for choice in &flow.current_choices {
        let thread = &choice.thread_at_generation;
        if flow.call_stack.thread_with_index(thread.thread_index).is_none() {
            choice_threads.insert(thread.thread_index.to_string(), write_thread(thread));
        }
    }

    FlowDocument {
        callstack: CallStackDocument {
            threads: flow.call_stack.threads().iter().map(write_thread).collect(),
            thread_counter: flow.call_stack.thread_counter(),
        },
        output_stream: flow
            .output_stream
            .iter()
            .map(content::write_output_item)
            .collect(),
        choice_threads: (!choice_threads.is_empty()).then_some(choice_threads),
        current_choices: flow
            .current_choices
            .iter()
            .map(|choice| ChoiceDocument {
                text: choice.text.clone(),
                index: choice.index,
                original_choice_path: choice.source_path.clone(),
                original_thread_index: choice.thread_at_generation.thread_index,
                target_path: choice.target_path.to_string(),
                tags: choice.tags.clone(),
            })
            .collect(),
    }
}

/// Encodes the running state of a story.
pub fn write(state: &StoryState) -> Result<String, StoryError> {
    let flow = state.flow();
    let mut flows = BTreeMap::new();
    flows.insert(flow.name.clone(), write_flow(flow));

    let variables = state.variables();
    let variables_state = variables
        .globals()
        .filter(|(name, value)| variables.default_value(name) != Some(*value))
        .map(|(name, value)| (name.to_string(), content::write_value(value)))
        .collect();

    let document = SaveDocument {
        flows: Some(flows),
        current_flow_name: Some(flow.name.clone()),
        variables_state,
        eval_stack: state
            .evaluation_stack()
            .iter()
            .map(content::write_eval_item)
            .collect(),
        current_divert_target: state.diverted_pointer().path().map(|path| path.to_string()),
        visit_counts: state.visit_counts().clone(),
        turn_indices: state.turn_indices().clone(),
        turn_idx: state.current_turn_index(),
        story_seed: state.story_seed(),
        previous_random: state.previous_random(),
        ink_save_version: i64::from(SAVE_STATE_VERSION),
        ink_format_version: Some(i64::from(INK_VERSION_CURRENT)),
        callstack_threads: None,
        output_stream: None,
        current_choices: None,
        choice_threads: None,
    };
    Ok(serde_json::to_string(&document)?)
}

/// Decodes a save against the story `current` belongs to and returns the
/// restored state. `current` is only used as a template.
pub fn read(current: &StoryState, json: &str) -> Result<StoryState, StoryError> {
    let token: Json = serde_json::from_str(json)?;
    let version = token
        .get("inkSaveVersion")
        .and_then(Json::as_i64)
        .ok_or_else(|| StoryError::format("ink save format incorrect, can't load"))?;
    if version < i64::from(MIN_COMPATIBLE_LOAD_VERSION) {
        return Err(StoryError::IncompatibleVersion {
            kind: "save",
            found: version,
            minimum: MIN_COMPATIBLE_LOAD_VERSION,
            current: SAVE_STATE_VERSION,
        });
    }
    let document: SaveDocument = serde_json::from_value(token)?;
    let mut state = current.empty_like();

    let flow = match document.flows {
        Some(mut flows) => {
            let name = document
                .current_flow_name
                .unwrap_or_else(|| DEFAULT_FLOW_NAME.to_string());
            if flows.len() > 1 {
                warn!(
                    flows = flows.len(),
                    current = %name,
                    "save holds several flows; only the current one is loaded"
                );
            }
            let flow = flows
                .remove(&name)
                .ok_or_else(|| StoryError::format(format!("save has no flow named '{name}'")))?;
            read_flow(
                &mut state,
                &name,
                flow.callstack,
                &flow.output_stream,
                flow.current_choices,
                flow.choice_threads.unwrap_or_default(),
            )?
        }
        None => {
            let callstack = document
                .callstack_threads
                .ok_or_else(|| StoryError::format("save has neither flows nor callstackThreads"))?;
            read_flow(
                &mut state,
                DEFAULT_FLOW_NAME,
                callstack,
                &document.output_stream.unwrap_or_default(),
                document.current_choices.unwrap_or_default(),
                document.choice_threads.unwrap_or_default(),
            )?
        }
    };
    *state.flow_mut() = flow;

    let names: Vec<String> = state
        .variables()
        .globals()
        .map(|(name, _)| name.to_string())
        .collect();
    for name in names {
        if let Some(token) = document.variables_state.get(&name) {
            let value = content::read_value(token)?;
            state.variables_mut().insert_loaded_global(&name, value);
        }
    }

    let evaluation_stack = document
        .eval_stack
        .iter()
        .map(content::read_eval_item)
        .collect::<Result<Vec<_>, _>>()?;
    *state.evaluation_stack_mut() = evaluation_stack;

    if let Some(target) = &document.current_divert_target {
        let pointer = state.pointer_at_path(&Path::parse(target))?;
        state.set_diverted_pointer(pointer);
    }

    state.restore_counts(document.visit_counts, document.turn_indices, document.turn_idx);
    state.restore_random(document.story_seed, document.previous_random);
    debug!(version, turn = document.turn_idx, "save state read");
    Ok(state)
}

fn read_flow(
    state: &mut StoryState,
    name: &str,
    callstack: CallStackDocument,
    output_stream: &[Json],
    choices: Vec<ChoiceDocument>,
    mut choice_threads: BTreeMap<String, ThreadDocument>,
) -> Result<Flow, StoryError> {
    let threads = callstack
        .threads
        .into_iter()
        .map(|thread| read_thread(state, thread))
        .collect::<Result<Vec<_>, _>>()?;
    let call_stack = CallStack::from_threads(state.root(), threads, callstack.thread_counter)?;

    let output_stream = output_stream
        .iter()
        .map(content::read_output_item)
        .collect::<Result<Vec<_>, _>>()?;

    let mut current_choices = Vec::with_capacity(choices.len());
    for choice in choices {
        let thread = match call_stack.thread_with_index(choice.original_thread_index) {
            Some(thread) => thread.clone(),
            None => {
                let saved = choice_threads
                    .remove(&choice.original_thread_index.to_string())
                    .ok_or_else(|| {
                        StoryError::format(format!(
                            "no thread saved for choice '{}' (thread {})",
                            choice.text, choice.original_thread_index
                        ))
                    })?;
                read_thread(state, saved)?
            }
        };
        current_choices.push(Choice {
            text: choice.text,
            index: choice.index,
            target_path: Path::parse(&choice.target_path),
            source_path: choice.original_choice_path,
            original_thread_index: choice.original_thread_index,
            is_invisible_default: false,
            tags: choice.tags,
            thread_at_generation: thread,
        });
    }

    Ok(Flow {
        name: name.to_string(),
        call_stack,
        output_stream,
        current_choices,
    })
}

fn read_thread(state: &mut StoryState, document: ThreadDocument) -> Result<Thread, StoryError> {
    let mut callstack = Vec::with_capacity(document.callstack.len());
    for frame in document.callstack {
        let push_type = PushPopType::try_from(frame.push_type).map_err(|found| {
            StoryError::format(format!("unknown call stack element type {found}"))
        })?;

        let pointer = match &frame.c_path {
            Some(text) => {
                let path = Path::parse(text);
                let result = state.root().content_at_path(&path, 0, path.len());
                let container = result.container().cloned().ok_or_else(|| {
                    StoryError::Addressing(format!(
                        "when loading state, internal story location couldn't be found: {text}. Has the story changed since this save data was created?"
                    ))
                })?;
                if result.approximate {
                    state.add_warning(format!(
                        "when loading state, exact internal story location couldn't be found: '{text}', so it was approximated to '{}' to recover. Has the story changed since this save data was created?",
                        container.path()
                    ));
                }
                let index = frame
                    .idx
                    .ok_or_else(|| StoryError::format(format!("frame at '{text}' has no index")))?;
                Pointer::new(container, index)
            }
            None => Pointer::null(),
        };

        let mut element = Frame::new(push_type, pointer, frame.exp);
        for (name, token) in frame.temp.iter().flatten() {
            element
                .temporary_variables
                .insert(name.as_str().into(), content::read_value(token)?);
        }
        callstack.push(element);
    }

    let previous_pointer = match &document.previous_content_object {
        Some(text) => state.pointer_at_path(&Path::parse(text))?,
        None => Pointer::null(),
    };

    Ok(Thread {
        callstack,
        thread_index: document.thread_index,
        previous_pointer,
    })
}
