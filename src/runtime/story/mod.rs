use std::{
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

use tracing::{debug, error};

use crate::{
    runtime::{
        ExternalFn, VariableObserver,
        choice::Choice,
        container::Container,
        error::StoryError,
        frame::PushPopType,
        list::ListDefinitions,
        path::Path,
        value::Value,
    },
    serialization,
    state::{Checkpoint, StoryState},
};

mod choices;
mod control;
mod dispatch;
mod function_call;
mod trace;

pub use function_call::FunctionResult;

/// Name of the root container that declares the globals.
const GLOBAL_DECLARATIONS: &str = "global decl";

struct ExternalBinding {
    function: ExternalFn,
    lookahead_safe: bool,
}

/// How the output changed while looking ahead past a newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NewlineChange {
    NoChange,
    ExtendedBeyondNewline,
    NewlineRemoved,
}

fn newline_change(checkpoint: &Checkpoint, state: &StoryState) -> NewlineChange {
    let previous = checkpoint.text();
    let current = state.current_text();
    let current_tags = state.current_tags().len();

    let newline_still_exists = current.len() >= previous.len()
        && !previous.is_empty()
        && current.as_bytes()[previous.len() - 1] == b'\n';
    if checkpoint.tag_count() == current_tags
        && previous.len() == current.len()
        && newline_still_exists
    {
        return NewlineChange::NoChange;
    }
    if !newline_still_exists {
        return NewlineChange::NewlineRemoved;
    }
    if current_tags > checkpoint.tag_count() {
        return NewlineChange::ExtendedBeyondNewline;
    }
    if current[previous.len()..]
        .chars()
        .any(|c| c != ' ' && c != '\t')
    {
        return NewlineChange::ExtendedBeyondNewline;
    }
    NewlineChange::NoChange
}

/// A loaded story and its running state.
pub struct Story {
    root: Rc<Container>,
    list_definitions: Rc<ListDefinitions>,
    state: StoryState,
    externals: HashMap<String, ExternalBinding>,
    observers: BTreeMap<String, Vec<VariableObserver>>,
    allow_external_function_fallbacks: bool,
    has_validated_externals: bool,
    checkpoint: Option<Checkpoint>,
    saw_lookahead_unsafe_function_after_newline: bool,
}

impl Story {
    /// Builds a story over an already decoded content tree and declares its
    /// globals.
    pub fn new(root: Rc<Container>, list_definitions: ListDefinitions) -> Result<Self, StoryError> {
        let list_definitions = Rc::new(list_definitions);
        let mut story = Self {
            state: StoryState::new(root.clone(), list_definitions.clone()),
            root,
            list_definitions,
            externals: HashMap::new(),
            observers: BTreeMap::new(),
            allow_external_function_fallbacks: false,
            has_validated_externals: false,
            checkpoint: None,
            saw_lookahead_unsafe_function_after_newline: false,
        };
        story.reset_globals()?;
        Ok(story)
    }

    /// Loads a compiled story document.
    pub fn from_json(json: &str) -> Result<Self, StoryError> {
        let (root, list_definitions) = serialization::read_story(json)?;
        debug!(lists = list_definitions.lists().len(), "story loaded");
        Self::new(root, list_definitions)
    }

    /// Encodes the content tree back into a story document.
    pub fn to_json(&self) -> Result<String, StoryError> {
        serialization::write_story(&self.root, &self.list_definitions)
    }

    pub fn root(&self) -> &Rc<Container> {
        &self.root
    }

    pub fn list_definitions(&self) -> &ListDefinitions {
        &self.list_definitions
    }

    pub fn state(&self) -> &StoryState {
        &self.state
    }

    pub fn set_allow_external_function_fallbacks(&mut self, allow: bool) {
        self.allow_external_function_fallbacks = allow;
    }

    /// Reseeds the random number generator used by `RANDOM`, shuffles and
    /// `LIST_RANDOM`.
    pub fn set_seed(&mut self, seed: i32) {
        self.state.set_story_seed(seed);
    }

    pub fn can_continue(&self) -> bool {
        self.state.can_continue()
    }

    /// Runs until the next line of output is complete and returns it.
    pub fn advance(&mut self) -> Result<String, StoryError> {
        if !self.has_validated_externals {
            self.validate_external_bindings()?;
        }
        self.continue_internal()?;
        Ok(self.state.current_text())
    }

    /// Advances until the story stops at choices or ends.
    pub fn continue_maximally(&mut self) -> Result<String, StoryError> {
        let mut text = String::new();
        while self.can_continue() {
            text.push_str(&self.advance()?);
        }
        Ok(text)
    }

    pub fn current_text(&self) -> String {
        self.state.current_text()
    }

    pub fn current_tags(&self) -> Vec<String> {
        self.state.current_tags()
    }

    /// Choices the player can pick from, numbered from zero.
    pub fn current_choices(&self) -> Vec<&Choice> {
        self.state.current_choices().collect()
    }

    pub fn current_errors(&self) -> &[String] {
        self.state.current_errors()
    }

    pub fn current_warnings(&self) -> &[String] {
        self.state.current_warnings()
    }

    /// Clears recorded errors and warnings.
    pub fn reset_errors(&mut self) {
        self.state.reset_errors();
    }

    pub fn variable(&self, name: &str) -> Option<Value> {
        self.state.global_variable(name)
    }

    /// Sets a declared global and notifies its observers.
    pub fn set_variable(&mut self, name: &str, value: impl Into<Value>) -> Result<(), StoryError> {
        self.state.set_global_variable(name, value.into())?;
        self.notify_variable_observers();
        Ok(())
    }

    /// Calls `observer` with the new value whenever the global `name`
    /// changes. Changes made while advancing are reported once the advance
    /// finishes.
    pub fn observe_variable(
        &mut self,
        name: &str,
        observer: impl FnMut(&str, &Value) + 'static,
    ) -> Result<(), StoryError> {
        if !self.state.variables().global_exists(name) {
            return Err(StoryError::runtime(format!(
                "cannot observe variable '{name}' because it wasn't declared in the ink story"
            )));
        }
        self.observers
            .entry(name.to_string())
            .or_default()
            .push(Box::new(observer));
        Ok(())
    }

    pub fn visit_count_at_path(&self, path: &str) -> Result<i32, StoryError> {
        let result = self.root.resolve_path(&Path::parse(path));
        if result.approximate || result.container().is_none() {
            return Err(StoryError::Addressing(format!(
                "content at path not found: {path}"
            )));
        }
        Ok(self.state.visit_count_at_path_string(path))
    }

    /// Jumps to a knot or stitch, dropping the current call stack.
    pub fn choose_path_string(&mut self, path: &str, args: &[Value]) -> Result<(), StoryError> {
        debug!(path, "choosing path");
        self.push_arguments(args)?;
        self.state.force_end();
        self.choose_path(&Path::parse(path), true)
    }

    pub fn save_state(&self) -> Result<String, StoryError> {
        serialization::save_state::write(&self.state)
    }

    /// Replaces the running state with a saved one. The current state is
    /// untouched when the save can't be read.
    pub fn load_state(&mut self, json: &str) -> Result<(), StoryError> {
        self.state = serialization::save_state::read(&self.state, json)?;
        self.checkpoint = None;
        debug!(turn = self.state.current_turn_index(), "state loaded");
        Ok(())
    }

    /// Starts the story over with freshly declared globals.
    pub fn reset_state(&mut self) -> Result<(), StoryError> {
        self.state = StoryState::new(self.root.clone(), self.list_definitions.clone());
        self.checkpoint = None;
        self.reset_globals()
    }

    fn reset_globals(&mut self) -> Result<(), StoryError> {
        if self.root.named_content(GLOBAL_DECLARATIONS).is_some() {
            let original = self.state.current_pointer();
            self.choose_path(&Path::parse(GLOBAL_DECLARATIONS), false)?;
            self.continue_internal()?;
            self.state.set_current_pointer(original);
        }
        self.state.variables_mut().snapshot_default_globals();
        self.state.reset_output();
        Ok(())
    }

    fn continue_internal(&mut self) -> Result<(), StoryError> {
        if !self.state.can_continue() {
            return Err(StoryError::runtime(
                "can't continue: check can_continue before advancing",
            ));
        }
        self.state.set_did_safe_exit(false);
        self.state.reset_output();

        let result = self.run_until_line_ends();
        let end_of_content = match result {
            Ok(()) if !self.state.can_continue() => self.check_end_of_content(),
            _ => None,
        };
        self.state.set_did_safe_exit(false);
        self.saw_lookahead_unsafe_function_after_newline = false;
        self.number_visible_choices();
        self.notify_variable_observers();

        result?;
        end_of_content.map_or(Ok(()), Err)
    }

    fn run_until_line_ends(&mut self) -> Result<(), StoryError> {
        loop {
            let ends_in_newline = match self.continue_single_step() {
                Ok(ends_in_newline) => ends_in_newline,
                Err(err) => return Err(self.fail(err)),
            };
            if ends_in_newline || !self.state.can_continue() {
                break;
            }
        }
        if self.checkpoint.is_some() {
            self.restore_checkpoint();
        }
        Ok(())
    }

    fn continue_single_step(&mut self) -> Result<bool, StoryError> {
        self.step()?;

        if !self.state.can_continue() && !self.state.call_stack().element_is_evaluate_from_game() {
            self.try_follow_default_invisible_choice()?;
        }

        if self.state.in_string_evaluation() {
            return Ok(false);
        }

        if let Some(checkpoint) = &self.checkpoint {
            let change = newline_change(checkpoint, &self.state);
            if change == NewlineChange::ExtendedBeyondNewline
                || self.saw_lookahead_unsafe_function_after_newline
            {
                self.restore_checkpoint();
                return Ok(true);
            }
            if change == NewlineChange::NewlineRemoved {
                self.discard_checkpoint();
            }
        }

        if self.state.output_stream_ends_in_newline() {
            if self.state.can_continue() {
                if self.checkpoint.is_none() {
                    self.checkpoint = Some(self.state.start_patching());
                }
            } else {
                self.discard_checkpoint();
            }
        }
        Ok(false)
    }

    fn restore_checkpoint(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            self.state.restore_checkpoint(checkpoint);
        }
    }

    fn discard_checkpoint(&mut self) {
        self.state.apply_any_patch();
        self.checkpoint = None;
    }

    /// Records a fatal error raised while stepping and ends the story.
    fn fail(&mut self, err: StoryError) -> StoryError {
        let located = self.locate(err);
        self.restore_checkpoint();
        error!("{located}");
        self.state.add_error(located.to_string());
        self.state.force_end();
        located
    }

    /// Reports content that ended without a proper exit. Returns the first
    /// problem found.
    fn check_end_of_content(&mut self) -> Option<StoryError> {
        let call_stack = self.state.call_stack();
        let mut problems = Vec::new();
        if call_stack.can_pop_thread() {
            problems.push("thread available to pop, threads should always be flat by the end of evaluation");
        }
        if self.state.generated_choices().is_empty() && !self.state.did_safe_exit() {
            problems.push(if call_stack.can_pop_type(PushPopType::Tunnel) {
                "unexpectedly reached end of content. Do you need a '->->' to return from a tunnel?"
            } else if call_stack.can_pop_type(PushPopType::Function) {
                "unexpectedly reached end of content. Do you need a '~ return'?"
            } else if !call_stack.can_pop() {
                "ran out of content. Do you need a '-> DONE' or '-> END'?"
            } else {
                "unexpectedly reached end of content for unknown reason"
            });
        }
        let mut first = None;
        for problem in problems {
            let located = self.locate(StoryError::runtime(problem));
            error!("{located}");
            self.state.add_error(located.to_string());
            first.get_or_insert(located);
        }
        first
    }

    fn number_visible_choices(&mut self) {
        let mut index = 0;
        for choice in self.state.generated_choices_mut() {
            if !choice.is_invisible_default {
                choice.index = index;
                index += 1;
            }
        }
    }

    fn notify_variable_observers(&mut self) {
        let changed = self.state.variables_mut().take_changed();
        for name in changed {
            let Some(observers) = self.observers.get_mut(&name) else {
                continue;
            };
            let Some(value) = self.state.global_variable(&name) else {
                continue;
            };
            for observer in observers.iter_mut() {
                observer(&name, &value);
            }
        }
    }

    /// Moves execution to `path`, clearing the offered choices.
    pub(crate) fn choose_path(
        &mut self,
        path: &Path,
        incrementing_turn_index: bool,
    ) -> Result<(), StoryError> {
        self.state.generated_choices_mut().clear();
        let mut pointer = self.state.pointer_at_path(path)?;
        if !pointer.is_null() && pointer.index == -1 {
            pointer.index = 0;
        }
        self.state.set_current_pointer(pointer);
        if incrementing_turn_index {
            self.state.advance_turn_index();
        }
        self.visit_changed_containers_due_to_divert();
        Ok(())
    }

    fn knot_container_with_name(&self, name: &str) -> Option<Rc<Container>> {
        self.root.named_content(name).cloned()
    }
}

#[cfg(test)]
mod choices_test;
#[cfg(test)]
mod control_test;
#[cfg(test)]
mod function_call_test;
#[cfg(test)]
mod trace_test;
