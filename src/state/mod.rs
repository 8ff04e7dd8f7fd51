//! Mutable story state: call stack, streams, globals and counters.
//!
//! Execution state that the newline look-ahead may have to roll back lives
//! in cloneable fields and is captured by [`Checkpoint`]. Globals and
//! counters are shared with the checkpoint and protected by a
//! [`StatePatch`] instead, so rolling back never copies them.
use std::{collections::BTreeMap, rc::Rc};

use tracing::warn;

use crate::runtime::{
    call_stack::CallStack,
    choice::Choice,
    container::Container,
    error::StoryError,
    list::ListDefinitions,
    object::{EvalItem, OutputItem},
    path::{Component, Path},
    pointer::Pointer,
    prng::SubtractiveRng,
    value::Value,
};

pub mod output;
pub mod patch;
pub mod variables;

pub use patch::StatePatch;
pub use variables::VariablesState;

/// Version written to `inkSaveVersion`.
pub const SAVE_STATE_VERSION: u32 = 10;
/// Oldest save format that still loads.
pub const MIN_COMPATIBLE_LOAD_VERSION: u32 = 8;
/// Name of the only flow.
pub const DEFAULT_FLOW_NAME: &str = "DEFAULT_FLOW";

/// A named execution context: call stack, output and offered choices.
#[derive(Debug, Clone)]
pub struct Flow {
    pub name: String,
    pub call_stack: CallStack,
    pub output_stream: Vec<OutputItem>,
    pub current_choices: Vec<Choice>,
}

impl Flow {
    pub fn new(name: &str, root: &Rc<Container>) -> Self {
        Self {
            name: name.to_string(),
            call_stack: CallStack::new(root),
            output_stream: Vec::new(),
            current_choices: Vec::new(),
        }
    }
}

/// Copy of the execution fields taken when the engine starts looking ahead
/// past a newline.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    flow: Flow,
    evaluation_stack: Vec<EvalItem>,
    diverted_pointer: Pointer,
    current_turn_index: i32,
    story_seed: i32,
    previous_random: i32,
    did_safe_exit: bool,
    text: String,
    tag_count: usize,
}

impl Checkpoint {
    pub fn output_stream(&self) -> &[OutputItem] {
        &self.flow.output_stream
    }

    /// Text of the line that ended in the newline.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tag_count(&self) -> usize {
        self.tag_count
    }
}

pub struct StoryState {
    flow: Flow,
    evaluation_stack: Vec<EvalItem>,
    diverted_pointer: Pointer,
    current_turn_index: i32,
    story_seed: i32,
    previous_random: i32,
    did_safe_exit: bool,
    variables: VariablesState,
    visit_counts: BTreeMap<String, i32>,
    turn_indices: BTreeMap<String, i32>,
    patch: Option<StatePatch>,
    list_definitions: Rc<ListDefinitions>,
    root: Rc<Container>,
    current_errors: Vec<String>,
    current_warnings: Vec<String>,
}

impl StoryState {
    pub fn new(root: Rc<Container>, list_definitions: Rc<ListDefinitions>) -> Self {
        let time_seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_millis() as i32 ^ d.as_secs() as i32)
            .unwrap_or_default();
        let story_seed = SubtractiveRng::new(time_seed).next_int() % 100;

        Self {
            flow: Flow::new(DEFAULT_FLOW_NAME, &root),
            evaluation_stack: Vec::new(),
            diverted_pointer: Pointer::null(),
            current_turn_index: -1,
            story_seed,
            previous_random: 0,
            did_safe_exit: false,
            variables: VariablesState::default(),
            visit_counts: BTreeMap::new(),
            turn_indices: BTreeMap::new(),
            patch: None,
            list_definitions,
            root,
            current_errors: Vec::new(),
            current_warnings: Vec::new(),
        }
    }

    /// Blank state for the same story carrying over the declared globals.
    pub(crate) fn empty_like(&self) -> Self {
        let mut state = Self::new(self.root.clone(), self.list_definitions.clone());
        state.variables = self.variables.clone();
        state.variables.reset_to_defaults();
        state.variables.take_changed();
        state
    }

    pub fn root(&self) -> &Rc<Container> {
        &self.root
    }

    pub fn list_definitions(&self) -> &ListDefinitions {
        &self.list_definitions
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub(crate) fn flow_mut(&mut self) -> &mut Flow {
        &mut self.flow
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.flow.call_stack
    }

    pub(crate) fn call_stack_mut(&mut self) -> &mut CallStack {
        &mut self.flow.call_stack
    }

    pub fn variables(&self) -> &VariablesState {
        &self.variables
    }

    pub(crate) fn variables_mut(&mut self) -> &mut VariablesState {
        &mut self.variables
    }

    pub fn patch(&self) -> Option<&StatePatch> {
        self.patch.as_ref()
    }

    pub fn current_errors(&self) -> &[String] {
        &self.current_errors
    }

    pub fn current_warnings(&self) -> &[String] {
        &self.current_warnings
    }

    pub fn has_error(&self) -> bool {
        !self.current_errors.is_empty()
    }

    pub(crate) fn add_error(&mut self, message: String) {
        self.current_errors.push(message);
    }

    pub(crate) fn add_warning(&mut self, message: String) {
        warn!("{message}");
        self.current_warnings.push(message);
    }

    pub(crate) fn truncate_errors(&mut self, len: usize) {
        self.current_errors.truncate(len);
    }

    pub(crate) fn reset_errors(&mut self) {
        self.current_errors.clear();
        self.current_warnings.clear();
    }

    pub fn can_continue(&self) -> bool {
        !self.current_pointer().is_null() && !self.has_error()
    }

    pub fn current_pointer(&self) -> Pointer {
        self.flow.call_stack.current_element().current_pointer.clone()
    }

    pub(crate) fn set_current_pointer(&mut self, pointer: Pointer) {
        self.flow.call_stack.current_element_mut().current_pointer = pointer;
    }

    pub fn previous_pointer(&self) -> Pointer {
        self.flow.call_stack.current_thread().previous_pointer.clone()
    }

    pub(crate) fn set_previous_pointer(&mut self, pointer: Pointer) {
        self.flow.call_stack.current_thread_mut().previous_pointer = pointer;
    }

    pub fn in_expression_evaluation(&self) -> bool {
        self.flow.call_stack.current_element().in_expression_evaluation
    }

    pub(crate) fn set_in_expression_evaluation(&mut self, value: bool) {
        self.flow.call_stack.current_element_mut().in_expression_evaluation = value;
    }

    pub fn current_turn_index(&self) -> i32 {
        self.current_turn_index
    }

    pub fn story_seed(&self) -> i32 {
        self.story_seed
    }

    pub(crate) fn set_story_seed(&mut self, seed: i32) {
        self.story_seed = seed;
        self.previous_random = 0;
    }

    pub fn previous_random(&self) -> i32 {
        self.previous_random
    }

    pub(crate) fn set_previous_random(&mut self, value: i32) {
        self.previous_random = value;
    }

    pub fn did_safe_exit(&self) -> bool {
        self.did_safe_exit
    }

    pub(crate) fn set_did_safe_exit(&mut self, value: bool) {
        self.did_safe_exit = value;
    }

    pub fn diverted_pointer(&self) -> &Pointer {
        &self.diverted_pointer
    }

    pub(crate) fn set_diverted_pointer(&mut self, pointer: Pointer) {
        self.diverted_pointer = pointer;
    }

    pub(crate) fn take_diverted_pointer(&mut self) -> Pointer {
        std::mem::take(&mut self.diverted_pointer)
    }

    pub fn visit_counts(&self) -> &BTreeMap<String, i32> {
        &self.visit_counts
    }

    pub fn turn_indices(&self) -> &BTreeMap<String, i32> {
        &self.turn_indices
    }

    pub(crate) fn restore_counts(
        &mut self,
        visit_counts: BTreeMap<String, i32>,
        turn_indices: BTreeMap<String, i32>,
        current_turn_index: i32,
    ) {
        self.visit_counts = visit_counts;
        self.turn_indices = turn_indices;
        self.current_turn_index = current_turn_index;
    }

    pub(crate) fn restore_random(&mut self, story_seed: i32, previous_random: i32) {
        self.story_seed = story_seed;
        self.previous_random = previous_random;
    }

    /// Resolves an absolute path to a pointer. A path ending in an index
    /// points at that slot of the resolved container; otherwise at the
    /// container itself.
    pub(crate) fn pointer_at_path(&mut self, path: &Path) -> Result<Pointer, StoryError> {
        if path.is_empty() {
            return Ok(Pointer::null());
        }
        let (length, index) = match path.last_component().and_then(Component::as_index) {
            Some(index) => (path.len() - 1, index as i32),
            None => (path.len(), -1),
        };
        let result = self.root.content_at_path(path, 0, length);
        let container = result
            .container()
            .filter(|container| length == 0 || !Rc::ptr_eq(container, &self.root))
            .cloned()
            .ok_or_else(|| {
                StoryError::Addressing(format!(
                    "failed to find content at path '{path}', and no approximation of it was possible"
                ))
            })?;
        if result.approximate {
            self.add_warning(format!(
                "failed to find content at path '{path}', so it was approximated to '{}'",
                result.obj.path()
            ));
        }
        Ok(Pointer::new(container, index))
    }

    // Evaluation stack

    pub fn evaluation_stack(&self) -> &[EvalItem] {
        &self.evaluation_stack
    }

    pub(crate) fn evaluation_stack_mut(&mut self) -> &mut Vec<EvalItem> {
        &mut self.evaluation_stack
    }

    pub(crate) fn push_evaluation_stack(&mut self, item: impl Into<EvalItem>) {
        self.evaluation_stack.push(item.into());
    }

    pub(crate) fn pop_evaluation_stack(&mut self) -> Result<EvalItem, StoryError> {
        self.evaluation_stack
            .pop()
            .ok_or_else(|| StoryError::stack("evaluation stack is empty"))
    }

    /// Pops an item that must be a value.
    pub(crate) fn pop_value(&mut self) -> Result<Value, StoryError> {
        match self.pop_evaluation_stack()? {
            EvalItem::Value(value) => Ok(value),
            EvalItem::Void => Err(StoryError::Type(
                "expected a value but found void; did a function forget to return one?".into(),
            )),
            EvalItem::Tag(text) => Err(StoryError::Type(format!(
                "expected a value but found tag '{text}'"
            ))),
        }
    }

    /// Pops `count` items, returned in push order.
    pub(crate) fn pop_evaluation_stack_n(&mut self, count: usize) -> Result<Vec<EvalItem>, StoryError> {
        if count > self.evaluation_stack.len() {
            return Err(StoryError::stack("trying to pop too many objects"));
        }
        let at = self.evaluation_stack.len() - count;
        Ok(self.evaluation_stack.split_off(at))
    }

    pub(crate) fn peek_evaluation_stack(&self) -> Option<&EvalItem> {
        self.evaluation_stack.last()
    }

    // Choices

    pub fn current_choices(&self) -> impl Iterator<Item = &Choice> {
        let visible = !self.can_continue();
        self.flow
            .current_choices
            .iter()
            .filter(move |choice| visible && !choice.is_invisible_default)
    }

    pub fn generated_choices(&self) -> &[Choice] {
        &self.flow.current_choices
    }

    pub(crate) fn generated_choices_mut(&mut self) -> &mut Vec<Choice> {
        &mut self.flow.current_choices
    }

    // Counters

    /// Visit count of a container; the container must count visits.
    pub fn visit_count_for_container(&self, container: &Container) -> Result<i32, StoryError> {
        if !container.visits_should_be_counted() {
            return Err(StoryError::runtime(format!(
                "read count for target ({}{}) unknown",
                container.name().unwrap_or(&container.path().to_string()),
                container
                    .debug_metadata()
                    .map(|dm| format!(" - on {dm}"))
                    .unwrap_or_default()
            )));
        }
        Ok(self.visit_count_at_path_string(&container.path().to_string()))
    }

    pub fn visit_count_at_path_string(&self, path: &str) -> i32 {
        if let Some(count) = self.patch.as_ref().and_then(|p| p.visit_count(path)) {
            return count;
        }
        self.visit_counts.get(path).copied().unwrap_or(0)
    }

    pub(crate) fn increment_visit_count(&mut self, container: &Container) {
        let path = container.path().to_string();
        let count = self.visit_count_at_path_string(&path) + 1;
        match &mut self.patch {
            Some(patch) => patch.set_visit_count(&path, count),
            None => {
                self.visit_counts.insert(path, count);
            }
        }
    }

    pub(crate) fn record_turn_index_visit(&mut self, container: &Container) {
        let path = container.path().to_string();
        let turn = self.current_turn_index;
        match &mut self.patch {
            Some(patch) => patch.set_turn_index(&path, turn),
            None => {
                self.turn_indices.insert(path, turn);
            }
        }
    }

    /// Turns since the container was last visited, or `-1` if never.
    pub fn turns_since_for_container(&self, container: &Container) -> Result<i32, StoryError> {
        if !container.turn_index_should_be_counted() {
            return Err(StoryError::runtime(format!(
                "TURNS_SINCE() for target ({}) unknown",
                container.name().unwrap_or(&container.path().to_string())
            )));
        }
        let path = container.path().to_string();
        let index = self
            .patch
            .as_ref()
            .and_then(|p| p.turn_index(&path))
            .or_else(|| self.turn_indices.get(&path).copied());
        Ok(index.map_or(-1, |index| self.current_turn_index - index))
    }

    // Flow control

    /// Ends the story: clears the call stack and choices.
    pub(crate) fn force_end(&mut self) {
        self.flow.call_stack.reset();
        self.flow.current_choices.clear();
        self.set_current_pointer(Pointer::null());
        self.set_previous_pointer(Pointer::null());
        self.did_safe_exit = true;
    }

    pub(crate) fn try_exit_function_evaluation_from_game(&mut self) -> bool {
        if self.flow.call_stack.element_is_evaluate_from_game() {
            self.set_current_pointer(Pointer::null());
            self.did_safe_exit = true;
            return true;
        }
        false
    }

    pub(crate) fn advance_turn_index(&mut self) {
        self.current_turn_index += 1;
    }

    // Patching

    /// Starts looking ahead: returns the execution fields to roll back to
    /// and routes global/counter writes into a fresh patch.
    pub(crate) fn start_patching(&mut self) -> Checkpoint {
        self.patch = Some(StatePatch::new());
        Checkpoint {
            flow: self.flow.clone(),
            evaluation_stack: self.evaluation_stack.clone(),
            diverted_pointer: self.diverted_pointer.clone(),
            current_turn_index: self.current_turn_index,
            story_seed: self.story_seed,
            previous_random: self.previous_random,
            did_safe_exit: self.did_safe_exit,
            text: self.current_text(),
            tag_count: self.current_tags().len(),
        }
    }

    /// Rolls execution back to `checkpoint` and drops the patch unapplied.
    pub(crate) fn restore_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.flow = checkpoint.flow;
        self.evaluation_stack = checkpoint.evaluation_stack;
        self.diverted_pointer = checkpoint.diverted_pointer;
        self.current_turn_index = checkpoint.current_turn_index;
        self.story_seed = checkpoint.story_seed;
        self.previous_random = checkpoint.previous_random;
        self.did_safe_exit = checkpoint.did_safe_exit;
        self.patch = None;
    }

    /// Commits the active patch into the base globals and counters.
    pub(crate) fn apply_any_patch(&mut self) {
        let Some(patch) = self.patch.take() else {
            return;
        };
        for (name, value) in patch.globals() {
            self.variables.apply_global(name, value.clone());
        }
        for name in patch.changed_variables() {
            self.variables.mark_changed(name);
        }
        for (path, count) in patch.visit_counts() {
            self.visit_counts.insert(path.clone(), *count);
        }
        for (path, index) in patch.turn_indices() {
            self.turn_indices.insert(path.clone(), *index);
        }
    }
}

#[cfg(test)]
mod output_test;
