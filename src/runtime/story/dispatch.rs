use std::rc::Rc;

use crate::runtime::{
    container::{Container, ContentRef},
    control_command::ControlCommand,
    error::StoryError,
    frame::PushPopType,
    object::{Content, Divert, DivertDestination, EvalItem, OutputItem, VariableReference},
    path::Path,
    pointer::Pointer,
    value::Value,
};

use super::Story;

/// Absolute form of `target` as written on the object at `origin`.
pub(super) fn absolute_path(origin: &Path, target: &Path) -> Path {
    if target.is_relative() {
        origin.by_appending_path(target)
    } else {
        target.clone()
    }
}

impl Story {
    /// Executes one content item.
    pub(super) fn step(&mut self) -> Result<(), StoryError> {
        let mut pointer = self.state.current_pointer();
        if pointer.is_null() {
            return Ok(());
        }

        // Containers are entered until their first leaf.
        while let Some(container) = pointer.resolve().and_then(|r| r.as_container().cloned()) {
            self.visit_container(&container, true);
            if container.content().is_empty() {
                break;
            }
            pointer = Pointer::start_of(container);
        }
        self.state.set_current_pointer(pointer.clone());

        let current = pointer.resolve();
        if let Some(current) = &current {
            self.trace_step(current);
        }
        let Some(content) = current.as_ref().and_then(ContentRef::content).cloned() else {
            self.next_content()?;
            return Ok(());
        };
        let origin = pointer.path().unwrap_or_default();

        let is_logic_or_flow_control = self.perform_logic_and_flow_control(&content, &origin)?;
        if self.state.current_pointer().is_null() {
            return Ok(());
        }

        match &content {
            Content::ChoicePoint(choice_point) => {
                if let Some(choice) = self.process_choice(choice_point, &origin)? {
                    self.state.generated_choices_mut().push(choice);
                }
            }
            _ if is_logic_or_flow_control => {}
            _ => self.push_content(content.clone())?,
        }

        self.next_content()?;

        if content == Content::Command(ControlCommand::StartThread) {
            self.state.call_stack_mut().push_thread();
        }
        Ok(())
    }

    /// Sends a plain content item to the evaluation stack or the output.
    fn push_content(&mut self, content: Content) -> Result<(), StoryError> {
        let content = match content {
            Content::Value(Value::VariablePointer {
                name,
                context_index: -1,
            }) => {
                let context_index = self.state.call_stack().context_for_variable_named(&name);
                Content::Value(Value::VariablePointer {
                    name,
                    context_index,
                })
            }
            other => other,
        };

        if self.state.in_expression_evaluation() {
            let item = match content {
                Content::Value(value) => EvalItem::Value(value),
                Content::Void => EvalItem::Void,
                Content::Tag(text) => EvalItem::Tag(text),
                other => {
                    return Err(StoryError::runtime(format!(
                        "{} can't be evaluated as an expression",
                        other.kind()
                    )));
                }
            };
            self.state.push_evaluation_stack(item);
        } else {
            let item = match content {
                Content::Value(value) => OutputItem::Value(value),
                Content::Glue => OutputItem::Glue,
                Content::Tag(text) => OutputItem::Tag(text),
                _ => return Ok(()),
            };
            self.state.push_to_output_stream(item);
        }
        Ok(())
    }

    /// Moves the pointer past the current item, following a pending divert
    /// or unwinding finished functions and threads.
    pub(super) fn next_content(&mut self) -> Result<bool, StoryError> {
        self.state.set_previous_pointer(self.state.current_pointer());

        let diverted = self.state.take_diverted_pointer();
        if !diverted.is_null() {
            self.state.set_current_pointer(diverted);
            self.visit_changed_containers_due_to_divert();
            if !self.state.current_pointer().is_null() {
                return Ok(true);
            }
        }

        let incremented = self.increment_content_pointer();
        if !incremented {
            let mut did_pop = false;
            if self.state.call_stack().can_pop_type(PushPopType::Function) {
                self.state.pop_call_stack(Some(PushPopType::Function))?;
                // Falling off the end of a function returns nothing.
                if self.state.in_expression_evaluation() {
                    self.state.push_evaluation_stack(EvalItem::Void);
                }
                did_pop = true;
            } else if self.state.call_stack().can_pop_thread() {
                self.state.call_stack_mut().pop_thread()?;
                did_pop = true;
            } else {
                self.state.try_exit_function_evaluation_from_game();
            }

            if did_pop && !self.state.current_pointer().is_null() {
                self.next_content()?;
            }
        }
        Ok(incremented)
    }

    fn increment_content_pointer(&mut self) -> bool {
        let mut pointer = self.state.current_pointer();
        if pointer.is_null() {
            return false;
        }
        pointer.index += 1;

        let mut successful = true;
        while let Some(container) = pointer.container.clone() {
            if (pointer.index as usize) < container.content().len() {
                break;
            }
            successful = false;
            let Some(ancestor) = container.parent() else {
                break;
            };
            let Some(index) = ancestor.index_of(&container) else {
                break;
            };
            pointer = Pointer::new(ancestor, index as i32 + 1);
            successful = true;
        }

        if !successful {
            pointer = Pointer::null();
        }
        self.state.set_current_pointer(pointer);
        successful
    }

    fn visit_container(&mut self, container: &Container, at_start: bool) {
        if !container.counting_at_start_only() || at_start {
            if container.visits_should_be_counted() {
                self.state.increment_visit_count(container);
            }
            if container.turn_index_should_be_counted() {
                self.state.record_turn_index_visit(container);
            }
        }
    }

    /// Counts a visit to every container newly entered by a jump, walking
    /// up from the target until reaching one that was already active.
    pub(super) fn visit_changed_containers_due_to_divert(&mut self) {
        let previous = self.state.previous_pointer();
        let pointer = self.state.current_pointer();
        if pointer.is_null() || pointer.index == -1 {
            return;
        }

        let mut previous_containers: Vec<Rc<Container>> = Vec::new();
        if !previous.is_null() {
            let mut ancestor = previous
                .resolve()
                .and_then(|r| r.as_container().cloned())
                .or_else(|| previous.container.clone());
            while let Some(container) = ancestor {
                ancestor = container.parent();
                previous_containers.push(container);
            }
        }

        let Some(mut child) = pointer.resolve() else {
            return;
        };
        let mut ancestor = match &child {
            ContentRef::Container(container) => container.parent(),
            ContentRef::Item { container, .. } => Some(container.clone()),
        };
        let mut all_children_entered_at_start = true;

        while let Some(container) = ancestor {
            let already_active = previous_containers
                .iter()
                .any(|previous| Rc::ptr_eq(previous, &container));
            if already_active && !container.counting_at_start_only() {
                break;
            }

            let child_is_first = match &child {
                ContentRef::Item { index, .. } => *index == 0,
                ContentRef::Container(inner) => container.index_of(inner) == Some(0),
            };
            let entering_at_start = child_is_first && all_children_entered_at_start;
            if !entering_at_start {
                all_children_entered_at_start = false;
            }
            self.visit_container(&container, entering_at_start);

            ancestor = container.parent();
            child = ContentRef::Container(container);
        }
    }

    /// Handles diverts, variable access, operators and control commands.
    /// Returns `false` for content that should be pushed as is.
    fn perform_logic_and_flow_control(
        &mut self,
        content: &Content,
        origin: &Path,
    ) -> Result<bool, StoryError> {
        match content {
            Content::Divert(divert) => {
                self.perform_divert(divert, origin)?;
                Ok(true)
            }
            Content::Command(command) => {
                self.perform_control_command(*command)?;
                Ok(true)
            }
            Content::VariableAssignment(assignment) => {
                let value = self.state.pop_value()?;
                self.state.assign(assignment, value)?;
                Ok(true)
            }
            Content::VariableReference(VariableReference::Name(name)) => {
                let value = match self.state.variable_with_name(name, -1) {
                    Some(value) => value,
                    None => {
                        self.state.add_warning(format!(
                            "variable not found: '{name}'. Using default value of 0 (false)"
                        ));
                        Value::Int(0)
                    }
                };
                self.state.push_evaluation_stack(value);
                Ok(true)
            }
            Content::VariableReference(VariableReference::ReadCount(path)) => {
                let target = absolute_path(origin, path);
                let container = self
                    .root
                    .content_at_path(&target, 0, target.len())
                    .container()
                    .cloned()
                    .ok_or_else(|| {
                        StoryError::Addressing(format!(
                            "no container found for read count of '{target}'"
                        ))
                    })?;
                let count = self.state.visit_count_for_container(&container)?;
                self.state.push_evaluation_stack(Value::Int(count));
                Ok(true)
            }
            Content::NativeCall(function) => {
                let params = self
                    .state
                    .pop_evaluation_stack_n(function.arity())?
                    .into_iter()
                    .map(|item| match item {
                        EvalItem::Value(value) => Ok(value),
                        EvalItem::Void => Err(StoryError::Type(format!(
                            "attempting to perform {function} on a void value. Did you forget to 'return' a value from a function you called here?"
                        ))),
                        EvalItem::Tag(text) => Err(StoryError::Type(format!(
                            "attempting to perform {function} on tag '{text}'"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let result = function.call(&params, self.state.list_definitions())?;
                self.state.push_evaluation_stack(result);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn perform_divert(&mut self, divert: &Divert, origin: &Path) -> Result<(), StoryError> {
        if divert.is_conditional && !self.state.pop_value()?.is_truthy()? {
            return Ok(());
        }

        match &divert.destination {
            DivertDestination::Variable(name) => {
                let target = match self.state.variable_with_name(name, -1) {
                    Some(Value::DivertTarget(path)) => path,
                    None => {
                        return Err(StoryError::runtime(format!(
                            "tried to divert using a target from a variable that could not be found ({name})"
                        )));
                    }
                    Some(Value::Int(0)) => {
                        return Err(StoryError::runtime(format!(
                            "tried to divert to a target from a variable, but the variable ({name}) didn't contain a divert target, it was empty/null (the value 0)"
                        )));
                    }
                    Some(other) => {
                        return Err(StoryError::runtime(format!(
                            "tried to divert to a target from a variable, but the variable ({name}) didn't contain a divert target, it contained '{other}'"
                        )));
                    }
                };
                let pointer = self.state.pointer_at_path(&target)?;
                self.state.set_diverted_pointer(pointer);
            }
            DivertDestination::Path(path) if divert.is_external => {
                return self.call_external_function(&path.to_string(), divert.external_args);
            }
            DivertDestination::Path(path) => {
                let mut pointer = self.state.pointer_at_path(&absolute_path(origin, path))?;
                if pointer.index == -1 {
                    pointer.index = 0;
                }
                self.state.set_diverted_pointer(pointer);
            }
        }

        if let Some(push_type) = divert.stack_push {
            let height = self.state.evaluation_stack().len();
            let output_length = self.state.output_stream().len();
            self.state
                .call_stack_mut()
                .push(push_type, height, output_length);
        }

        if self.state.diverted_pointer().is_null() {
            return Err(StoryError::Addressing(format!(
                "divert resolution failed: {divert:?}"
            )));
        }
        Ok(())
    }
}
