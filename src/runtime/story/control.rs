use tracing::trace;

use crate::{
    runtime::{
        control_command::ControlCommand,
        error::StoryError,
        frame::PushPopType,
        list::InkList,
        object::{EvalItem, OutputItem},
        pointer::Pointer,
        prng::SubtractiveRng,
        value::Value,
    },
    state::output::clean_output_whitespace,
};

use super::Story;

impl Story {
    #[cold]
    #[inline(never)]
    fn expected_int_err(what: &str, found: &Value) -> StoryError {
        StoryError::Type(format!("invalid value for {what}: expected an int, found {}", found.type_name()))
    }

    fn pop_int(&mut self, what: &str) -> Result<i32, StoryError> {
        let value = self.state.pop_value()?;
        value
            .as_int()
            .ok_or_else(|| Self::expected_int_err(what, &value))
    }

    pub(super) fn perform_control_command(&mut self, command: ControlCommand) -> Result<(), StoryError> {
        match command {
            ControlCommand::EvalStart => {
                if self.state.in_expression_evaluation() {
                    return Err(StoryError::runtime("already in expression evaluation"));
                }
                self.state.set_in_expression_evaluation(true);
            }
            ControlCommand::EvalEnd => {
                if !self.state.in_expression_evaluation() {
                    return Err(StoryError::runtime("not in expression evaluation"));
                }
                self.state.set_in_expression_evaluation(false);
            }
            ControlCommand::EvalOutput => {
                if !self.state.evaluation_stack().is_empty() {
                    match self.state.pop_evaluation_stack()? {
                        EvalItem::Value(value) => {
                            self.state
                                .push_to_output_stream(OutputItem::text(&value.to_string()));
                        }
                        EvalItem::Tag(text) => self.state.push_to_output_stream(OutputItem::Tag(text)),
                        EvalItem::Void => {}
                    }
                }
            }
            ControlCommand::NoOp | ControlCommand::StartThread => {}
            ControlCommand::Duplicate => {
                let top = self
                    .state
                    .peek_evaluation_stack()
                    .cloned()
                    .ok_or_else(|| StoryError::stack("nothing to duplicate on the evaluation stack"))?;
                self.state.push_evaluation_stack(top);
            }
            ControlCommand::PopEvaluatedValue => {
                self.state.pop_evaluation_stack()?;
            }
            ControlCommand::PopFunction => self.pop_frame(PushPopType::Function)?,
            ControlCommand::PopTunnel => self.pop_frame(PushPopType::Tunnel)?,
            ControlCommand::BeginString => {
                if !self.state.in_expression_evaluation() {
                    return Err(StoryError::runtime(
                        "expected to be in an expression when evaluating a string",
                    ));
                }
                self.state
                    .push_to_output_stream(OutputItem::Command(ControlCommand::BeginString));
                self.state.set_in_expression_evaluation(false);
            }
            ControlCommand::EndString => self.end_string(),
            ControlCommand::BeginTag => {
                self.state
                    .push_to_output_stream(OutputItem::Command(ControlCommand::BeginTag));
            }
            ControlCommand::EndTag => {
                if self.state.in_string_evaluation() {
                    self.end_choice_tag()?;
                } else {
                    self.state
                        .push_to_output_stream(OutputItem::Command(ControlCommand::EndTag));
                }
            }
            ControlCommand::ChoiceCount => {
                let count = self.state.generated_choices().len() as i32;
                self.state.push_evaluation_stack(Value::Int(count));
            }
            ControlCommand::Turns => {
                let turns = self.state.current_turn_index() + 1;
                self.state.push_evaluation_stack(Value::Int(turns));
            }
            ControlCommand::TurnsSince | ControlCommand::ReadCount => self.push_count(command)?,
            ControlCommand::Random => self.random()?,
            ControlCommand::SeedRandom => {
                let seed = self.pop_int("the seed passed to SEED_RANDOM")?;
                self.state.set_story_seed(seed);
                self.state.push_evaluation_stack(EvalItem::Void);
            }
            ControlCommand::VisitIndex => {
                let container = self
                    .state
                    .current_pointer()
                    .container
                    .ok_or_else(|| StoryError::runtime("visit index read outside any container"))?;
                let count = self.state.visit_count_for_container(&container)? - 1;
                self.state.push_evaluation_stack(Value::Int(count));
            }
            ControlCommand::SequenceShuffleIndex => {
                let index = self.next_sequence_shuffle_index()?;
                self.state.push_evaluation_stack(Value::Int(index));
            }
            ControlCommand::Done => {
                if self.state.call_stack().can_pop_thread() {
                    self.state.call_stack_mut().pop_thread()?;
                } else {
                    self.state.set_did_safe_exit(true);
                    self.state.set_current_pointer(Pointer::null());
                }
            }
            ControlCommand::End => self.state.force_end(),
            ControlCommand::ListFromInt => self.list_from_int()?,
            ControlCommand::ListRange => self.list_range()?,
            ControlCommand::ListRandom => self.list_random()?,
        }
        Ok(())
    }

    /// `~ret` and `->->`.
    fn pop_frame(&mut self, pop_type: PushPopType) -> Result<(), StoryError> {
        let mut override_target = None;
        if pop_type == PushPopType::Tunnel {
            match self.state.pop_evaluation_stack()? {
                EvalItem::Value(Value::DivertTarget(path)) => override_target = Some(path),
                EvalItem::Void => {}
                other => {
                    return Err(StoryError::stack(format!(
                        "expected void if ->-> doesn't override target, found {other:?}"
                    )));
                }
            }
        }

        if self.state.try_exit_function_evaluation_from_game() {
            return Ok(());
        }

        let call_stack = self.state.call_stack();
        if call_stack.current_element().push_type != pop_type || !call_stack.can_pop() {
            let expected = if call_stack.can_pop() {
                frame_kind_name(pop_type)
            } else {
                "end of flow (-> END or choice)"
            };
            return Err(StoryError::stack(format!(
                "found {}, when expected {expected}",
                frame_kind_name(call_stack.current_element().push_type)
            )));
        }

        self.state.pop_call_stack(None)?;
        if let Some(target) = override_target {
            let pointer = self.state.pointer_at_path(&target)?;
            self.state.set_diverted_pointer(pointer);
        }
        Ok(())
    }

    /// Turns the output captured since `str` into a string value. Tags
    /// written inside the capture stay on the output stream.
    fn end_string(&mut self) {
        let stream = self.state.output_stream();
        let start = stream
            .iter()
            .rposition(|item| *item == OutputItem::Command(ControlCommand::BeginString))
            .unwrap_or(0);

        let mut text = String::new();
        let mut retained = Vec::new();
        for item in &stream[start..] {
            match item {
                OutputItem::Value(Value::String(s)) => text.push_str(s),
                OutputItem::Tag(_) => retained.push(item.clone()),
                _ => {}
            }
        }

        self.state.flow_mut().output_stream.truncate(start);
        for item in retained {
            self.state.push_to_output_stream(item);
        }
        self.state.set_in_expression_evaluation(true);
        self.state.push_evaluation_stack(Value::string(&text));
    }

    /// `/#` inside a string capture: the tag text becomes a tag on the
    /// evaluation stack so the choice can pick it up.
    fn end_choice_tag(&mut self) -> Result<(), StoryError> {
        let stream = self.state.output_stream();
        let mut start = 0;
        let mut parts = Vec::new();
        for (i, item) in stream.iter().enumerate().rev() {
            match item {
                OutputItem::Command(ControlCommand::BeginTag) => {
                    start = i;
                    break;
                }
                OutputItem::Command(_) => {
                    return Err(StoryError::runtime(
                        "unexpected control command while extracting tag from choice",
                    ));
                }
                OutputItem::Value(Value::String(s)) => parts.push(s.clone()),
                _ => {}
            }
        }
        parts.reverse();
        let text = clean_output_whitespace(&parts.concat());

        self.state.flow_mut().output_stream.truncate(start);
        self.state.push_evaluation_stack(EvalItem::Tag(text.into()));
        Ok(())
    }

    /// `turns` since and read count of a divert target popped off the stack.
    fn push_count(&mut self, command: ControlCommand) -> Result<(), StoryError> {
        let target = self.state.pop_value()?;
        let Value::DivertTarget(path) = &target else {
            let note = if matches!(target, Value::Int(_)) {
                ". Did you accidentally pass a read count ('knot_name') instead of a target ('-> knot_name')?"
            } else {
                ""
            };
            return Err(StoryError::Type(format!(
                "TURNS_SINCE / READ_COUNT expected a divert target (knot, stitch, label name), but saw {target}{note}"
            )));
        };

        let result = self.root.content_at_path(path, 0, path.len());
        let container = result.correct_obj().and_then(|obj| obj.as_container()).cloned();
        let count = match container {
            Some(container) if command == ControlCommand::TurnsSince => {
                self.state.turns_since_for_container(&container)?
            }
            Some(container) => self.state.visit_count_for_container(&container)?,
            None => {
                self.state.add_warning(format!(
                    "failed to find container for {command} lookup at {path}"
                ));
                if command == ControlCommand::TurnsSince { -1 } else { 0 }
            }
        };
        self.state.push_evaluation_stack(Value::Int(count));
        Ok(())
    }

    fn next_random(&mut self) -> i32 {
        let seed = self.state.story_seed().wrapping_add(self.state.previous_random());
        let next = SubtractiveRng::new(seed).next_int();
        self.state.set_previous_random(next);
        next
    }

    fn random(&mut self) -> Result<(), StoryError> {
        let max = self.pop_int("the maximum parameter of RANDOM(min, max)")?;
        let min = self.pop_int("the minimum parameter of RANDOM(min, max)")?;

        let range = i64::from(max) - i64::from(min) + 1;
        if range > i64::from(i32::MAX) {
            return Err(StoryError::runtime(
                "RANDOM was called with a range that exceeds the size that ink numbers can use",
            ));
        }
        if range <= 0 {
            return Err(StoryError::runtime(format!(
                "RANDOM was called with minimum as {min} and maximum as {max}. The maximum must be larger"
            )));
        }

        let next = self.next_random();
        let chosen = (i64::from(next) % range + i64::from(min)) as i32;
        trace!(min, max, chosen, "random");
        self.state.push_evaluation_stack(Value::Int(chosen));
        Ok(())
    }

    /// Picks the element a shuffle sequence shows on this pass. Each loop
    /// through the sequence is a fresh permutation seeded from the
    /// sequence's path.
    fn next_sequence_shuffle_index(&mut self) -> Result<i32, StoryError> {
        let element_count = self.pop_int("the number of elements in a shuffle sequence")?;
        let sequence_count = self.pop_int("the visit count of a shuffle sequence")?;
        if element_count <= 0 {
            return Err(StoryError::runtime(format!(
                "shuffle sequence with {element_count} elements"
            )));
        }
        let container = self
            .state
            .current_pointer()
            .container
            .ok_or_else(|| StoryError::runtime("shuffle sequence outside any container"))?;

        let loop_index = sequence_count / element_count;
        let iteration_index = sequence_count % element_count;
        let path_hash = container
            .path()
            .to_string()
            .encode_utf16()
            .fold(0i32, |hash, unit| hash.wrapping_add(i32::from(unit)));
        let seed = path_hash
            .wrapping_add(loop_index)
            .wrapping_add(self.state.story_seed());

        let mut rng = SubtractiveRng::new(seed);
        let mut unpicked: Vec<i32> = (0..element_count).collect();
        for i in 0..=iteration_index {
            let chosen = rng.next_int() as usize % unpicked.len();
            let index = unpicked.remove(chosen);
            if i == iteration_index {
                return Ok(index);
            }
        }
        Err(StoryError::runtime("shuffle sequence index out of range"))
    }

    fn list_from_int(&mut self) -> Result<(), StoryError> {
        let value = self.pop_int("the value of a list element")?;
        let list_name = self.state.pop_value()?;
        let list_name = list_name
            .as_str()
            .ok_or_else(|| StoryError::Type("expected a list name for LIST_FROM_INT".into()))?;

        let definition = self
            .state
            .list_definitions()
            .get(list_name)
            .ok_or_else(|| StoryError::runtime(format!("failed to find LIST called {list_name}")))?;
        let list = match definition.item_with_value(value) {
            Some(item) => InkList::from_item(item, value),
            None => InkList::new(),
        };
        self.state.push_evaluation_stack(Value::List(list));
        Ok(())
    }

    fn list_range(&mut self) -> Result<(), StoryError> {
        let max = self.state.pop_value()?;
        let min = self.state.pop_value()?;
        let Value::List(list) = self.state.pop_value()? else {
            return Err(StoryError::Type(
                "expected list, minimum and maximum for LIST_RANGE".into(),
            ));
        };

        let min = match &min {
            Value::Int(value) => *value,
            Value::List(bound) => bound.min_item().map_or(0, |(_, value)| value),
            _ => 0,
        };
        let max = match &max {
            Value::Int(value) => *value,
            Value::List(bound) => bound.max_item().map_or(i32::MAX, |(_, value)| value),
            _ => i32::MAX,
        };
        self.state
            .push_evaluation_stack(Value::List(list.sub_range(min, max)));
        Ok(())
    }

    fn list_random(&mut self) -> Result<(), StoryError> {
        let Value::List(list) = self.state.pop_value()? else {
            return Err(StoryError::Type("expected list for LIST_RANDOM".into()));
        };

        let result = if list.is_empty() {
            InkList::new()
        } else {
            let next = self.next_random();
            let index = next as usize % list.len();
            match list.iter().nth(index) {
                Some((item, value)) => InkList::from_item(item.clone(), value),
                None => InkList::new(),
            }
        };
        self.state.push_evaluation_stack(Value::List(result));
        Ok(())
    }
}

fn frame_kind_name(push_type: PushPopType) -> &'static str {
    match push_type {
        PushPopType::Function => "function return statement (~ return)",
        PushPopType::Tunnel => "tunnel onwards statement (->->)",
        PushPopType::FunctionEvaluationFromGame => "function evaluation from the game",
    }
}
