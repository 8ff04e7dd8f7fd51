use tracing::debug;

use crate::runtime::{
    choice::{Choice, ChoicePoint},
    error::StoryError,
    object::EvalItem,
    path::Path,
    value::Value,
};

use super::{Story, dispatch::absolute_path};

impl Story {
    /// Turns a choice point into a choice, or `None` when its condition
    /// fails or a once-only choice was already taken.
    pub(super) fn process_choice(
        &mut self,
        choice_point: &ChoicePoint,
        origin: &Path,
    ) -> Result<Option<Choice>, StoryError> {
        let flags = choice_point.flags;
        let mut show = true;
        if flags.has_condition() && !self.state.pop_value()?.is_truthy()? {
            show = false;
        }

        let mut tags = Vec::new();
        let choice_only = if flags.has_choice_only_content() {
            self.pop_choice_string_and_tags(&mut tags)?
        } else {
            String::new()
        };
        let start = if flags.has_start_content() {
            self.pop_choice_string_and_tags(&mut tags)?
        } else {
            String::new()
        };

        let target_path = absolute_path(origin, &choice_point.path_on_choice);
        if flags.once_only() {
            let target = self
                .root
                .content_at_path(&target_path, 0, target_path.len())
                .container()
                .cloned()
                .ok_or_else(|| {
                    StoryError::Addressing(format!("choice target '{target_path}' is not a container"))
                })?;
            if self.state.visit_count_for_container(&target)? > 0 {
                show = false;
            }
        }

        if !show {
            return Ok(None);
        }

        let thread = self.state.call_stack_mut().fork_thread();
        let text = format!("{start}{choice_only}")
            .trim_matches(|c| c == ' ' || c == '\t')
            .to_string();
        Ok(Some(Choice {
            text,
            index: 0,
            target_path,
            source_path: origin.to_string(),
            original_thread_index: thread.thread_index,
            is_invisible_default: flags.is_invisible_default(),
            tags,
            thread_at_generation: thread,
        }))
    }

    /// Pops a string built for choice text, collecting the tags pushed
    /// along with it in their original order.
    fn pop_choice_string_and_tags(&mut self, tags: &mut Vec<String>) -> Result<String, StoryError> {
        let text = match self.state.pop_evaluation_stack()? {
            EvalItem::Value(Value::String(text)) => text.to_string(),
            other => {
                return Err(StoryError::Type(format!(
                    "expected choice text on the evaluation stack, found {other:?}"
                )));
            }
        };
        while let Some(EvalItem::Tag(_)) = self.state.peek_evaluation_stack() {
            if let EvalItem::Tag(tag) = self.state.pop_evaluation_stack()? {
                tags.insert(0, tag.to_string());
            }
        }
        Ok(text)
    }

    /// Takes a fallback choice automatically when it is the only kind of
    /// choice left. Returns whether one was followed.
    pub(super) fn try_follow_default_invisible_choice(&mut self) -> Result<bool, StoryError> {
        let choices = self.state.generated_choices();
        if choices.is_empty() || choices.iter().any(|choice| !choice.is_invisible_default) {
            return Ok(false);
        }

        let choice = choices[0].clone();
        self.state
            .call_stack_mut()
            .set_current_thread(choice.thread_at_generation.clone())?;

        // Look-ahead may roll back, so the thread at generation must stay
        // untouched.
        if self.checkpoint.is_some() {
            let forked = self.state.call_stack_mut().fork_thread();
            self.state.call_stack_mut().set_current_thread(forked)?;
        }

        self.choose_path(&choice.target_path, false)?;
        Ok(true)
    }

    /// Picks one of the current choices by its visible index.
    pub fn choose(&mut self, index: usize) -> Result<(), StoryError> {
        let choice = self
            .state
            .current_choices()
            .nth(index)
            .cloned()
            .ok_or_else(|| StoryError::InvalidChoice {
                index,
                count: self.state.current_choices().count(),
            })?;

        debug!(index, text = %choice.text, target = %choice.target_path, "choice taken");
        self.state
            .call_stack_mut()
            .set_current_thread(choice.thread_at_generation)?;
        self.choose_path(&choice.target_path, true)
    }
}
