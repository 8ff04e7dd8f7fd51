use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::runtime::{
    container::Container,
    error::StoryError,
    frame::PushPopType,
    object::{Content, EvalItem},
    pointer::Pointer,
    value::Value,
};

use super::{ExternalBinding, Story};

/// What a function evaluated from the host returned and printed.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResult {
    pub value: Option<Value>,
    pub text: String,
}

fn check_host_arguments(args: &[Value]) -> Result<(), StoryError> {
    match args
        .iter()
        .find(|arg| matches!(arg, Value::DivertTarget(_) | Value::VariablePointer { .. }))
    {
        Some(arg) => Err(StoryError::Type(format!(
            "ink arguments passed from the host must be int, float, string, bool or list, found {}",
            arg.type_name()
        ))),
        None => Ok(()),
    }
}

fn collect_external_names(container: &Container, names: &mut BTreeSet<String>) {
    for content in container.content() {
        match content {
            Content::Container(inner) => collect_external_names(inner, names),
            Content::Divert(divert) if divert.is_external => {
                if let Some(path) = divert.target_path() {
                    names.insert(path.to_string());
                }
            }
            _ => {}
        }
    }
    for inner in container.named_only() {
        collect_external_names(inner, names);
    }
}

impl Story {
    /// Binds a host function to an `EXTERNAL` declaration. Functions that are
    /// not `lookahead_safe` are never run while the engine is looking past
    /// the end of a line.
    pub fn bind_external_function(
        &mut self,
        name: &str,
        function: impl FnMut(&[Value]) -> Result<Option<Value>, String> + 'static,
        lookahead_safe: bool,
    ) {
        debug!(name, lookahead_safe, "external function bound");
        self.externals.insert(
            name.to_string(),
            ExternalBinding {
                function: Box::new(function),
                lookahead_safe,
            },
        );
    }

    pub fn unbind_external_function(&mut self, name: &str) -> bool {
        self.externals.remove(name).is_some()
    }

    pub(super) fn call_external_function(
        &mut self,
        name: &str,
        arg_count: usize,
    ) -> Result<(), StoryError> {
        match self.externals.get(name) {
            Some(binding) if !binding.lookahead_safe && self.checkpoint.is_some() => {
                self.saw_lookahead_unsafe_function_after_newline = true;
                return Ok(());
            }
            Some(_) => {}
            None => {
                if !self.allow_external_function_fallbacks {
                    return Err(StoryError::runtime(format!(
                        "trying to call EXTERNAL function '{name}' which has not been bound (and ink fallbacks disabled)"
                    )));
                }
                let fallback = self.knot_container_with_name(name).ok_or_else(|| {
                    StoryError::runtime(format!(
                        "trying to call EXTERNAL function '{name}' which has not been bound, and fallback ink function could not be found"
                    ))
                })?;
                trace!(name, "calling ink fallback for external function");
                let height = self.state.evaluation_stack().len();
                let output_length = self.state.output_stream().len();
                self.state
                    .call_stack_mut()
                    .push(PushPopType::Function, height, output_length);
                self.state.set_diverted_pointer(Pointer::start_of(fallback));
                return Ok(());
            }
        }

        let args = self
            .state
            .pop_evaluation_stack_n(arg_count)?
            .into_iter()
            .map(|item| match item {
                EvalItem::Value(value) => Ok(value),
                other => Err(StoryError::Type(format!(
                    "argument to EXTERNAL function '{name}' is not a value: {other:?}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let binding = self
            .externals
            .get_mut(name)
            .ok_or_else(|| StoryError::runtime(format!("external function '{name}' unbound")))?;
        trace!(name, args = args.len(), "calling external function");
        let result = (binding.function)(&args)
            .map_err(|message| StoryError::runtime(format!("external function '{name}' failed: {message}")))?;

        match result {
            Some(value) => self.state.push_evaluation_stack(value),
            None => self.state.push_evaluation_stack(EvalItem::Void),
        }
        Ok(())
    }

    /// Checks that every `EXTERNAL` the story calls has a binding or, when
    /// fallbacks are allowed, an ink function of the same name.
    pub fn validate_external_bindings(&mut self) -> Result<(), StoryError> {
        let mut names = BTreeSet::new();
        collect_external_names(&self.root, &mut names);

        let missing: Vec<String> = names
            .into_iter()
            .filter(|name| {
                !self.externals.contains_key(name)
                    && (!self.allow_external_function_fallbacks
                        || self.knot_container_with_name(name).is_none())
            })
            .collect();

        if !missing.is_empty() {
            let names = missing
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", ");
            let reason = if self.allow_external_function_fallbacks {
                ", and no fallback ink function found"
            } else {
                " (ink fallbacks disabled)"
            };
            let plural = if missing.len() > 1 { "s" } else { "" };
            return Err(StoryError::runtime(format!(
                "missing function binding for external{plural}: {names}{reason}"
            )));
        }

        self.has_validated_externals = true;
        Ok(())
    }

    /// Pushes host supplied arguments for a function or path call. Nothing
    /// is pushed if any argument is rejected.
    pub(super) fn push_arguments(&mut self, args: &[Value]) -> Result<(), StoryError> {
        check_host_arguments(args)?;
        for arg in args {
            self.state.push_evaluation_stack(arg.clone());
        }
        Ok(())
    }

    /// Runs an ink function to completion outside the normal flow and
    /// returns its result and any text it printed. The story's own output
    /// is left as it was.
    pub fn evaluate_function(&mut self, name: &str, args: &[Value]) -> Result<FunctionResult, StoryError> {
        if name.trim().is_empty() {
            return Err(StoryError::runtime("function name is empty"));
        }
        let function = self
            .knot_container_with_name(name)
            .ok_or_else(|| StoryError::runtime(format!("function doesn't exist: '{name}'")))?;
        if !self.has_validated_externals {
            self.validate_external_bindings()?;
        }
        check_host_arguments(args)?;
        debug!(name, args = args.len(), "evaluating function");

        let saved_flow = self.state.flow().clone();
        let saved_errors = self.state.current_errors().len();
        let did_safe_exit = self.state.did_safe_exit();
        self.state.reset_output();

        let height = self.state.evaluation_stack().len();
        self.state
            .call_stack_mut()
            .push(PushPopType::FunctionEvaluationFromGame, height, 0);
        self.state.set_current_pointer(Pointer::start_of(function));
        self.visit_changed_containers_due_to_divert();
        self.push_arguments(args)?;

        let mut text = String::new();
        let mut result = Ok(());
        while self.state.can_continue() {
            if let Err(err) = self.continue_internal() {
                result = Err(err);
                break;
            }
            text.push_str(&self.state.current_text());
        }

        if let Err(err) = result {
            // The failure belongs to the host call, not to the main flow.
            *self.state.flow_mut() = saved_flow;
            self.state.evaluation_stack_mut().truncate(height);
            self.state.truncate_errors(saved_errors);
            self.state.set_did_safe_exit(did_safe_exit);
            return Err(err);
        }
        self.state.flow_mut().output_stream = saved_flow.output_stream;

        let value = self.complete_function_evaluation_from_game()?;
        Ok(FunctionResult { value, text })
    }

    /// Unwinds the frame pushed by `evaluate_function`, returning the first
    /// value left above the frame's stack height.
    fn complete_function_evaluation_from_game(&mut self) -> Result<Option<Value>, StoryError> {
        let call_stack = self.state.call_stack();
        if !call_stack.element_is_evaluate_from_game() {
            return Err(StoryError::stack(format!(
                "expected external function evaluation to be complete. Stack trace: {}",
                call_stack.call_stack_trace()
            )));
        }

        let height = call_stack.current_element().evaluation_stack_height_when_pushed;
        let mut returned = None;
        while self.state.evaluation_stack().len() > height {
            let popped = self.state.pop_evaluation_stack()?;
            returned.get_or_insert(popped);
        }
        self.state
            .pop_call_stack(Some(PushPopType::FunctionEvaluationFromGame))?;

        Ok(match returned {
            Some(EvalItem::Value(Value::DivertTarget(path))) => {
                Some(Value::string(&path.to_string()))
            }
            Some(EvalItem::Value(value)) => Some(value),
            _ => None,
        })
    }
}
