use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use tracing::debug;

use crate::{
    runtime::{
        call_stack::retain_list_origins, error::StoryError, object::VariableAssignment,
        value::Value,
    },
    state::StoryState,
};

/// Global variables and their declared defaults.
#[derive(Debug, Clone, Default)]
pub struct VariablesState {
    globals: BTreeMap<Rc<str>, Value>,
    default_globals: Option<BTreeMap<Rc<str>, Value>>,
    changed: BTreeSet<String>,
}

impl VariablesState {
    pub fn globals(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.globals.iter()
    }

    pub fn global_exists(&self, name: &str) -> bool {
        self.globals.contains_key(name)
            || self
                .default_globals
                .as_ref()
                .is_some_and(|defaults| defaults.contains_key(name))
    }

    pub fn default_value(&self, name: &str) -> Option<&Value> {
        self.default_globals.as_ref()?.get(name)
    }

    /// Remembers the current globals as the declared defaults. Saves only
    /// write globals that differ from these.
    pub fn snapshot_default_globals(&mut self) {
        self.default_globals = Some(self.globals.clone());
    }

    pub(crate) fn insert_loaded_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Replaces the globals with the defaults, ready for loaded values to be
    /// layered on top.
    pub(crate) fn reset_to_defaults(&mut self) {
        if let Some(defaults) = &self.default_globals {
            self.globals = defaults.clone();
        }
    }

    pub(crate) fn apply_global(&mut self, name: &Rc<str>, value: Value) {
        self.globals.insert(name.clone(), value);
    }

    pub(crate) fn mark_changed(&mut self, name: &str) {
        self.changed.insert(name.to_string());
    }

    /// Names of globals changed since the last call.
    pub(crate) fn take_changed(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.changed)
    }
}

impl StoryState {
    /// Value of a global as the host sees it.
    pub fn global_variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.patch.as_ref().and_then(|p| p.global(name)) {
            return Some(value.clone());
        }
        self.variables
            .globals
            .get(name)
            .or_else(|| self.variables.default_value(name))
            .cloned()
    }

    /// Sets a declared global from the host.
    pub fn set_global_variable(&mut self, name: &str, value: Value) -> Result<(), StoryError> {
        if !self
            .variables
            .default_globals
            .as_ref()
            .is_some_and(|defaults| defaults.contains_key(name))
        {
            return Err(StoryError::runtime(format!(
                "cannot assign to a variable ({name}) that hasn't been declared in the story"
            )));
        }
        self.set_global(name, value);
        Ok(())
    }

    /// Reads a variable, following a variable pointer to its target.
    pub(crate) fn variable_with_name(&self, name: &str, context_index: i32) -> Option<Value> {
        let value = self.raw_variable_with_name(name, context_index)?;
        match value {
            Value::VariablePointer {
                name,
                context_index,
            } => self.variable_with_name(&name, context_index),
            other => Some(other),
        }
    }

    pub(crate) fn raw_variable_with_name(&self, name: &str, context_index: i32) -> Option<Value> {
        if context_index == 0 || context_index == -1 {
            if let Some(value) = self.patch.as_ref().and_then(|p| p.global(name)) {
                return Some(value.clone());
            }
            if let Some(value) = self.variables.globals.get(name) {
                return Some(value.clone());
            }
            if let Some(value) = self.variables.default_value(name) {
                return Some(value.clone());
            }
            if let Some(list) = self.list_definitions.single_item_list(name) {
                return Some(Value::List(list));
            }
        }
        self.flow
            .call_stack
            .temporary_variable(name, context_index)
            .cloned()
    }

    pub(crate) fn assign(
        &mut self,
        assignment: &VariableAssignment,
        mut value: Value,
    ) -> Result<(), StoryError> {
        let mut name: Rc<str> = assignment.name.clone();
        let mut context_index = -1;
        let mut set_global = if assignment.is_new_declaration {
            assignment.is_global
        } else {
            self.variables.global_exists(&name)
        };

        if assignment.is_new_declaration {
            if let Value::VariablePointer {
                name,
                context_index,
            } = &value
            {
                value = self.resolve_variable_pointer(name, *context_index);
            }
        } else {
            // Assigning through a by-reference parameter writes to its target.
            while let Some(Value::VariablePointer {
                name: target,
                context_index: target_context,
            }) = self.raw_variable_with_name(&name, context_index)
            {
                name = target;
                context_index = target_context;
                set_global = context_index == 0;
            }
        }

        if set_global {
            self.set_global(&name, value);
            Ok(())
        } else {
            self.flow.call_stack.set_temporary_variable(
                &name,
                value,
                assignment.is_new_declaration,
                context_index,
            )
        }
    }

    pub(crate) fn set_global(&mut self, name: &str, mut value: Value) {
        let old = self
            .patch
            .as_ref()
            .and_then(|p| p.global(name))
            .or_else(|| self.variables.globals.get(name))
            .cloned();
        if let Some(old) = &old {
            retain_list_origins(old, &mut value);
        }
        let changed = old.as_ref().is_some_and(|old| *old != value);

        match &mut self.patch {
            Some(patch) => {
                patch.set_global(name, value);
                if changed {
                    patch.add_changed_variable(name);
                }
            }
            None => {
                self.variables.globals.insert(name.into(), value);
                if changed {
                    self.variables.mark_changed(name);
                }
            }
        }
        if changed {
            debug!(variable = name, "global changed");
        }
    }

    /// Pins a variable pointer to the exact global or call-stack element it
    /// refers to. Pointers to pointers collapse to the final target.
    pub(crate) fn resolve_variable_pointer(&self, name: &str, context_index: i32) -> Value {
        let context_index = if context_index == -1 {
            self.context_index_of_variable_named(name)
        } else {
            context_index
        };
        match self.raw_variable_with_name(name, context_index) {
            Some(pointer @ Value::VariablePointer { .. }) => pointer,
            _ => Value::VariablePointer {
                name: name.into(),
                context_index,
            },
        }
    }

    // Called while the callee's frame is already pushed, so the 0-based
    // index of the current element is the 1-based context of the caller.
    fn context_index_of_variable_named(&self, name: &str) -> i32 {
        if self.variables.global_exists(name) {
            0
        } else {
            self.flow.call_stack.current_element_index() as i32
        }
    }
}
