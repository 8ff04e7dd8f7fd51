use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use crate::runtime::value::Value;

/// Copy-on-write overlay over the globals and counters, active while the
/// engine looks ahead past a newline. Reads consult the patch first; writes
/// land only here until the patch is merged or dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    globals: BTreeMap<Rc<str>, Value>,
    changed_variables: BTreeSet<String>,
    visit_counts: BTreeMap<String, i32>,
    turn_indices: BTreeMap<String, i32>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn add_changed_variable(&mut self, name: &str) {
        self.changed_variables.insert(name.to_string());
    }

    pub fn visit_count(&self, container_path: &str) -> Option<i32> {
        self.visit_counts.get(container_path).copied()
    }

    pub fn set_visit_count(&mut self, container_path: &str, count: i32) {
        self.visit_counts.insert(container_path.to_string(), count);
    }

    pub fn turn_index(&self, container_path: &str) -> Option<i32> {
        self.turn_indices.get(container_path).copied()
    }

    pub fn set_turn_index(&mut self, container_path: &str, index: i32) {
        self.turn_indices.insert(container_path.to_string(), index);
    }

    pub fn globals(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.globals.iter()
    }

    pub fn changed_variables(&self) -> impl Iterator<Item = &String> {
        self.changed_variables.iter()
    }

    pub fn visit_counts(&self) -> impl Iterator<Item = (&String, &i32)> {
        self.visit_counts.iter()
    }

    pub fn turn_indices(&self) -> impl Iterator<Item = (&String, &i32)> {
        self.turn_indices.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
            && self.changed_variables.is_empty()
            && self.visit_counts.is_empty()
            && self.turn_indices.is_empty()
    }
}
