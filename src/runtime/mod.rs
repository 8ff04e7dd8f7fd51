//! Runtime core types and story execution.
//!
//! # Ownership
//! The compiled content tree is immutable once built. Containers own their
//! children through `Rc` and reach their parent through a `Weak`, so the
//! tree never forms a strong cycle. Pointers, frames and choices hold `Rc`
//! handles into the tree; the tree itself never points back at runtime
//! state.
use crate::runtime::value::Value;

pub mod call_stack;
pub mod choice;
pub mod container;
pub mod control_command;
pub mod debug_metadata;
pub mod error;
pub mod frame;
pub mod list;
pub mod native_function;
pub mod object;
pub mod path;
pub mod pointer;
pub mod prng;
pub mod story;
pub mod value;

/// Host function bound to an `EXTERNAL` declaration. Returning `None`
/// means the function produced no value.
pub type ExternalFn = Box<dyn FnMut(&[Value]) -> Result<Option<Value>, String>>;

/// Callback run with a global's name and new value after it changes.
pub type VariableObserver = Box<dyn FnMut(&str, &Value)>;

#[cfg(test)]
mod call_stack_test;
#[cfg(test)]
mod container_test;
#[cfg(test)]
mod list_test;
#[cfg(test)]
mod path_test;
