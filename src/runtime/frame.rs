use std::{collections::BTreeMap, rc::Rc};

use crate::runtime::{pointer::Pointer, value::Value};

/// Why a frame was pushed. The numeric values are the `type` field of saved
/// frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PushPopType {
    Tunnel = 0,
    Function = 1,
    FunctionEvaluationFromGame = 2,
}

impl TryFrom<i64> for PushPopType {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PushPopType::Tunnel),
            1 => Ok(PushPopType::Function),
            2 => Ok(PushPopType::FunctionEvaluationFromGame),
            other => Err(other),
        }
    }
}

/// One call-stack element: where execution is, plus the locals of the
/// tunnel or function that pushed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub current_pointer: Pointer,
    pub in_expression_evaluation: bool,
    pub temporary_variables: BTreeMap<Rc<str>, Value>,
    pub push_type: PushPopType,
    /// Evaluation stack height when pushed, used to tell whether a function
    /// produced a return value.
    pub evaluation_stack_height_when_pushed: usize,
    /// Output stream length when a function was pushed, or `-1` once the
    /// function has produced real text. Used to trim the whitespace around
    /// function output.
    pub function_start_in_output_stream: i32,
}

impl Frame {
    pub fn new(push_type: PushPopType, pointer: Pointer, in_expression_evaluation: bool) -> Self {
        Self {
            current_pointer: pointer,
            in_expression_evaluation,
            temporary_variables: BTreeMap::new(),
            push_type,
            evaluation_stack_height_when_pushed: 0,
            function_start_in_output_stream: 0,
        }
    }
}
