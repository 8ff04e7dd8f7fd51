//! Runtime objects: the leaves of the content tree and the items that flow
//! through the evaluation and output streams.
use std::rc::Rc;

use crate::runtime::{
    choice::ChoicePoint, container::Container, control_command::ControlCommand,
    frame::PushPopType, native_function::NativeFunction, path::Path, value::Value,
};

/// One entry of a container's ordered content.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Container(Rc<Container>),
    Value(Value),
    Command(ControlCommand),
    NativeCall(NativeFunction),
    Divert(Divert),
    ChoicePoint(ChoicePoint),
    VariableReference(VariableReference),
    VariableAssignment(VariableAssignment),
    /// Legacy static tag (`{"#": "text"}`).
    Tag(Rc<str>),
    Glue,
    Void,
}

impl Content {
    pub fn text(text: &str) -> Self {
        Content::Value(Value::string(text))
    }

    pub fn as_container(&self) -> Option<&Rc<Container>> {
        match self {
            Content::Container(container) => Some(container),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Content::Container(_) => "Container",
            Content::Value(_) => "Value",
            Content::Command(_) => "ControlCommand",
            Content::NativeCall(_) => "NativeFunctionCall",
            Content::Divert(_) => "Divert",
            Content::ChoicePoint(_) => "ChoicePoint",
            Content::VariableReference(_) => "VariableReference",
            Content::VariableAssignment(_) => "VariableAssignment",
            Content::Tag(_) => "Tag",
            Content::Glue => "Glue",
            Content::Void => "Void",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DivertDestination {
    Path(Path),
    /// Name of a variable holding a divert target.
    Variable(Rc<str>),
}

/// Transfer of control to another place in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Divert {
    pub destination: DivertDestination,
    /// Frame kind pushed before jumping (tunnels and function calls).
    pub stack_push: Option<PushPopType>,
    /// Pops a condition first and only diverts when it is truthy.
    pub is_conditional: bool,
    /// Call to a host-bound function named by the target path.
    pub is_external: bool,
    pub external_args: usize,
}

impl Divert {
    pub fn to_path(path: Path) -> Self {
        Self {
            destination: DivertDestination::Path(path),
            stack_push: None,
            is_conditional: false,
            is_external: false,
            external_args: 0,
        }
    }

    pub fn to_variable(name: &str) -> Self {
        Self {
            destination: DivertDestination::Variable(name.into()),
            ..Self::to_path(Path::default())
        }
    }

    pub fn with_push(mut self, push: PushPopType) -> Self {
        self.stack_push = Some(push);
        self
    }

    pub fn conditional(mut self) -> Self {
        self.is_conditional = true;
        self
    }

    pub fn external(mut self, args: usize) -> Self {
        self.is_external = true;
        self.external_args = args;
        self
    }

    pub fn target_path(&self) -> Option<&Path> {
        match &self.destination {
            DivertDestination::Path(path) => Some(path),
            DivertDestination::Variable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableReference {
    /// Reads a variable (`VAR?`).
    Name(Rc<str>),
    /// Reads the visit count of a container (`CNT?`).
    ReadCount(Path),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableAssignment {
    pub name: Rc<str>,
    pub is_global: bool,
    pub is_new_declaration: bool,
}

/// Item on the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalItem {
    Value(Value),
    /// Result of a function that returned nothing.
    Void,
    /// Tag captured while building choice text.
    Tag(Rc<str>),
}

impl From<Value> for EvalItem {
    fn from(value: Value) -> Self {
        EvalItem::Value(value)
    }
}

/// Item on the output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputItem {
    Value(Value),
    Glue,
    /// `str`, `#` and `/#` markers.
    Command(ControlCommand),
    Tag(Rc<str>),
}

impl OutputItem {
    pub fn text(text: &str) -> Self {
        OutputItem::Value(Value::string(text))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OutputItem::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}
