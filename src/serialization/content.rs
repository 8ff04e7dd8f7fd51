//! JSON tokens for content-tree objects, values and stream items.
//!
//! Every runtime object has exactly one token shape. Strings carry text
//! (`"^..."`), command and operator names; objects are told apart by their
//! first distinguishing key; arrays are containers whose last element is
//! a terminator holding flags, name and named-only children.
use std::rc::Rc;

use serde_json::{Map, Number, Value as Json};

use crate::runtime::{
    choice::{ChoiceFlags, ChoicePoint},
    container::{Container, CountFlags},
    control_command::ControlCommand,
    error::StoryError,
    frame::PushPopType,
    list::{InkList, ListItem},
    native_function::NativeFunction,
    object::{
        Content, Divert, DivertDestination, EvalItem, OutputItem, VariableAssignment,
        VariableReference,
    },
    path::{Component, Path},
    value::Value,
};

/// Divert keys in lookup order, with the frame each one pushes.
const DIVERT_KEYS: [(&str, Option<PushPopType>); 4] = [
    ("->", None),
    ("f()", Some(PushPopType::Function)),
    ("->t->", Some(PushPopType::Tunnel)),
    ("x()", None),
];

fn str_field<'a>(object: &'a Map<String, Json>, key: &str) -> Result<&'a str, StoryError> {
    object
        .get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| StoryError::format(format!("expected a string for '{key}'")))
}

fn flag(object: &Map<String, Json>, key: &str) -> bool {
    object.get(key).and_then(Json::as_bool).unwrap_or(false)
}

pub(crate) fn int_token(token: &Json, what: &str) -> Result<i32, StoryError> {
    token
        .as_i64()
        .and_then(|value| i32::try_from(value).ok())
        .ok_or_else(|| StoryError::format(format!("expected an int for {what}, found {token}")))
}

/// Reads a container array. `name` comes from the key a named-only child
/// is stored under and wins over any `#n` in the terminator.
pub(crate) fn read_container(items: &[Json], name: Option<&str>) -> Result<Rc<Container>, StoryError> {
    let Some((terminator, content)) = items.split_last() else {
        return Err(StoryError::format("container array has no terminator"));
    };

    let mut builder = Container::builder();
    for item in content {
        builder.add_content(read_content(item)?);
    }

    match terminator {
        Json::Null => {}
        Json::Object(fields) => {
            for (key, value) in fields {
                match key.as_str() {
                    "#f" => {
                        let bits = int_token(value, "container flags")?;
                        builder.set_flags(CountFlags::from_bits(bits as u8));
                    }
                    "#n" => {
                        let own_name = value
                            .as_str()
                            .ok_or_else(|| StoryError::format("container name must be a string"))?;
                        builder.set_name(own_name);
                    }
                    child_name => {
                        let Json::Array(child) = value else {
                            return Err(StoryError::format(format!(
                                "named content '{child_name}' is not a container"
                            )));
                        };
                        builder.add_named_only(read_container(child, Some(child_name))?);
                    }
                }
            }
        }
        other => {
            return Err(StoryError::format(format!(
                "container terminator must be null or an object, found {other}"
            )));
        }
    }

    if let Some(name) = name {
        builder.set_name(name);
    }
    builder.build()
}

pub(crate) fn read_content(token: &Json) -> Result<Content, StoryError> {
    match token {
        Json::Bool(value) => Ok(Content::Value(Value::Bool(*value))),
        Json::Number(number) => read_number(number).map(Content::Value),
        Json::String(text) => read_string_token(text),
        Json::Object(object) => read_object(object),
        Json::Array(items) => read_container(items, None).map(Content::Container),
        Json::Null => Err(StoryError::format("unexpected null in container content")),
    }
}

fn read_number(number: &Number) -> Result<Value, StoryError> {
    if let Some(int) = number.as_i64() {
        return i32::try_from(int)
            .map(Value::Int)
            .map_err(|_| StoryError::format(format!("integer {int} is out of range")));
    }
    number
        .as_f64()
        .map(|float| Value::Float(float as f32))
        .ok_or_else(|| StoryError::format(format!("unreadable number {number}")))
}

fn read_string_token(text: &str) -> Result<Content, StoryError> {
    if let Some(body) = text.strip_prefix('^') {
        return Ok(Content::Value(Value::string(body)));
    }
    match text {
        "\n" => return Ok(Content::Value(Value::string("\n"))),
        "<>" => return Ok(Content::Glue),
        "void" => return Ok(Content::Void),
        _ => {}
    }
    if let Some(command) = ControlCommand::from_name(text) {
        return Ok(Content::Command(command));
    }
    if let Some(function) = NativeFunction::from_name(text) {
        return Ok(Content::NativeCall(function));
    }
    Err(StoryError::format(format!("unknown content token '{text}'")))
}

fn read_object(object: &Map<String, Json>) -> Result<Content, StoryError> {
    if object.contains_key("^->") {
        let path = Path::parse(str_field(object, "^->")?);
        return Ok(Content::Value(Value::DivertTarget(path)));
    }

    if object.contains_key("^var") {
        let name = str_field(object, "^var")?;
        let context_index = match object.get("ci") {
            Some(token) => int_token(token, "variable pointer context")?,
            None => -1,
        };
        return Ok(Content::Value(Value::VariablePointer {
            name: name.into(),
            context_index,
        }));
    }

    for (key, push) in DIVERT_KEYS {
        if !object.contains_key(key) {
            continue;
        }
        let target = str_field(object, key)?;
        let mut divert = if flag(object, "var") {
            Divert::to_variable(target)
        } else {
            Divert::to_path(Path::parse(target))
        };
        if let Some(push) = push {
            divert = divert.with_push(push);
        }
        if flag(object, "c") {
            divert = divert.conditional();
        }
        if key == "x()" {
            let args = match object.get("exArgs") {
                Some(token) => int_token(token, "external argument count")?,
                None => 0,
            };
            divert = divert.external(args.max(0) as usize);
        }
        return Ok(Content::Divert(divert));
    }

    if object.contains_key("*") {
        let path = Path::parse(str_field(object, "*")?);
        let flags = match object.get("flg") {
            Some(token) => int_token(token, "choice flags")?,
            None => 0,
        };
        return Ok(Content::ChoicePoint(ChoicePoint::new(
            path,
            ChoiceFlags::from_bits(flags as u8),
        )));
    }

    if object.contains_key("VAR?") {
        let name = str_field(object, "VAR?")?;
        return Ok(Content::VariableReference(VariableReference::Name(name.into())));
    }

    if object.contains_key("CNT?") {
        let path = Path::parse(str_field(object, "CNT?")?);
        return Ok(Content::VariableReference(VariableReference::ReadCount(path)));
    }

    for (key, is_global) in [("VAR=", true), ("temp=", false)] {
        if object.contains_key(key) {
            let name = str_field(object, key)?;
            return Ok(Content::VariableAssignment(VariableAssignment {
                name: name.into(),
                is_global,
                is_new_declaration: !object.contains_key("re"),
            }));
        }
    }

    if object.contains_key("#") {
        return Ok(Content::Tag(str_field(object, "#")?.into()));
    }

    if let Some(items) = object.get("list") {
        return read_list(items, object.get("origins")).map(|list| Content::Value(Value::List(list)));
    }

    Err(StoryError::format(format!(
        "failed to convert object to runtime content: {}",
        Json::Object(object.clone())
    )))
}

fn read_list(items: &Json, origins: Option<&Json>) -> Result<InkList, StoryError> {
    let items = items
        .as_object()
        .ok_or_else(|| StoryError::format("list items must be an object"))?;
    let mut list = InkList::new();
    for (full_name, value) in items {
        list.insert(
            ListItem::from_full_name(full_name),
            int_token(value, "list item value")?,
        );
    }
    if let Some(origins) = origins.and_then(Json::as_array) {
        let names = origins
            .iter()
            .filter_map(Json::as_str)
            .map(Rc::from)
            .collect();
        list.set_initial_origin_names(names);
    }
    Ok(list)
}

/// Reads a token that must hold a value (variables, temporaries).
pub(crate) fn read_value(token: &Json) -> Result<Value, StoryError> {
    match read_content(token)? {
        Content::Value(value) => Ok(value),
        other => Err(StoryError::format(format!(
            "expected a value, found {}",
            other.kind()
        ))),
    }
}

pub(crate) fn read_eval_item(token: &Json) -> Result<EvalItem, StoryError> {
    match read_content(token)? {
        Content::Value(value) => Ok(EvalItem::Value(value)),
        Content::Void => Ok(EvalItem::Void),
        Content::Tag(text) => Ok(EvalItem::Tag(text)),
        other => Err(StoryError::format(format!(
            "{} can't be on the evaluation stack",
            other.kind()
        ))),
    }
}

pub(crate) fn read_output_item(token: &Json) -> Result<OutputItem, StoryError> {
    match read_content(token)? {
        Content::Value(value) => Ok(OutputItem::Value(value)),
        Content::Glue => Ok(OutputItem::Glue),
        Content::Command(command) => Ok(OutputItem::Command(command)),
        Content::Tag(text) => Ok(OutputItem::Tag(text)),
        other => Err(StoryError::format(format!(
            "{} can't be in the output stream",
            other.kind()
        ))),
    }
}

/// Writes a container. Named-only children are written under their name
/// key, so they leave out `#n`.
pub(crate) fn write_container(container: &Container, without_name: bool) -> Json {
    let own_path = container.path();
    let mut items: Vec<Json> = container
        .content()
        .iter()
        .enumerate()
        .map(|(index, content)| {
            write_content(content, &own_path.by_appending_component(Component::Index(index)))
        })
        .collect();

    let mut terminator = Map::new();
    for child in container.named_only() {
        if let Some(name) = child.name() {
            terminator.insert(name.to_string(), write_container(child, true));
        }
    }
    let flags = container.count_flags().bits();
    if flags > 0 {
        terminator.insert("#f".into(), Json::from(flags));
    }
    if !without_name {
        if let Some(name) = container.name() {
            terminator.insert("#n".into(), Json::from(name));
        }
    }

    items.push(if terminator.is_empty() {
        Json::Null
    } else {
        Json::Object(terminator)
    });
    Json::Array(items)
}

/// Writes one content item. `origin` is the item's own path, which
/// relative paths inside it are written against.
pub(crate) fn write_content(content: &Content, origin: &Path) -> Json {
    match content {
        Content::Container(container) => write_container(container, false),
        Content::Value(value) => write_value(value),
        Content::Command(command) => Json::from(command.name()),
        Content::NativeCall(function) => Json::from(function.name()),
        Content::Divert(divert) => write_divert(divert, origin),
        Content::ChoicePoint(choice_point) => {
            let mut object = Map::new();
            object.insert(
                "*".into(),
                Json::from(origin.compact_string(&choice_point.path_on_choice)),
            );
            object.insert("flg".into(), Json::from(choice_point.flags.bits()));
            Json::Object(object)
        }
        Content::VariableReference(VariableReference::Name(name)) => single("VAR?", &name[..]),
        Content::VariableReference(VariableReference::ReadCount(path)) => {
            single("CNT?", &origin.compact_string(path))
        }
        Content::VariableAssignment(assignment) => {
            let key = if assignment.is_global { "VAR=" } else { "temp=" };
            let mut object = Map::new();
            object.insert(key.into(), Json::from(&assignment.name[..]));
            if !assignment.is_new_declaration {
                object.insert("re".into(), Json::Bool(true));
            }
            Json::Object(object)
        }
        Content::Tag(text) => single("#", text),
        Content::Glue => Json::from("<>"),
        Content::Void => Json::from("void"),
    }
}

fn single(key: &str, value: &str) -> Json {
    let mut object = Map::new();
    object.insert(key.into(), Json::from(value));
    Json::Object(object)
}

fn write_divert(divert: &Divert, origin: &Path) -> Json {
    let key = if divert.is_external {
        "x()"
    } else {
        match divert.stack_push {
            Some(PushPopType::Function) => "f()",
            Some(PushPopType::Tunnel) => "->t->",
            _ => "->",
        }
    };

    let mut object = Map::new();
    match &divert.destination {
        DivertDestination::Variable(name) => {
            object.insert(key.into(), Json::from(&name[..]));
            object.insert("var".into(), Json::Bool(true));
        }
        DivertDestination::Path(path) => {
            object.insert(key.into(), Json::from(origin.compact_string(path)));
        }
    }
    if divert.is_conditional {
        object.insert("c".into(), Json::Bool(true));
    }
    if divert.external_args > 0 {
        object.insert("exArgs".into(), Json::from(divert.external_args));
    }
    Json::Object(object)
}

pub(crate) fn write_value(value: &Value) -> Json {
    match value {
        Value::Bool(value) => Json::Bool(*value),
        Value::Int(value) => Json::from(*value),
        Value::Float(value) => write_float(*value),
        Value::String(text) if &**text == "\n" => Json::from("\n"),
        Value::String(text) => Json::from(format!("^{text}")),
        Value::List(list) => write_list(list),
        Value::DivertTarget(path) => single("^->", &path.to_string()),
        Value::VariablePointer {
            name,
            context_index,
        } => {
            let mut object = Map::new();
            object.insert("^var".into(), Json::from(&name[..]));
            object.insert("ci".into(), Json::from(*context_index));
            Json::Object(object)
        }
    }
}

/// Floats always carry a fraction so they read back as floats. Values
/// JSON can't hold are clamped to the largest finite `f32` magnitude.
fn write_float(value: f32) -> Json {
    let value = if value.is_nan() {
        0.0
    } else if value.is_infinite() {
        3.4e38_f64.copysign(f64::from(value))
    } else {
        // Round-trip through the shortest `f32` text so 0.1 stays 0.1.
        value.to_string().parse().unwrap_or(f64::from(value))
    };
    Number::from_f64(value).map_or(Json::Null, Json::Number)
}

fn write_list(list: &InkList) -> Json {
    let mut items = Map::new();
    for (item, value) in list.iter() {
        items.insert(item.full_name(), Json::from(value));
    }
    let mut object = Map::new();
    object.insert("list".into(), Json::Object(items));
    if list.is_empty() {
        let origins = list.origin_names();
        if !origins.is_empty() {
            object.insert(
                "origins".into(),
                Json::Array(origins.iter().map(|name| Json::from(&name[..])).collect()),
            );
        }
    }
    Json::Object(object)
}

pub(crate) fn write_eval_item(item: &EvalItem) -> Json {
    match item {
        EvalItem::Value(value) => write_value(value),
        EvalItem::Void => Json::from("void"),
        EvalItem::Tag(text) => single("#", text),
    }
}

pub(crate) fn write_output_item(item: &OutputItem) -> Json {
    match item {
        OutputItem::Value(value) => write_value(value),
        OutputItem::Glue => Json::from("<>"),
        OutputItem::Command(command) => Json::from(command.name()),
        OutputItem::Tag(text) => single("#", text),
    }
}
