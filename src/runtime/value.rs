use std::{fmt, rc::Rc};

use crate::runtime::{error::StoryError, list::InkList, path::Path};

/// Type tag of a [`Value`].
///
/// The declaration order is the coercion order: a binary operation casts
/// both operands to the larger of their two types before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    List,
    String,
    DivertTarget,
    VariablePointer,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "Bool",
            ValueType::Int => "Int",
            ValueType::Float => "Float",
            ValueType::List => "List",
            ValueType::String => "String",
            ValueType::DivertTarget => "DivertTarget",
            ValueType::VariablePointer => "VariablePointer",
        };
        f.write_str(name)
    }
}

/// Runtime value held by variables, the evaluation stack and the output
/// stream.
///
/// Strings are `Rc<str>` so pushing text through the output stream and
/// cloning snapshots stays cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    /// 32-bit integer with wrapping arithmetic.
    Int(i32),
    Float(f32),
    String(Rc<str>),
    List(InkList),
    /// Address of a knot, stitch or gather, used by variable diverts.
    DivertTarget(Path),
    /// Reference to a variable, used for by-reference function parameters.
    ///
    /// `context_index` is `-1` until resolved, `0` for globals and `n` for
    /// the temporaries of call-stack element `n - 1`.
    VariablePointer { name: Rc<str>, context_index: i32 },
}

impl Value {
    pub fn string(text: &str) -> Self {
        Value::String(text.into())
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::DivertTarget(_) => ValueType::DivertTarget,
            Value::VariablePointer { .. } => ValueType::VariablePointer,
        }
    }

    pub fn type_name(&self) -> String {
        self.value_type().to_string()
    }

    pub fn is_truthy(&self) -> Result<bool, StoryError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(v) => Ok(*v != 0),
            Value::Float(v) => Ok(*v != 0.0),
            Value::String(s) => Ok(!s.is_empty()),
            Value::List(list) => Ok(!list.is_empty()),
            Value::DivertTarget(_) => Err(StoryError::Type(
                "shouldn't be checking the truthiness of a divert target".to_string(),
            )),
            Value::VariablePointer { .. } => Err(StoryError::Type(
                "shouldn't be checking the truthiness of a variable pointer".to_string(),
            )),
        }
    }

    /// Converts to `target`, failing for combinations that have no meaning.
    pub fn cast(&self, target: ValueType) -> Result<Value, StoryError> {
        if self.value_type() == target {
            return Ok(self.clone());
        }
        let bad_cast = || StoryError::InvalidCast {
            from: self.value_type(),
            to: target,
        };
        match (self, target) {
            (Value::Bool(b), ValueType::Int) => Ok(Value::Int(i32::from(*b))),
            (Value::Bool(b), ValueType::Float) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            (Value::Bool(b), ValueType::String) => {
                Ok(Value::string(if *b { "true" } else { "false" }))
            }

            (Value::Int(v), ValueType::Bool) => Ok(Value::Bool(*v != 0)),
            (Value::Int(v), ValueType::Float) => Ok(Value::Float(*v as f32)),
            (Value::Int(v), ValueType::String) => Ok(Value::String(v.to_string().into())),

            (Value::Float(v), ValueType::Bool) => Ok(Value::Bool(*v != 0.0)),
            (Value::Float(v), ValueType::Int) => Ok(Value::Int(*v as i32)),
            (Value::Float(v), ValueType::String) => Ok(Value::String(format_float(*v).into())),

            (Value::String(s), ValueType::Int) => {
                s.trim().parse::<i32>().map(Value::Int).map_err(|_| bad_cast())
            }
            (Value::String(s), ValueType::Float) => {
                s.trim().parse::<f32>().map(Value::Float).map_err(|_| bad_cast())
            }

            (Value::List(list), ValueType::Bool) => Ok(Value::Bool(!list.is_empty())),
            (Value::List(list), ValueType::Int) => {
                Ok(Value::Int(list.max_item().map_or(0, |(_, v)| v)))
            }
            (Value::List(list), ValueType::Float) => {
                Ok(Value::Float(list.max_item().map_or(0.0, |(_, v)| v as f32)))
            }
            (Value::List(list), ValueType::String) => Ok(Value::String(
                list.max_item()
                    .map_or_else(String::new, |(item, _)| item.full_name())
                    .into(),
            )),

            (Value::Bool(_), _)
            | (Value::Int(_), _)
            | (Value::Float(_), _)
            | (Value::String(_), _)
            | (Value::List(_), _)
            | (Value::DivertTarget(_), _)
            | (Value::VariablePointer { .. }, _) => Err(bad_cast()),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&InkList> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_divert_target(&self) -> Option<&Path> {
        match self {
            Value::DivertTarget(path) => Some(path),
            _ => None,
        }
    }
}

/// Text form written to the output stream.
/// Text form of a float: the shortest digits that read back as the same
/// `f32`, switching to `1.5E+10` style once the number needs more than nine
/// digits before the decimal point or more than three zeros after it.
pub fn format_float(value: f32) -> String {
    if value.is_infinite() {
        return String::from(if value > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if value.is_nan() || value == 0.0 {
        return value.to_string();
    }
    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or_default();
    let scale = exponent + 1;
    if (-3..=9).contains(&scale) {
        return value.to_string();
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}E{sign}{:02}", exponent.abs())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => f.write_str(&format_float(*v)),
            Value::String(s) => f.write_str(s),
            Value::List(list) => write!(f, "{list}"),
            Value::DivertTarget(path) => write!(f, "DivertTargetValue({path})"),
            Value::VariablePointer { name, .. } => write!(f, "VariablePointerValue({name})"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v.into())
    }
}

impl From<InkList> for Value {
    fn from(v: InkList) -> Self {
        Value::List(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::list::ListItem;

    #[test]
    fn type_order_drives_coercion() {
        assert!(ValueType::Bool < ValueType::Int);
        assert!(ValueType::Int < ValueType::Float);
        assert!(ValueType::Float < ValueType::List);
        assert!(ValueType::List < ValueType::String);
    }

    #[test]
    fn numeric_casts() {
        assert_eq!(Value::Bool(true).cast(ValueType::Int).unwrap(), Value::Int(1));
        assert_eq!(Value::Int(0).cast(ValueType::Bool).unwrap(), Value::Bool(false));
        assert_eq!(Value::Float(2.9).cast(ValueType::Int).unwrap(), Value::Int(2));
        assert_eq!(Value::Int(3).cast(ValueType::String).unwrap(), Value::string("3"));
        assert_eq!(Value::Float(1.5).cast(ValueType::String).unwrap(), Value::string("1.5"));
        assert_eq!(Value::string(" 42").cast(ValueType::Int).unwrap(), Value::Int(42));
    }

    #[test]
    fn invalid_casts_fail() {
        let target = Value::DivertTarget(Path::parse("knot"));
        assert_eq!(
            target.cast(ValueType::Int).unwrap_err(),
            StoryError::InvalidCast {
                from: ValueType::DivertTarget,
                to: ValueType::Int
            }
        );
        assert!(Value::string("abc").cast(ValueType::Int).is_err());
        assert!(Value::Int(1).cast(ValueType::DivertTarget).is_err());
        assert!(Value::string("x").cast(ValueType::Bool).is_err());
    }

    #[test]
    fn list_casts_use_max_item() {
        let mut list = InkList::new();
        list.insert(ListItem::new("colours", "red"), 1);
        list.insert(ListItem::new("colours", "blue"), 3);
        let value = Value::List(list);
        assert_eq!(value.cast(ValueType::Int).unwrap(), Value::Int(3));
        assert_eq!(value.cast(ValueType::String).unwrap(), Value::string("colours.blue"));
        assert_eq!(Value::List(InkList::new()).cast(ValueType::Int).unwrap(), Value::Int(0));
    }

    #[test]
    fn truthiness() {
        assert!(Value::Int(2).is_truthy().unwrap());
        assert!(!Value::string("").is_truthy().unwrap());
        assert!(!Value::List(InkList::new()).is_truthy().unwrap());
        assert!(Value::DivertTarget(Path::parse("a")).is_truthy().is_err());
        assert!(
            Value::VariablePointer {
                name: "x".into(),
                context_index: 0
            }
            .is_truthy()
            .is_err()
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Float(2.0).to_string(), "2");
        assert_eq!(Value::Float(-0.5).to_string(), "-0.5");
        let mut list = InkList::new();
        list.insert(ListItem::new("l", "b"), 2);
        list.insert(ListItem::new("l", "a"), 1);
        assert_eq!(Value::List(list).to_string(), "a, b");
    }

    #[test]
    fn floats_switch_to_exponent_form_at_the_edges() {
        let cases = [
            (1e21, "1E+21"),
            (1.5e10, "1.5E+10"),
            (1e8, "100000000"),
            (1e9, "1E+09"),
            (123456789.0, "123456790"),
            (-3.4028235e38, "-3.4028235E+38"),
            (0.0001, "0.0001"),
            (1e-5, "1E-05"),
            (1e-7, "1E-07"),
            (-2.5e-12, "-2.5E-12"),
            (0.1, "0.1"),
            (0.0, "0"),
            (f32::INFINITY, "Infinity"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_float(value), expected, "{value:?}");
            assert_eq!(Value::Float(value).to_string(), expected);
        }
        assert_eq!(
            Value::Float(1e-7).cast(ValueType::String).unwrap(),
            Value::string("1E-07")
        );
        assert_eq!(
            Value::string("1E+21").cast(ValueType::Float).unwrap(),
            Value::Float(1e21)
        );
    }
}
