use std::fmt;

use crate::runtime::{
    error::StoryError,
    list::{InkList, ListDefinitions},
    value::{Value, ValueType},
};

/// Built-in operators and functions callable from story bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFunction {
    Add,
    Subtract,
    Divide,
    Multiply,
    Mod,
    Negate,
    Equal,
    Greater,
    Less,
    GreaterThanOrEquals,
    LessThanOrEquals,
    NotEquals,
    Not,
    And,
    Or,
    Min,
    Max,
    Pow,
    Floor,
    Ceiling,
    Int,
    Float,
    Has,
    Hasnt,
    Intersect,
    ListMin,
    ListMax,
    All,
    Count,
    ValueOfList,
    Invert,
}

pub const ALL_NATIVE_FUNCTIONS: [NativeFunction; 31] = [
    NativeFunction::Add,
    NativeFunction::Subtract,
    NativeFunction::Divide,
    NativeFunction::Multiply,
    NativeFunction::Mod,
    NativeFunction::Negate,
    NativeFunction::Equal,
    NativeFunction::Greater,
    NativeFunction::Less,
    NativeFunction::GreaterThanOrEquals,
    NativeFunction::LessThanOrEquals,
    NativeFunction::NotEquals,
    NativeFunction::Not,
    NativeFunction::And,
    NativeFunction::Or,
    NativeFunction::Min,
    NativeFunction::Max,
    NativeFunction::Pow,
    NativeFunction::Floor,
    NativeFunction::Ceiling,
    NativeFunction::Int,
    NativeFunction::Float,
    NativeFunction::Has,
    NativeFunction::Hasnt,
    NativeFunction::Intersect,
    NativeFunction::ListMin,
    NativeFunction::ListMax,
    NativeFunction::All,
    NativeFunction::Count,
    NativeFunction::ValueOfList,
    NativeFunction::Invert,
];

impl NativeFunction {
    /// Name as written in story JSON.
    pub fn name(self) -> &'static str {
        match self {
            NativeFunction::Add => "+",
            NativeFunction::Subtract => "-",
            NativeFunction::Divide => "/",
            NativeFunction::Multiply => "*",
            NativeFunction::Mod => "%",
            NativeFunction::Negate => "_",
            NativeFunction::Equal => "==",
            NativeFunction::Greater => ">",
            NativeFunction::Less => "<",
            NativeFunction::GreaterThanOrEquals => ">=",
            NativeFunction::LessThanOrEquals => "<=",
            NativeFunction::NotEquals => "!=",
            NativeFunction::Not => "!",
            NativeFunction::And => "&&",
            NativeFunction::Or => "||",
            NativeFunction::Min => "MIN",
            NativeFunction::Max => "MAX",
            NativeFunction::Pow => "POW",
            NativeFunction::Floor => "FLOOR",
            NativeFunction::Ceiling => "CEILING",
            NativeFunction::Int => "INT",
            NativeFunction::Float => "FLOAT",
            NativeFunction::Has => "?",
            NativeFunction::Hasnt => "!?",
            // A bare "^" would read back as an empty string.
            NativeFunction::Intersect => "L^",
            NativeFunction::ListMin => "LIST_MIN",
            NativeFunction::ListMax => "LIST_MAX",
            NativeFunction::All => "LIST_ALL",
            NativeFunction::Count => "LIST_COUNT",
            NativeFunction::ValueOfList => "LIST_VALUE",
            NativeFunction::Invert => "LIST_INVERT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_NATIVE_FUNCTIONS
            .iter()
            .copied()
            .find(|func| func.name() == name)
    }

    pub fn arity(self) -> usize {
        match self {
            NativeFunction::Negate
            | NativeFunction::Not
            | NativeFunction::Floor
            | NativeFunction::Ceiling
            | NativeFunction::Int
            | NativeFunction::Float
            | NativeFunction::ListMin
            | NativeFunction::ListMax
            | NativeFunction::All
            | NativeFunction::Count
            | NativeFunction::ValueOfList
            | NativeFunction::Invert => 1,
            _ => 2,
        }
    }

    /// Applies the function to already popped operands (first operand
    /// first).
    pub fn call(self, params: &[Value], lists: &ListDefinitions) -> Result<Value, StoryError> {
        if params.len() != self.arity() {
            return Err(StoryError::runtime(format!(
                "unexpected number of parameters to '{}': expected {}, got {}",
                self.name(),
                self.arity(),
                params.len()
            )));
        }

        if let [left, right] = params {
            if matches!(left, Value::List(_)) || matches!(right, Value::List(_)) {
                return self.call_binary_list(left, right, lists);
            }
        }

        let coerced = coerce_to_single_type(params)?;
        match coerced.as_slice() {
            [operand] => self.call_unary(operand, lists),
            [left, right] => self.call_binary(left, right),
            _ => Err(self.unsupported(&coerced)),
        }
    }

    fn call_unary(self, operand: &Value, lists: &ListDefinitions) -> Result<Value, StoryError> {
        let result = match (self, operand) {
            (NativeFunction::Negate, Value::Int(x)) => Value::Int(x.wrapping_neg()),
            (NativeFunction::Not, Value::Int(x)) => Value::Bool(*x == 0),
            (NativeFunction::Floor | NativeFunction::Ceiling | NativeFunction::Int, Value::Int(x)) => {
                Value::Int(*x)
            }
            (NativeFunction::Float, Value::Int(x)) => Value::Float(*x as f32),

            (NativeFunction::Negate, Value::Float(x)) => Value::Float(-x),
            (NativeFunction::Not, Value::Float(x)) => Value::Bool(*x == 0.0),
            (NativeFunction::Floor, Value::Float(x)) => Value::Float(x.floor()),
            (NativeFunction::Ceiling, Value::Float(x)) => Value::Float(x.ceil()),
            (NativeFunction::Int, Value::Float(x)) => Value::Int(*x as i32),
            (NativeFunction::Float, Value::Float(x)) => Value::Float(*x),

            (NativeFunction::Not, Value::List(list)) => Value::Bool(list.is_empty()),
            (NativeFunction::ListMin, Value::List(list)) => Value::List(list.min_as_list()),
            (NativeFunction::ListMax, Value::List(list)) => Value::List(list.max_as_list()),
            (NativeFunction::All, Value::List(list)) => Value::List(list.all(lists)),
            (NativeFunction::Count, Value::List(list)) => Value::Int(list.len() as i32),
            (NativeFunction::ValueOfList, Value::List(list)) => {
                Value::Int(list.max_item().map_or(0, |(_, v)| v))
            }
            (NativeFunction::Invert, Value::List(list)) => Value::List(list.inverse(lists)),

            _ => return Err(self.unsupported(std::slice::from_ref(operand))),
        };
        Ok(result)
    }

    fn call_binary(self, left: &Value, right: &Value) -> Result<Value, StoryError> {
        match (left, right) {
            (Value::Int(x), Value::Int(y)) => self.call_int(*x, *y),
            (Value::Float(x), Value::Float(y)) => self.call_float(*x, *y),
            (Value::String(x), Value::String(y)) => {
                let result = match self {
                    NativeFunction::Add => Value::String(format!("{x}{y}").into()),
                    NativeFunction::Equal => Value::Bool(x == y),
                    NativeFunction::NotEquals => Value::Bool(x != y),
                    NativeFunction::Has => Value::Bool(x.contains(&**y)),
                    NativeFunction::Hasnt => Value::Bool(!x.contains(&**y)),
                    _ => return Err(self.unsupported(&[left.clone(), right.clone()])),
                };
                Ok(result)
            }
            (Value::DivertTarget(x), Value::DivertTarget(y)) => match self {
                NativeFunction::Equal => Ok(Value::Bool(x == y)),
                NativeFunction::NotEquals => Ok(Value::Bool(x != y)),
                _ => Err(self.unsupported(&[left.clone(), right.clone()])),
            },
            _ => Err(self.unsupported(&[left.clone(), right.clone()])),
        }
    }

    fn call_int(self, x: i32, y: i32) -> Result<Value, StoryError> {
        let result = match self {
            NativeFunction::Add => Value::Int(x.wrapping_add(y)),
            NativeFunction::Subtract => Value::Int(x.wrapping_sub(y)),
            NativeFunction::Multiply => Value::Int(x.wrapping_mul(y)),
            NativeFunction::Divide => {
                if y == 0 {
                    return Err(division_by_zero());
                }
                Value::Int(x.wrapping_div(y))
            }
            NativeFunction::Mod => {
                if y == 0 {
                    return Err(division_by_zero());
                }
                Value::Int(x.wrapping_rem(y))
            }
            NativeFunction::Equal => Value::Bool(x == y),
            NativeFunction::Greater => Value::Bool(x > y),
            NativeFunction::Less => Value::Bool(x < y),
            NativeFunction::GreaterThanOrEquals => Value::Bool(x >= y),
            NativeFunction::LessThanOrEquals => Value::Bool(x <= y),
            NativeFunction::NotEquals => Value::Bool(x != y),
            NativeFunction::And => Value::Bool(x != 0 && y != 0),
            NativeFunction::Or => Value::Bool(x != 0 || y != 0),
            NativeFunction::Max => Value::Int(x.max(y)),
            NativeFunction::Min => Value::Int(x.min(y)),
            NativeFunction::Pow => Value::Float(f64::from(x).powf(f64::from(y)) as f32),
            _ => return Err(self.unsupported(&[Value::Int(x), Value::Int(y)])),
        };
        Ok(result)
    }

    fn call_float(self, x: f32, y: f32) -> Result<Value, StoryError> {
        let result = match self {
            NativeFunction::Add => Value::Float(x + y),
            NativeFunction::Subtract => Value::Float(x - y),
            NativeFunction::Multiply => Value::Float(x * y),
            NativeFunction::Divide => Value::Float(x / y),
            NativeFunction::Mod => Value::Float(x % y),
            NativeFunction::Equal => Value::Bool(x == y),
            NativeFunction::Greater => Value::Bool(x > y),
            NativeFunction::Less => Value::Bool(x < y),
            NativeFunction::GreaterThanOrEquals => Value::Bool(x >= y),
            NativeFunction::LessThanOrEquals => Value::Bool(x <= y),
            NativeFunction::NotEquals => Value::Bool(x != y),
            NativeFunction::And => Value::Bool(x != 0.0 && y != 0.0),
            NativeFunction::Or => Value::Bool(x != 0.0 || y != 0.0),
            NativeFunction::Max => Value::Float(x.max(y)),
            NativeFunction::Min => Value::Float(x.min(y)),
            NativeFunction::Pow => Value::Float(x.powf(y)),
            _ => return Err(self.unsupported(&[Value::Float(x), Value::Float(y)])),
        };
        Ok(result)
    }

    fn call_binary_list(
        self,
        left: &Value,
        right: &Value,
        lists: &ListDefinitions,
    ) -> Result<Value, StoryError> {
        if let (NativeFunction::Add | NativeFunction::Subtract, Value::List(list), Value::Int(delta)) =
            (self, left, right)
        {
            return Ok(Value::List(self.increment_list(list, *delta, lists)));
        }

        let both_lists = matches!((left, right), (Value::List(_), Value::List(_)));
        if matches!(self, NativeFunction::And | NativeFunction::Or) && !both_lists {
            let (l, r) = (left.is_truthy()?, right.is_truthy()?);
            let result = if self == NativeFunction::And { l && r } else { l || r };
            return Ok(Value::Bool(result));
        }

        let (Value::List(x), Value::List(y)) = (left, right) else {
            return Err(self.unsupported(&[left.clone(), right.clone()]));
        };
        let result = match self {
            NativeFunction::Add => Value::List(x.union(y)),
            NativeFunction::Subtract => Value::List(x.without(y)),
            NativeFunction::Intersect => Value::List(x.intersect(y)),
            NativeFunction::Has => Value::Bool(x.contains(y)),
            NativeFunction::Hasnt => Value::Bool(!x.contains(y)),
            NativeFunction::Equal => Value::Bool(x == y),
            NativeFunction::NotEquals => Value::Bool(x != y),
            NativeFunction::Greater => Value::Bool(x.greater_than(y)),
            NativeFunction::Less => Value::Bool(x.less_than(y)),
            NativeFunction::GreaterThanOrEquals => Value::Bool(x.greater_than_or_equals(y)),
            NativeFunction::LessThanOrEquals => Value::Bool(x.less_than_or_equals(y)),
            NativeFunction::And => Value::Bool(!x.is_empty() && !y.is_empty()),
            NativeFunction::Or => Value::Bool(!x.is_empty() || !y.is_empty()),
            _ => return Err(self.unsupported(&[left.clone(), right.clone()])),
        };
        Ok(result)
    }

    /// `list + n` moves every item `n` places along its own definition,
    /// dropping items that fall off the end.
    fn increment_list(self, list: &InkList, delta: i32, lists: &ListDefinitions) -> InkList {
        let mut result = InkList::new();
        for (item, value) in list.iter() {
            let target = if self == NativeFunction::Add {
                value.wrapping_add(delta)
            } else {
                value.wrapping_sub(delta)
            };
            let moved = item
                .origin_name()
                .and_then(|origin| lists.get(origin))
                .and_then(|definition| definition.item_with_value(target));
            if let Some(moved) = moved {
                result.insert(moved, target);
            }
        }
        result.set_initial_origin_names(list.origin_names());
        result
    }

    #[cold]
    #[inline(never)]
    fn unsupported(self, operands: &[Value]) -> StoryError {
        let types: Vec<String> = operands.iter().map(Value::type_name).collect();
        StoryError::Type(format!(
            "cannot perform operation '{}' on {}",
            self.name(),
            types.join(" and ")
        ))
    }
}

#[cold]
#[inline(never)]
fn division_by_zero() -> StoryError {
    StoryError::runtime("division by zero")
}

/// Casts every operand to the largest operand type (at least `Int`).
fn coerce_to_single_type(params: &[Value]) -> Result<Vec<Value>, StoryError> {
    let target = params
        .iter()
        .map(Value::value_type)
        .fold(ValueType::Int, ValueType::max);
    params.iter().map(|param| param.cast(target)).collect()
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
