//! Script values and the numbered variable table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value held by a script variable or carried by a signal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer value.
    Number(i64),
    /// Text value.
    Text(String),
}

impl Value {
    /// Numeric view of the value; numeric text is parsed, other text is `None`.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(text) => text.trim().parse().ok(),
        }
    }

    /// Whether the value is the default `0`.
    pub fn is_zero(&self) -> bool {
        matches!(self, Value::Number(0))
    }

    /// Interpret script text: integers become numbers, everything else text.
    pub fn parse_literal(text: &str) -> Self {
        text.parse::<i64>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::Text(text.to_string()))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Number(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value)
    }
}

/// Ids above `i64::MAX` saturate.
impl From<u64> for Value {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(n) => Value::Number(n),
            Err(_) => {
                tracing::warn!(value, "unsigned value exceeds the variable range; saturated");
                Value::Number(i64::MAX)
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Validated 1-based variable id.
///
/// Only [`Variables::id`] and argument parsing construct one, so every id
/// is known to be in range for the table it was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

impl VariableId {
    pub(crate) fn checked(raw: usize, count: usize) -> Option<Self> {
        (1..=count).contains(&raw).then_some(VariableId(raw))
    }

    /// The 1-based id as written in scripts.
    pub fn get(self) -> usize {
        self.0
    }

    fn index(self) -> usize {
        self.0 - 1
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:04}", self.0)
    }
}

/// Fixed-size table of numbered script variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables {
    values: Vec<Value>,
}

impl Variables {
    /// Create a table with `count` variables, all zero.
    pub fn new(count: usize) -> Self {
        Self {
            values: vec![Value::default(); count],
        }
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table has no variables at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Validate a raw 1-based id against this table.
    pub fn id(&self, raw: usize) -> Option<VariableId> {
        VariableId::checked(raw, self.values.len())
    }

    /// Read a variable.
    pub fn get(&self, id: VariableId) -> &Value {
        static ZERO: Value = Value::Number(0);
        self.values.get(id.index()).unwrap_or(&ZERO)
    }

    /// Write a variable.
    pub fn set(&mut self, id: VariableId, value: impl Into<Value>) {
        match self.values.get_mut(id.index()) {
            Some(slot) => *slot = value.into(),
            None => tracing::warn!(variable = %id, "write to variable outside the table ignored"),
        }
    }

    /// Iterate over `(id, value)` pairs that are not zero.
    pub fn non_zero(&self) -> impl Iterator<Item = (VariableId, &Value)> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_zero())
            .map(|(index, value)| (VariableId(index + 1), value))
    }
}
