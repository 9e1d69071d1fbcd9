// Parameter schema model for visualization components

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel option meaning "no column selected".
pub const NONE_OPTION: &str = "(none)";

/// Inferred type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Categorical,
    Numeric,
    Identifier,
    Unknown,
}

/// Which column types a column-bound parameter accepts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeFilter {
    /// No restriction.
    #[default]
    Any,
    /// Only columns of one of these types.
    OneOf(Vec<ColumnType>),
}

impl ColumnTypeFilter {
    pub fn only(types: &[ColumnType]) -> Self {
        ColumnTypeFilter::OneOf(types.to_vec())
    }

    pub fn accepts(&self, column_type: ColumnType) -> bool {
        match self {
            ColumnTypeFilter::Any => true,
            ColumnTypeFilter::OneOf(types) => types.contains(&column_type),
        }
    }
}

/// Closed set of parameter kinds, each with its own control strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// Binds a dataset column (x, y, color, ...).
    Dimension,
    /// Column-bound or fixed-choice scale selection.
    Scale,
    /// Non-negative number such as a width in pixels.
    Size,
    /// Free value passed through to the renderer.
    Literal,
}

impl ParameterKind {
    pub fn is_column_bound(self) -> bool {
        matches!(self, ParameterKind::Dimension | ParameterKind::Scale)
    }
}

/// A current or default parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    /// Numeric view; numeric strings are coerced.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Whether this value is the "(none)" sentinel.
    pub fn is_none_option(&self) -> bool {
        matches!(self, Value::Text(s) if s == NONE_OPTION)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// One configurable input of a component. Order within a descriptor is
/// display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub key: String,
    pub label: String,
    pub kind: ParameterKind,
    #[serde(default, rename = "columnTypeFilter")]
    pub column_type_filter: ColumnTypeFilter,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    /// Fixed choices for Scale/Literal selects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl ParameterSpec {
    fn new(key: &str, label: &str, kind: ParameterKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            column_type_filter: ColumnTypeFilter::Any,
            required: false,
            default: None,
            choices: Vec::new(),
        }
    }

    pub fn dimension(key: &str, label: &str) -> Self {
        Self::new(key, label, ParameterKind::Dimension)
    }

    pub fn scale(key: &str, label: &str) -> Self {
        Self::new(key, label, ParameterKind::Scale)
    }

    pub fn size(key: &str, label: &str, default: f64) -> Self {
        Self::new(key, label, ParameterKind::Size).with_default(Value::Number(default))
    }

    pub fn literal(key: &str, label: &str) -> Self {
        Self::new(key, label, ParameterKind::Literal)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn filter(mut self, types: &[ColumnType]) -> Self {
        self.column_type_filter = ColumnTypeFilter::only(types);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Whether the select is populated from dataset columns.
    pub fn selects_columns(&self) -> bool {
        self.kind.is_column_bound() && self.choices.is_empty()
    }
}
