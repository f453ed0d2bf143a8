use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// A value produced by a variable resolver or by evaluating an expression.
///
/// Every integer or float input is normalised to `Number(f64)` when the value
/// is built, so the evaluator only ever deals with one numeric representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Double precision number
    Number(f64),
    /// Boolean value
    Boolean(bool),
    /// String value
    String(String),
}

/// Static result type reported by an expression.
///
/// Informational only: the parser never rejects a tree because of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionType {
    /// Not known before evaluation (e.g. a variable reference)
    #[default]
    Unknown,
    /// Numeric result
    Number,
    /// String result
    String,
    /// Boolean result
    Boolean,
    /// Date result
    Date,
    /// Array result
    Array,
}

impl Value {
    /// Static type of this value
    pub const fn value_type(&self) -> ExpressionType {
        match self {
            Self::Number(_) => ExpressionType::Number,
            Self::Boolean(_) => ExpressionType::Boolean,
            Self::String(_) => ExpressionType::String,
        }
    }

    /// Type name used in error messages
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
        }
    }

    /// The number held by this value, if it is numeric
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean held by this value, if it is a boolean
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The string held by this value, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a loosely typed command-line or configuration token.
    ///
    /// Numbers and `true`/`false` are recognised; anything else becomes a
    /// string with one layer of matching quotes removed.
    pub fn parse_loose(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Self::Number(n);
            }
        }
        match trimmed {
            "true" => return Self::Boolean(true),
            "false" => return Self::Boolean(false),
            _ => {}
        }
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
            .unwrap_or(trimmed);
        Self::String(unquoted.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

#[allow(clippy::cast_precision_loss)]
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

#[allow(clippy::cast_precision_loss)]
impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

#[allow(clippy::cast_precision_loss)]
impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

// -------------------------------------------------------------------------------------------------
// Conversions between `Value` and `serde_json::Value`, used when variables arrive as JSON
// documents and when results are printed as JSON.
// -------------------------------------------------------------------------------------------------

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Self::Null, Self::Number),
            Value::Boolean(b) => Self::Bool(*b),
            Value::String(s) => Self::String(s.clone()),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

impl TryFrom<&serde_json::Value> for Value {
    type Error = anyhow::Error;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match value {
            serde_json::Value::Number(n) => Self::Number(
                n.as_f64().ok_or_else(|| anyhow!("Unsupported number value: {}", n))?,
            ),
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Null => return Err(anyhow!("null is not a formula value")),
            serde_json::Value::Array(_) => return Err(anyhow!("arrays are not formula values")),
            serde_json::Value::Object(_) => {
                return Err(anyhow!("objects are not formula values"));
            }
        })
    }
}
