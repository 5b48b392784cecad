//! Field schema and values reported by plugins.

use alloc::string::String;

/// How a field's value should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FieldKind {
    /// An absolute value (bytes, counts, temperatures).
    #[default]
    Scalar,
    /// A per-second rate derived from two consecutive samples.
    Rate,
    /// A value in the 0-100 range.
    Percent,
    /// Free-form text (device names, states).
    Text,
}

/// Static schema for one field a plugin reports.
///
/// Declared once at plugin registration and immutable thereafter.
/// The set of specs a plugin declares forms its entry in the field registry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldSpec {
    /// Field name, unique within the plugin (e.g. `"rx_rate"`).
    pub name: &'static str,
    /// Display unit (e.g. `"B/s"`, `"%"`, `"°C"`). Empty for unitless fields.
    pub unit: &'static str,
    /// How values of this field are interpreted.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Declare a field.
    pub const fn new(name: &'static str, unit: &'static str, kind: FieldKind) -> Self {
        Self { name, unit, kind }
    }
}

/// A single reported value.
///
/// Serializes untagged so the JSON wire form is the natural scalar
/// (`42`, `3.5`, `"eth0"`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// Unsigned integer value (counters, byte totals).
    Int(u64),
    /// Floating point value (rates, percentages).
    Float(f64),
    /// Text value.
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it has one.
    ///
    /// Text values have no numeric form and return `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(_) => None,
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(String::from(v))
    }
}

/// One `(field, value)` pair inside a record.
///
/// Carries the kind the value was reported with. A rate field reports
/// `Scalar` on the first sample, when no previous record exists to
/// difference against.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldValue {
    /// Field name, matching the plugin's declared [`FieldSpec`].
    pub field: String,
    /// Kind the value was reported with this tick.
    pub kind: FieldKind,
    /// The reported value.
    pub value: Value,
}

impl FieldValue {
    /// Create a field/value pair.
    pub fn new(field: impl Into<String>, kind: FieldKind, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            kind,
            value: value.into(),
        }
    }
}
