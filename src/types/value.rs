//! Value and `DataType` definitions for tabula.

use std::fmt;

use arrow::datatypes::DataType as ArrowDataType;
use serde::{Deserialize, Serialize};

/// Element type tag.
///
/// The closed set of element kinds every component dispatches over, plus an
/// explicit `Unsupported` case for Arrow types (lists, structs, dates, ...)
/// that have no element path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Any storage type without an element path (nested/list types, ...).
    Unsupported,
}

impl DataType {
    /// Returns the display name of the data type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int64 => "INT64",
            DataType::Float64 => "FLOAT64",
            DataType::Bool => "BOOL",
            DataType::String => "STRING",
            DataType::Unsupported => "UNSUPPORTED",
        }
    }

    /// Converts from an Arrow data type.
    #[must_use]
    pub fn from_arrow(arrow_type: &ArrowDataType) -> Self {
        match arrow_type {
            ArrowDataType::Int64 => DataType::Int64,
            ArrowDataType::Float64 => DataType::Float64,
            ArrowDataType::Boolean => DataType::Bool,
            ArrowDataType::Utf8 => DataType::String,
            _ => DataType::Unsupported,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer value.
    Int64(i64),
    /// 64-bit floating point value.
    Float64(f64),
    /// Boolean value.
    Bool(bool),
    /// String value.
    String(String),
    /// Null value.
    Null,
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
