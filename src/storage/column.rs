//! Named, immutable columns backed by Arrow arrays.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::concat;
use arrow::datatypes::{DataType as ArrowDataType, Float64Type, Int64Type};

use crate::error::{Result, TabulaError};
use crate::types::{DataType, Value};

/// A named, typed sequence of values with per-element validity.
///
/// Storage is one or more Arrow arrays ("segments") of the same type. Most
/// operations walk every segment; the expression interpreter only accepts
/// single-segment columns.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    arrow_type: ArrowDataType,
    chunks: Vec<ArrayRef>,
    len: usize,
    null_count: usize,
}

impl Column {
    /// Creates a single-segment column.
    #[must_use]
    pub fn new(name: impl Into<String>, array: ArrayRef) -> Self {
        Column {
            name: name.into(),
            arrow_type: array.data_type().clone(),
            len: array.len(),
            null_count: array.null_count(),
            chunks: vec![array],
        }
    }

    /// Creates a column from one or more segments.
    ///
    /// # Errors
    ///
    /// Returns `StructuralViolation` if `chunks` is empty or the segments
    /// disagree on their Arrow type.
    pub fn from_chunks(name: impl Into<String>, chunks: Vec<ArrayRef>) -> Result<Self> {
        let name = name.into();
        let Some(first) = chunks.first() else {
            return Err(TabulaError::StructuralViolation(format!(
                "column `{name}` has no segments"
            )));
        };
        let arrow_type = first.data_type().clone();
        if let Some(odd) = chunks.iter().find(|c| c.data_type() != &arrow_type) {
            return Err(TabulaError::StructuralViolation(format!(
                "column `{name}` mixes segments of {arrow_type} and {}",
                odd.data_type()
            )));
        }
        Ok(Column {
            len: chunks.iter().map(|c| c.len()).sum(),
            null_count: chunks.iter().map(|c| c.null_count()).sum(),
            name,
            arrow_type,
            chunks,
        })
    }

    /// Returns a copy of this column under a different name. Storage is shared.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the element type tag.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        DataType::from_arrow(&self.arrow_type)
    }

    /// Returns the underlying Arrow type.
    #[must_use]
    pub fn arrow_type(&self) -> &ArrowDataType {
        &self.arrow_type
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of null rows.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.null_count
    }

    /// Returns true if every row is null (including the empty column).
    #[must_use]
    pub fn is_all_null(&self) -> bool {
        self.null_count >= self.len
    }

    /// Returns the storage segments.
    #[must_use]
    pub fn chunks(&self) -> &[ArrayRef] {
        &self.chunks
    }

    /// Returns the only segment of a contiguous column.
    ///
    /// # Errors
    ///
    /// Returns `StructuralViolation` for multi-segment columns.
    pub fn single_chunk(&self) -> Result<&ArrayRef> {
        match self.chunks.as_slice() {
            [only] => Ok(only),
            chunks => Err(TabulaError::StructuralViolation(format!(
                "column `{}` has {} segments; only contiguous columns can be evaluated",
                self.name,
                chunks.len()
            ))),
        }
    }

    /// Returns the column as one contiguous array, concatenating segments if needed.
    ///
    /// # Errors
    ///
    /// Returns an Arrow error if concatenation fails.
    pub fn to_array(&self) -> Result<ArrayRef> {
        if let [only] = self.chunks.as_slice() {
            return Ok(Arc::clone(only));
        }
        let parts: Vec<&dyn Array> = self.chunks.iter().map(AsRef::as_ref).collect();
        Ok(concat(&parts)?)
    }

    /// Returns true if both columns share the same name and storage.
    #[must_use]
    pub fn same_as(&self, other: &Column) -> bool {
        self.name == other.name
            && self.chunks.len() == other.chunks.len()
            && self
                .chunks
                .iter()
                .zip(&other.chunks)
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }

    /// Reads a single row as a [`Value`].
    ///
    /// # Errors
    ///
    /// Returns `StructuralViolation` if `row` is out of range and
    /// `UnsupportedType` for columns without an element path.
    pub fn value(&self, row: usize) -> Result<Value> {
        let mut offset = row;
        for chunk in &self.chunks {
            if offset < chunk.len() {
                return value_at(chunk.as_ref(), offset);
            }
            offset -= chunk.len();
        }
        Err(TabulaError::StructuralViolation(format!(
            "row {row} out of range for column `{}` of length {}",
            self.name, self.len
        )))
    }
}

fn value_at(array: &dyn Array, i: usize) -> Result<Value> {
    if array.is_null(i) {
        return Ok(Value::Null);
    }
    match array.data_type() {
        ArrowDataType::Int64 => Ok(Value::Int64(array.as_primitive::<Int64Type>().value(i))),
        ArrowDataType::Float64 => Ok(Value::Float64(array.as_primitive::<Float64Type>().value(i))),
        ArrowDataType::Boolean => Ok(Value::Bool(array.as_boolean().value(i))),
        ArrowDataType::Utf8 => Ok(Value::String(array.as_string::<i32>().value(i).to_string())),
        other => Err(TabulaError::unsupported("reading a value", other)),
    }
}
