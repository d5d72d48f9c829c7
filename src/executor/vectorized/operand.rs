//! Operand model for vectorized evaluation.
//!
//! An operand is a scalar or a vector. Fixed-width vectors are contiguous
//! buffers, borrowed from a source column or owned when computed; booleans
//! are one byte per element. String vectors are read-only views over a
//! source column: the interpreter never builds a new string vector.

use std::borrow::Cow;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
};
use arrow::buffer::{BooleanBuffer, NullBuffer, ScalarBuffer};
use arrow::datatypes::{Float64Type, Int64Type};

use crate::error::{Result, TabulaError};
use crate::types::{DataType, Value};

/// Contiguous fixed-width buffer with optional validity.
#[derive(Debug, Clone)]
pub struct Vector<'a, T: Clone> {
    values: Cow<'a, [T]>,
    nulls: Option<NullBuffer>,
}

/// Byte-per-element boolean buffer (0/1) with optional validity.
pub type ByteMask = Vector<'static, u8>;

impl<'a, T: Clone> Vector<'a, T> {
    /// Wraps a buffer owned by a source column.
    #[must_use]
    pub fn borrowed(values: &'a [T], nulls: Option<NullBuffer>) -> Self {
        Vector {
            values: Cow::Borrowed(values),
            nulls,
        }
    }

    /// Wraps a freshly computed buffer.
    #[must_use]
    pub fn owned(values: Vec<T>, nulls: Option<NullBuffer>) -> Vector<'static, T> {
        Vector {
            values: Cow::Owned(values),
            nulls,
        }
    }

    /// Returns the elements.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Returns the validity buffer, if any row is null.
    #[must_use]
    pub fn nulls(&self) -> Option<&NullBuffer> {
        self.nulls.as_ref()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if row `i` is null.
    #[must_use]
    pub fn is_null(&self, i: usize) -> bool {
        self.nulls.as_ref().is_some_and(|n| n.is_null(i))
    }

    /// Consumes the vector into owned parts.
    #[must_use]
    pub fn into_parts(self) -> (Vec<T>, Option<NullBuffer>) {
        (self.values.into_owned(), self.nulls)
    }
}

/// A value flowing through expression evaluation.
#[derive(Debug, Clone)]
pub enum Operand<'a> {
    Int64(i64),
    Float64(f64),
    Bool(bool),
    String(&'a str),
    Int64Vector(Vector<'a, i64>),
    Float64Vector(Vector<'a, f64>),
    BoolVector(Vector<'a, u8>),
    StringVector(&'a StringArray),
}

impl<'a> Operand<'a> {
    /// Creates a scalar operand from a literal.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for a null literal.
    pub fn from_literal(value: &'a Value) -> Result<Self> {
        match value {
            Value::Int64(v) => Ok(Operand::Int64(*v)),
            Value::Float64(v) => Ok(Operand::Float64(*v)),
            Value::Bool(v) => Ok(Operand::Bool(*v)),
            Value::String(v) => Ok(Operand::String(v.as_str())),
            Value::Null => Err(TabulaError::unsupported("literal", "NULL")),
        }
    }

    /// Creates a vector operand viewing a contiguous source array.
    ///
    /// Boolean arrays are unpacked into one byte per element.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for arrays without an element path.
    pub fn from_array(array: &'a ArrayRef) -> Result<Self> {
        let nulls = array.nulls().cloned();
        match DataType::from_arrow(array.data_type()) {
            DataType::Int64 => Ok(Operand::Int64Vector(Vector::borrowed(
                array.as_primitive::<Int64Type>().values(),
                nulls,
            ))),
            DataType::Float64 => Ok(Operand::Float64Vector(Vector::borrowed(
                array.as_primitive::<Float64Type>().values(),
                nulls,
            ))),
            DataType::Bool => {
                let bytes = array.as_boolean().values().iter().map(u8::from).collect();
                Ok(Operand::BoolVector(Vector::owned(bytes, nulls)))
            }
            DataType::String => Ok(Operand::StringVector(array.as_string::<i32>())),
            DataType::Unsupported => Err(TabulaError::unsupported(
                "column reference",
                array.data_type(),
            )),
        }
    }

    /// Returns the element type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Operand::Int64(_) | Operand::Int64Vector(_) => DataType::Int64,
            Operand::Float64(_) | Operand::Float64Vector(_) => DataType::Float64,
            Operand::Bool(_) | Operand::BoolVector(_) => DataType::Bool,
            Operand::String(_) | Operand::StringVector(_) => DataType::String,
        }
    }

    /// Returns true for scalar operands.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Operand::Int64(_) | Operand::Float64(_) | Operand::Bool(_) | Operand::String(_)
        )
    }

    /// Classifies the operand by element type, leaving scalar/vector open.
    pub(crate) fn typed(&self) -> Typed<'_> {
        match self {
            Operand::Int64(v) => Typed::Int64(Side::Scalar(*v)),
            Operand::Int64Vector(v) => Typed::Int64(Side::Vector(v)),
            Operand::Float64(v) => Typed::Float64(Side::Scalar(*v)),
            Operand::Float64Vector(v) => Typed::Float64(Side::Vector(v)),
            Operand::Bool(v) => Typed::Bool(Side::Scalar(*v)),
            Operand::BoolVector(v) => Typed::Bool(Side::Vector(v)),
            Operand::String(v) => Typed::String(Side::Scalar(*v)),
            Operand::StringVector(v) => Typed::String(Side::Vector(*v)),
        }
    }

    /// Converts the operand into a [`Datum`] owned independently of the source.
    #[must_use]
    pub fn into_datum(self) -> Datum {
        match self {
            Operand::Int64(v) => Datum::Scalar(Value::Int64(v)),
            Operand::Float64(v) => Datum::Scalar(Value::Float64(v)),
            Operand::Bool(v) => Datum::Scalar(Value::Bool(v)),
            Operand::String(v) => Datum::Scalar(Value::String(v.to_string())),
            Operand::Int64Vector(v) => {
                let (values, nulls) = v.into_parts();
                Datum::Array(Arc::new(Int64Array::new(ScalarBuffer::from(values), nulls)))
            }
            Operand::Float64Vector(v) => {
                let (values, nulls) = v.into_parts();
                Datum::Array(Arc::new(Float64Array::new(ScalarBuffer::from(values), nulls)))
            }
            Operand::BoolVector(v) => Datum::Array(Arc::new(mask_to_boolean_array(&v))),
            Operand::StringVector(v) => Datum::Array(Arc::new(v.clone())),
        }
    }
}

/// Result of evaluating a value expression.
#[derive(Debug, Clone)]
pub enum Datum {
    /// The expression folded to a single value.
    Scalar(Value),
    /// One value per row.
    Array(ArrayRef),
}

impl Datum {
    /// Materializes the datum as an array of `len` rows.
    ///
    /// # Errors
    ///
    /// Returns `NotImplemented` when a string scalar would have to be built
    /// into a new string vector.
    pub fn into_array(self, len: usize) -> Result<ArrayRef> {
        match self {
            Datum::Array(array) => Ok(array),
            Datum::Scalar(Value::Int64(v)) => Ok(Arc::new(Int64Array::from(vec![v; len]))),
            Datum::Scalar(Value::Float64(v)) => Ok(Arc::new(Float64Array::from(vec![v; len]))),
            Datum::Scalar(Value::Bool(v)) => Ok(Arc::new(BooleanArray::from(vec![v; len]))),
            Datum::Scalar(Value::Null) => Ok(arrow::array::new_null_array(
                &arrow::datatypes::DataType::Int64,
                len,
            )),
            Datum::Scalar(Value::String(_)) => Err(TabulaError::NotImplemented(
                "building string column in interpreter".to_string(),
            )),
        }
    }
}

/// Converts a byte mask into an Arrow boolean array.
#[must_use]
pub fn mask_to_boolean_array(mask: &Vector<'_, u8>) -> BooleanArray {
    let values = BooleanBuffer::from_iter(mask.values().iter().map(|b| *b != 0));
    BooleanArray::new(values, mask.nulls().cloned())
}

/// Scalar or vector side of an operand whose element type is known.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Side<S, V> {
    Scalar(S),
    Vector(V),
}

impl<S, V> Side<S, V> {
    pub(crate) fn widen(self) -> Side<Widen<S>, Widen<V>> {
        match self {
            Side::Scalar(s) => Side::Scalar(Widen(s)),
            Side::Vector(v) => Side::Vector(Widen(v)),
        }
    }
}

/// Operand classified by element type.
pub(crate) enum Typed<'o> {
    Int64(Side<i64, &'o Vector<'o, i64>>),
    Float64(Side<f64, &'o Vector<'o, f64>>),
    Bool(Side<bool, &'o Vector<'o, u8>>),
    String(Side<&'o str, &'o StringArray>),
}

/// Row access shared by scalars and vectors; scalars repeat for every row.
pub(crate) trait Lane<T> {
    fn get(&self, i: usize) -> T;
    fn nulls(&self) -> Option<&NullBuffer>;
}

macro_rules! scalar_lane {
    ($($ty:ty),*) => {
        $(impl Lane<$ty> for $ty {
            fn get(&self, _i: usize) -> $ty {
                *self
            }
            fn nulls(&self) -> Option<&NullBuffer> {
                None
            }
        })*
    };
}

scalar_lane!(i64, f64, bool);

impl<'s> Lane<&'s str> for &'s str {
    fn get(&self, _i: usize) -> &'s str {
        self
    }
    fn nulls(&self) -> Option<&NullBuffer> {
        None
    }
}

impl Lane<i64> for &Vector<'_, i64> {
    fn get(&self, i: usize) -> i64 {
        self.values[i]
    }
    fn nulls(&self) -> Option<&NullBuffer> {
        self.nulls.as_ref()
    }
}

impl Lane<f64> for &Vector<'_, f64> {
    fn get(&self, i: usize) -> f64 {
        self.values[i]
    }
    fn nulls(&self) -> Option<&NullBuffer> {
        self.nulls.as_ref()
    }
}

impl Lane<bool> for &Vector<'_, u8> {
    fn get(&self, i: usize) -> bool {
        self.values[i] != 0
    }
    fn nulls(&self) -> Option<&NullBuffer> {
        self.nulls.as_ref()
    }
}

impl<'s> Lane<&'s str> for &'s StringArray {
    fn get(&self, i: usize) -> &'s str {
        let array: &'s StringArray = self;
        array.value(i)
    }
    fn nulls(&self) -> Option<&NullBuffer> {
        Array::nulls(*self)
    }
}

/// Int64 lane read as Float64 for mixed numeric operands.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Widen<L>(L);

impl<L: Lane<i64>> Lane<f64> for Widen<L> {
    fn get(&self, i: usize) -> f64 {
        self.0.get(i) as f64
    }
    fn nulls(&self) -> Option<&NullBuffer> {
        self.0.nulls()
    }
}

/// Applies `f` to every row of two lanes.
///
/// Null rows (in either input) are skipped and yield `O::default()` under a
/// null validity bit; `f` is only called for rows where both inputs are present.
pub(crate) fn try_map2<A, B, O, L, R, F>(
    lhs: &L,
    rhs: &R,
    len: usize,
    mut f: F,
) -> Result<Vector<'static, O>>
where
    O: Clone + Default,
    L: Lane<A>,
    R: Lane<B>,
    F: FnMut(A, B) -> Result<O>,
{
    let nulls = NullBuffer::union(lhs.nulls(), rhs.nulls());
    let mut values = Vec::with_capacity(len);
    match &nulls {
        None => {
            for i in 0..len {
                values.push(f(lhs.get(i), rhs.get(i))?);
            }
        }
        Some(validity) => {
            for i in 0..len {
                if validity.is_valid(i) {
                    values.push(f(lhs.get(i), rhs.get(i))?);
                } else {
                    values.push(O::default());
                }
            }
        }
    }
    Ok(Vector::owned(values, nulls))
}

/// Applies `f` to every row of one lane.
pub(crate) fn map1<A, O, L, F>(operand: &L, len: usize, f: F) -> Vector<'static, O>
where
    O: Clone,
    L: Lane<A>,
    F: Fn(A) -> O,
{
    let values = (0..len).map(|i| f(operand.get(i))).collect();
    Vector::owned(values, operand.nulls().cloned())
}
