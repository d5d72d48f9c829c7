//! Runtime type tag to compile-time specialization.
//!
//! A column's [`DataType`] is matched exactly once per call; the matched arm
//! invokes a routine generic over [`NumericType`], so the per-element loops
//! are monomorphized and never box or dynamically dispatch.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, PrimitiveArray};
use arrow::datatypes::{ArrowNativeType, ArrowPrimitiveType, Float64Type, Int64Type};

use crate::error::{Result, TabulaError};
use crate::storage::Column;
use crate::types::DataType;

/// Numeric element types with an accumulator path.
pub trait NumericType:
    ArrowNativeType + PartialOrd + Default + Debug + Send + Sync + 'static
{
    /// Arrow primitive type backing columns of this element type.
    type ArrowType: ArrowPrimitiveType<Native = Self>;

    /// Element type tag.
    const DATA_TYPE: DataType;

    /// Widens to f64.
    fn to_f64(self) -> f64;

    /// Addition; wraps on integer overflow.
    fn accumulate(self, other: Self) -> Self;

    /// Total order used for selection (NaN sorts last).
    fn total_cmp(&self, other: &Self) -> Ordering;

    /// Builds an Arrow array from optional values.
    fn into_array(values: Vec<Option<Self>>) -> ArrayRef {
        Arc::new(values.into_iter().collect::<PrimitiveArray<Self::ArrowType>>())
    }
}

impl NumericType for i64 {
    type ArrowType = Int64Type;
    const DATA_TYPE: DataType = DataType::Int64;

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn accumulate(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl NumericType for f64 {
    type ArrowType = Float64Type;
    const DATA_TYPE: DataType = DataType::Float64;

    fn to_f64(self) -> f64 {
        self
    }

    fn accumulate(self, other: Self) -> Self {
        self + other
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        f64::total_cmp(self, other)
    }
}

/// A routine generic over the numeric element type of a column.
pub trait NumericVisitor {
    /// Result of the visit.
    type Output;

    /// Runs the routine for element type `T`.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn visit<T: NumericType>(self, column: &Column) -> Result<Self::Output>;
}

/// Dispatches `visitor` on the column's element type.
///
/// # Errors
///
/// Returns `UnsupportedType` naming `operation` for Bool, String and
/// unsupported columns.
pub fn visit_numeric<V: NumericVisitor>(
    column: &Column,
    operation: &str,
    visitor: V,
) -> Result<V::Output> {
    match column.data_type() {
        DataType::Int64 => visitor.visit::<i64>(column),
        DataType::Float64 => visitor.visit::<f64>(column),
        DataType::Bool | DataType::String | DataType::Unsupported => {
            Err(TabulaError::unsupported(operation, column.arrow_type()))
        }
    }
}

/// Walks every row of a numeric column across all of its segments.
///
/// `on_row` receives `Some(value)` for present rows and `None` for null rows,
/// in row order.
///
/// # Errors
///
/// Returns `StructuralViolation` if a segment is not of type `T`.
pub fn iterate_over<T, F>(column: &Column, mut on_row: F) -> Result<()>
where
    T: NumericType,
    F: FnMut(Option<T>),
{
    for chunk in column.chunks() {
        let array = chunk
            .as_primitive_opt::<T::ArrowType>()
            .ok_or_else(|| segment_type_error(column, chunk.as_ref()))?;
        if array.null_count() == 0 {
            array.values().iter().for_each(|v| on_row(Some(*v)));
        } else {
            array.iter().for_each(&mut on_row);
        }
    }
    Ok(())
}

/// Collects the present values of a numeric column.
///
/// # Errors
///
/// Returns `StructuralViolation` if a segment is not of type `T`.
pub fn present_values<T: NumericType>(column: &Column) -> Result<Vec<T>> {
    let mut values = Vec::with_capacity(column.len() - column.null_count());
    iterate_over::<T, _>(column, |v| values.extend(v))?;
    Ok(values)
}

fn segment_type_error(column: &Column, chunk: &dyn Array) -> TabulaError {
    TabulaError::StructuralViolation(format!(
        "column `{}` declares {} but holds a segment of {}",
        column.name(),
        column.arrow_type(),
        chunk.data_type()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray};

    struct CountPresent;

    impl NumericVisitor for CountPresent {
        type Output = (DataType, usize);

        fn visit<T: NumericType>(self, column: &Column) -> Result<Self::Output> {
            Ok((T::DATA_TYPE, present_values::<T>(column)?.len()))
        }
    }

    #[test]
    fn test_visit_numeric_selects_element_type() {
        let ints = Column::new("a", Arc::new(Int64Array::from(vec![Some(1), None, Some(3)])));
        assert_eq!(
            visit_numeric(&ints, "count", CountPresent).unwrap(),
            (DataType::Int64, 2)
        );

        let floats = Column::new("b", Arc::new(Float64Array::from(vec![1.5])));
        assert_eq!(
            visit_numeric(&floats, "count", CountPresent).unwrap(),
            (DataType::Float64, 1)
        );
    }

    #[test]
    fn test_visit_numeric_rejects_strings() {
        let strings = Column::new("s", Arc::new(StringArray::from(vec!["x"])));
        let err = visit_numeric(&strings, "count", CountPresent).unwrap_err();
        assert!(matches!(err, TabulaError::UnsupportedType { .. }));
        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn test_iterate_over_spans_segments() {
        let column = Column::from_chunks(
            "a",
            vec![
                Arc::new(Int64Array::from(vec![Some(1), None])) as ArrayRef,
                Arc::new(Int64Array::from(vec![Some(5)])) as ArrayRef,
            ],
        )
        .unwrap();
        let mut seen = Vec::new();
        iterate_over::<i64, _>(&column, |v| seen.push(v)).unwrap();
        assert_eq!(seen, vec![Some(1), None, Some(5)]);
    }

    #[test]
    fn test_into_array_keeps_nulls() {
        let array = <i64 as NumericType>::into_array(vec![Some(4), None]);
        let array = array.as_primitive::<Int64Type>();
        assert_eq!(array.value(0), 4);
        assert!(array.is_null(1));

        let array = <f64 as NumericType>::into_array(vec![None]);
        assert_eq!(array.data_type(), &arrow::datatypes::DataType::Float64);
        assert_eq!(array.null_count(), 1);
    }

    #[test]
    fn test_float_total_cmp_orders_nan_last() {
        assert_eq!(NumericType::total_cmp(&1.0_f64, &f64::NAN), Ordering::Less);
    }
}
