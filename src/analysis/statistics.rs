//! Whole-column statistics.
//!
//! Each statistic returns a single-row column named after the statistic.
//! Minimum, maximum and sum keep the source type; the others are Float64.

use std::marker::PhantomData;
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, UInt32Array};
use arrow::compute::take;
use tracing::debug_span;

use super::accumulator::{
    quantile_of, Accumulator, Maximum, Mean, Median, Minimum, StandardDeviation, Sum, Variance,
};
use super::group_index::GroupIndex;
use crate::error::{Result, TabulaError};
use crate::storage::{Column, Table};
use crate::types::{iterate_over, present_values, visit_numeric, NumericType, NumericVisitor};

/// A family of accumulators, one per numeric element type.
trait Statistic {
    type For<T: NumericType>: Accumulator<T>;
}

macro_rules! statistic {
    ($($marker:ident => $acc:ident),* $(,)?) => {
        $(
            struct $marker;

            impl Statistic for $marker {
                type For<T: NumericType> = $acc<T>;
            }
        )*
    };
}

statistic!(
    MinimumStat => Minimum,
    MaximumStat => Maximum,
    MeanStat => Mean,
    MedianStat => Median,
    VarianceStat => Variance,
    StandardDeviationStat => StandardDeviation,
    SumStat => Sum,
);

/// Runs one accumulator over every row of a numeric column.
struct Reduce<S>(PhantomData<S>);

impl<S: Statistic> NumericVisitor for Reduce<S> {
    type Output = Column;

    fn visit<T: NumericType>(self, column: &Column) -> Result<Column> {
        let mut accumulator: S::For<T> = Default::default();
        iterate_over::<T, _>(column, |value| match value {
            Some(v) => accumulator.update(v),
            None => accumulator.observe_null(),
        })?;

        let sampled = column.len() > column.null_count();
        let result = if sampled || !<S::For<T> as Accumulator<T>>::REQUIRES_SAMPLE {
            Some(accumulator.finalize())
        } else {
            None
        };
        Ok(Column::new(
            <S::For<T> as Accumulator<T>>::NAME,
            NumericType::into_array(vec![result]),
        ))
    }
}

fn reduce<S: Statistic>(column: &Column) -> Result<Column> {
    let name = <S::For<f64> as Accumulator<f64>>::NAME;
    let _span = debug_span!("statistic", name, rows = column.len()).entered();
    visit_numeric(column, name, Reduce::<S>(PhantomData))
}

/// Smallest present value; null if there is none.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric columns.
pub fn minimum(column: &Column) -> Result<Column> {
    reduce::<MinimumStat>(column)
}

/// Largest present value; null if there is none.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric columns.
pub fn maximum(column: &Column) -> Result<Column> {
    reduce::<MaximumStat>(column)
}

/// Arithmetic mean of present values; null if there are none.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric columns.
pub fn mean(column: &Column) -> Result<Column> {
    reduce::<MeanStat>(column)
}

/// Sum of present values in the source type; 0 if there are none.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric columns.
pub fn sum(column: &Column) -> Result<Column> {
    reduce::<SumStat>(column)
}

/// Population variance of present values; null if there are none.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric columns.
pub fn variance(column: &Column) -> Result<Column> {
    reduce::<VarianceStat>(column)
}

/// Population standard deviation of present values; null if there are none.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric columns.
pub fn standard_deviation(column: &Column) -> Result<Column> {
    reduce::<StandardDeviationStat>(column)
}

/// Median of present values; null if there are none.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric columns.
pub fn median(column: &Column) -> Result<Column> {
    reduce::<MedianStat>(column)
}

struct Quantile(f64);

impl NumericVisitor for Quantile {
    type Output = Option<f64>;

    fn visit<T: NumericType>(self, column: &Column) -> Result<Option<f64>> {
        let mut values = present_values::<T>(column)?;
        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(quantile_of(&mut values, self.0)))
    }
}

/// Linear-interpolation quantile `q` of present values, named `quantile <q>`.
///
/// # Errors
///
/// Returns `InvalidArgument` if `q` is NaN and `UnsupportedType` for
/// non-numeric columns.
pub fn quantile(column: &Column, q: f64) -> Result<Column> {
    if q.is_nan() {
        return Err(TabulaError::InvalidArgument(
            "quantile must be a number".to_string(),
        ));
    }
    let name = format!("quantile {q}");
    let _span = debug_span!("statistic", name = name.as_str(), rows = column.len()).entered();
    let result = visit_numeric(column, &name, Quantile(q))?;
    Ok(Column::new(name, Arc::new(Float64Array::from(vec![result]))))
}

/// Counts occurrences of each distinct value.
///
/// Returns a table with columns `value` (the source type) and `count`
/// (Int64). Values appear in first-seen order; if the column has nulls, a
/// final row holds a null value and the null count.
///
/// # Errors
///
/// Returns `UnsupportedType` for columns without an element path.
pub fn count_values(column: &Column) -> Result<Table> {
    let _span = debug_span!("count_values", rows = column.len()).entered();
    let index = GroupIndex::build(column)?;

    let mut counts = vec![0_i64; index.group_count()];
    for &id in index.group_ids() {
        counts[id as usize] += 1;
    }

    // Group 0 is the null group when present; move it to the end.
    let mut order: Vec<u32> = (0..index.group_count() as u32).collect();
    if index.has_nulls() {
        order.rotate_left(1);
    }
    let counts: Vec<i64> = order.iter().map(|&id| counts[id as usize]).collect();
    let values = take(index.unique_keys().as_ref(), &UInt32Array::from(order), None)?;

    Table::try_new(vec![
        Column::new("value", values),
        Column::new("count", Arc::new(Int64Array::from(counts))),
    ])
}
