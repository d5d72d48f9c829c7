//! Pearson correlation between columns.

use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, Float64Array};
use arrow::compute::concat;
use rayon::prelude::*;
use tracing::{debug_span, trace};

use crate::error::{Result, TabulaError};
use crate::storage::{Column, Table};
use crate::types::{iterate_over, visit_numeric, NumericType, NumericVisitor};
use crate::EngineConfig;

/// Centered second moments of a paired sample.
#[derive(Debug, Default)]
struct PairMoments {
    co_moment: f64,
    spread_x: f64,
    spread_y: f64,
}

impl PairMoments {
    /// Two passes: means first, then products of deviations. Swapping `x`
    /// and `y` yields bitwise-identical moments.
    fn of(pairs: &[(f64, f64)]) -> Self {
        let n = pairs.len() as f64;
        let (sum_x, sum_y) = pairs
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
        let (mean_x, mean_y) = (sum_x / n, sum_y / n);
        pairs.iter().fold(Self::default(), |mut m, &(x, y)| {
            let (dx, dy) = (x - mean_x, y - mean_y);
            m.co_moment += dx * dy;
            m.spread_x += dx * dx;
            m.spread_y += dy * dy;
            m
        })
    }

    fn correlation(&self) -> f64 {
        let r = self.co_moment / (self.spread_x.sqrt() * self.spread_y.sqrt());
        // Rounding can land a hair outside [-1, 1].
        r.clamp(-1.0, 1.0)
    }
}

/// Reads a numeric column as doubles, keeping nulls.
struct ToDoubles;

impl NumericVisitor for ToDoubles {
    type Output = Vec<Option<f64>>;

    fn visit<T: NumericType>(self, column: &Column) -> Result<Vec<Option<f64>>> {
        let mut values = Vec::with_capacity(column.len());
        iterate_over::<T, _>(column, |v| values.push(v.map(NumericType::to_f64)))?;
        Ok(values)
    }
}

/// Pearson correlation of two row-aligned numeric columns.
///
/// Rows where either side is null are skipped. Returns NaN if either column
/// is entirely null or constant. A column correlated with itself (same name
/// and storage) yields exactly 1.0.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric columns and
/// `StructuralViolation` if the row counts differ.
pub fn correlation(x: &Column, y: &Column) -> Result<f64> {
    let xs = visit_numeric(x, "correlation", ToDoubles)?;
    let ys = visit_numeric(y, "correlation", ToDoubles)?;
    if xs.len() != ys.len() {
        return Err(TabulaError::StructuralViolation(format!(
            "cannot correlate `{}` ({} rows) with `{}` ({} rows)",
            x.name(),
            xs.len(),
            y.name(),
            ys.len()
        )));
    }
    if x.is_all_null() || y.is_all_null() {
        return Ok(f64::NAN);
    }

    let pairs: Vec<(f64, f64)> = xs
        .into_iter()
        .zip(ys)
        .filter_map(|pair| match pair {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        })
        .collect();
    let r = PairMoments::of(&pairs).correlation();
    if x.same_as(y) && !r.is_nan() {
        return Ok(1.0);
    }
    Ok(r)
}

/// Correlates `column` with every column of `table`.
///
/// Returns one Float64 row per table column, named `<column>_CORR`. A table
/// column that is `column` itself yields exactly 1.0.
///
/// # Errors
///
/// Returns `StructuralViolation` if the row counts differ and
/// `UnsupportedType` if any column involved is not numeric.
pub fn correlation_with(table: &Table, column: &Column) -> Result<Column> {
    if table.num_rows() != column.len() {
        return Err(TabulaError::StructuralViolation(format!(
            "cannot correlate `{}` ({} rows) with a table of {} rows",
            column.name(),
            column.len(),
            table.num_rows()
        )));
    }
    let _span = debug_span!("correlation_with", columns = table.num_columns()).entered();
    let values = table
        .columns()
        .iter()
        .map(|other| correlation(column, other))
        .collect::<Result<Vec<f64>>>()?;
    Ok(Column::new(
        format!("{}_CORR", column.name()),
        Arc::new(Float64Array::from(values)),
    ))
}

/// Symmetric matrix of pairwise correlations with a unit diagonal.
///
/// Column `i` of the result is named after table column `i` and holds its
/// correlation with every table column.
///
/// # Errors
///
/// Returns `UnsupportedType` if any column is not numeric.
pub fn correlation_matrix(table: &Table) -> Result<Table> {
    correlation_matrix_with(table, &EngineConfig::default())
}

pub(crate) fn correlation_matrix_with(table: &Table, config: &EngineConfig) -> Result<Table> {
    let columns = table.columns();
    let n = columns.len();
    let _span = debug_span!("correlation_matrix", columns = n, rows = table.num_rows()).entered();

    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .collect();
    let pair_correlation = |&(i, j): &(usize, usize)| {
        trace!(left = columns[i].name(), right = columns[j].name(), "correlating pair");
        correlation(&columns[i], &columns[j])
    };
    let values: Vec<f64> = if config.parallel {
        pairs.par_iter().map(pair_correlation).collect::<Result<_>>()?
    } else {
        pairs.iter().map(pair_correlation).collect::<Result<_>>()?
    };

    let mut matrix = vec![vec![1.0_f64; n]; n];
    for (&(i, j), value) in pairs.iter().zip(values) {
        matrix[i][j] = value;
        matrix[j][i] = value;
    }

    let out = columns
        .iter()
        .zip(matrix)
        .map(|(column, values)| Column::new(column.name(), Arc::new(Float64Array::from(values))))
        .collect();
    Table::try_new(out)
}

/// Shifts a column by `lag` rows.
///
/// A positive lag moves values down, leaving the first `lag` rows null; a
/// negative lag moves them up, leaving the last rows null. The length and
/// name are unchanged.
///
/// # Errors
///
/// Returns an Arrow error if the shifted array cannot be assembled.
pub fn shift(column: &Column, lag: i64) -> Result<Column> {
    let array = column.to_array()?;
    let len = array.len();
    let distance = usize::try_from(lag.unsigned_abs()).map_or(len, |d| d.min(len));
    let kept = len - distance;
    let nulls = new_null_array(array.data_type(), distance);

    let shifted: ArrayRef = if lag >= 0 {
        concat(&[nulls.as_ref(), array.slice(0, kept).as_ref()])?
    } else {
        concat(&[array.slice(distance, kept).as_ref(), nulls.as_ref()])?
    };
    Ok(Column::new(column.name(), shifted))
}

/// Correlation of a column with itself shifted by `lag` rows.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric columns.
pub fn auto_correlation(column: &Column, lag: i64) -> Result<f64> {
    correlation(column, &shift(column, lag)?)
}
