//! Per-group aggregation over a key column.

use std::sync::Arc;

use arrow::array::Float64Array;
use rayon::prelude::*;
use tracing::{debug_span, trace};

use super::accumulator::{AggregateFunction, AnyAccumulator};
use super::group_index::GroupIndex;
use crate::error::{Result, TabulaError};
use crate::storage::{Column, Table};
use crate::types::{iterate_over, visit_numeric, NumericType, NumericVisitor};
use crate::EngineConfig;

/// A value column and the functions to compute over it per group.
pub type AggregateRequest<'c> = (&'c Column, &'c [AggregateFunction]);

/// Aggregates value columns per distinct key.
///
/// The result holds the distinct keys first (null key first if present, then
/// present keys in first-seen order) followed by one Float64 column per
/// requested function, named `<value column>_<function>`. Groups without a
/// present value yield null for functions that require a sample.
///
/// # Errors
///
/// Returns `StructuralViolation` if the key or a value column does not match
/// the table's row count, and `UnsupportedType` for list-typed keys or
/// non-numeric value columns.
pub fn group_aggregate(
    table: &Table,
    key: &Column,
    requests: &[AggregateRequest<'_>],
) -> Result<Table> {
    group_aggregate_with(table, key, requests, &EngineConfig::default())
}

pub(crate) fn group_aggregate_with(
    table: &Table,
    key: &Column,
    requests: &[AggregateRequest<'_>],
    config: &EngineConfig,
) -> Result<Table> {
    check_rows(table, key)?;
    let index = GroupIndex::build(key)?;
    aggregate_groups(table, key.name(), &index, requests, config)
}

/// Aggregates value columns over a grouping computed elsewhere.
///
/// `index` assigns every table row to a group; its unique keys become the
/// first output column, named `key_name`. Output otherwise matches
/// [`group_aggregate`].
///
/// # Errors
///
/// Returns `StructuralViolation` if the index or a value column does not
/// match the table's row count, and `UnsupportedType` for non-numeric value
/// columns.
pub fn group_aggregate_with_index(
    table: &Table,
    key_name: &str,
    index: &GroupIndex,
    requests: &[AggregateRequest<'_>],
) -> Result<Table> {
    aggregate_groups(table, key_name, index, requests, &EngineConfig::default())
}

pub(crate) fn aggregate_groups(
    table: &Table,
    key_name: &str,
    index: &GroupIndex,
    requests: &[AggregateRequest<'_>],
    config: &EngineConfig,
) -> Result<Table> {
    let rows = table.num_rows();
    if index.group_ids().len() != rows {
        return Err(TabulaError::StructuralViolation(format!(
            "group index covers {} rows but table has {rows}",
            index.group_ids().len()
        )));
    }
    for (column, _) in requests {
        check_rows(table, column)?;
    }

    let _span = debug_span!(
        "group_aggregate",
        rows,
        groups = index.group_count(),
        columns = requests.len()
    )
    .entered();

    let pass = |&(column, functions): &AggregateRequest<'_>| {
        trace!(column = column.name(), functions = functions.len(), "aggregating column");
        visit_numeric(column, "group aggregate", GroupPass { index, functions })
    };
    let per_column: Vec<Vec<Column>> = if config.parallel {
        requests.par_iter().map(pass).collect::<Result<_>>()?
    } else {
        requests.iter().map(pass).collect::<Result<_>>()?
    };

    let mut columns = Vec::with_capacity(1 + per_column.iter().map(Vec::len).sum::<usize>());
    columns.push(Column::new(key_name, Arc::clone(index.unique_keys())));
    columns.extend(per_column.into_iter().flatten());
    Table::try_new(columns)
}

fn check_rows(table: &Table, column: &Column) -> Result<()> {
    if column.len() == table.num_rows() {
        return Ok(());
    }
    Err(TabulaError::StructuralViolation(format!(
        "column `{}` has {} rows but table has {}",
        column.name(),
        column.len(),
        table.num_rows()
    )))
}

/// One walk over a value column feeding every group's accumulator set.
struct GroupPass<'i> {
    index: &'i GroupIndex,
    functions: &'i [AggregateFunction],
}

impl NumericVisitor for GroupPass<'_> {
    type Output = Vec<Column>;

    fn visit<T: NumericType>(self, column: &Column) -> Result<Vec<Column>> {
        let groups = self.index.group_count();
        let width = self.functions.len();

        // Accumulator sets laid out group-major: group g owns [g * width, (g + 1) * width).
        let mut accumulators: Vec<AnyAccumulator<T>> = (0..groups)
            .flat_map(|_| self.functions.iter().map(|f| AnyAccumulator::new(*f)))
            .collect();
        let mut had_value = vec![false; groups];

        let mut ids = self.index.group_ids().iter();
        iterate_over::<T, _>(column, |value| {
            let Some(&group) = ids.next() else {
                return;
            };
            let group = group as usize;
            let set = &mut accumulators[group * width..(group + 1) * width];
            match value {
                Some(v) => {
                    had_value[group] = true;
                    set.iter_mut().for_each(|acc| acc.update(v));
                }
                None => set.iter_mut().for_each(AnyAccumulator::observe_null),
            }
        })?;

        Ok(self
            .functions
            .iter()
            .enumerate()
            .map(|(slot, function)| {
                let values: Vec<Option<f64>> = (0..groups)
                    .map(|group| accumulators[group * width + slot].finalize(had_value[group]))
                    .collect();
                Column::new(
                    format!("{}_{}", column.name(), function.name()),
                    Arc::new(Float64Array::from(values)),
                )
            })
            .collect())
    }
}
