//! Contract tests for the public API: statistics invariants, correlation
//! symmetry, group aggregation shape and the reference evaluation scenarios.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Float64Type, Int64Type};
use tabula::analysis::{
    count_values, group_aggregate, maximum, mean, median, minimum, quantile, standard_deviation,
    sum, variance,
};
use tabula::{
    evaluate_predicate, evaluate_value, AggregateFunction, Column, Expr, GroupIndex, Predicate,
    PredicateFromValueOperator, Table, Value, ValueOperator,
};

fn ints(name: &str, values: Vec<Option<i64>>) -> Column {
    Column::new(name, Arc::new(Int64Array::from(values)) as ArrayRef)
}

fn floats(name: &str, values: Vec<Option<f64>>) -> Column {
    Column::new(name, Arc::new(Float64Array::from(values)) as ArrayRef)
}

fn strings(name: &str, values: Vec<Option<&str>>) -> Column {
    Column::new(name, Arc::new(StringArray::from(values)) as ArrayRef)
}

/// Reads a single-row statistic as a double, None if null.
fn scalar(column: &Column) -> Option<f64> {
    match column.value(0).expect("row 0") {
        Value::Int64(v) => Some(v as f64),
        Value::Float64(v) => Some(v),
        Value::Null => None,
        other => panic!("unexpected statistic value {other:?}"),
    }
}

// =============================================================================
// Column statistics
// =============================================================================

mod statistics_contracts {
    use super::*;

    // Contract: minimum <= median <= maximum and minimum <= mean <= maximum.
    #[test]
    fn test_central_values_lie_between_extremes() {
        let samples = [
            ints("x", vec![Some(5), Some(-3), None, Some(12), Some(0)]),
            floats("y", vec![Some(0.5), Some(0.25), Some(-8.0)]),
            ints("z", vec![Some(7)]),
        ];
        for column in &samples {
            let lo = scalar(&minimum(column).unwrap()).unwrap();
            let hi = scalar(&maximum(column).unwrap()).unwrap();
            let mid = scalar(&median(column).unwrap()).unwrap();
            let avg = scalar(&mean(column).unwrap()).unwrap();
            assert!(lo <= mid && mid <= hi, "median {mid} outside [{lo}, {hi}]");
            assert!(lo <= avg && avg <= hi, "mean {avg} outside [{lo}, {hi}]");
        }
    }

    // Contract: quantile(0) == minimum and quantile(1) == maximum.
    #[test]
    fn test_quantile_endpoints_are_extremes() {
        let column = floats("x", vec![Some(2.5), None, Some(-1.0), Some(9.75), Some(3.0)]);
        assert_eq!(
            scalar(&quantile(&column, 0.0).unwrap()),
            scalar(&minimum(&column).unwrap())
        );
        assert_eq!(
            scalar(&quantile(&column, 1.0).unwrap()),
            scalar(&maximum(&column).unwrap())
        );
    }

    // Contract: an all-null column yields null statistics, a zero sum and a
    // full-length Length.
    #[test]
    fn test_empty_sample_results() {
        let column = ints("x", vec![None, None, None]);
        for stat in [
            minimum(&column),
            maximum(&column),
            mean(&column),
            median(&column),
            variance(&column),
            standard_deviation(&column),
        ] {
            assert_eq!(scalar(&stat.unwrap()), None);
        }
        assert_eq!(scalar(&sum(&column).unwrap()), Some(0.0));

        let key = ints("k", vec![Some(1), Some(1), Some(1)]);
        let table = Table::try_new(vec![key.clone(), column.clone()]).unwrap();
        let functions = [
            AggregateFunction::First,
            AggregateFunction::Last,
            AggregateFunction::Length,
        ];
        let out = group_aggregate(&table, &key, &[(&column, &functions[..])]).unwrap();
        assert_eq!(out.column_by_name("x_first").unwrap().value(0).unwrap(), Value::Null);
        assert_eq!(out.column_by_name("x_last").unwrap().value(0).unwrap(), Value::Null);
        assert_eq!(
            out.column_by_name("x_length").unwrap().value(0).unwrap(),
            Value::Float64(3.0)
        );
    }

    // Scenario: countValues([1, 1, 2, null]) = {(1,2), (2,1), (null,1)}.
    #[test]
    fn test_count_values_scenario() {
        let out = count_values(&ints("x", vec![Some(1), Some(1), Some(2), None])).unwrap();
        let mut rows: Vec<(Value, Value)> = (0..out.num_rows())
            .map(|i| {
                (
                    out.column_by_name("value").unwrap().value(i).unwrap(),
                    out.column_by_name("count").unwrap().value(i).unwrap(),
                )
            })
            .collect();
        rows.sort_by_key(|(v, _)| format!("{v:?}"));
        assert_eq!(
            rows,
            vec![
                (Value::Int64(1), Value::Int64(2)),
                (Value::Int64(2), Value::Int64(1)),
                (Value::Null, Value::Int64(1)),
            ]
        );
    }
}

// =============================================================================
// Correlation
// =============================================================================

mod correlation_contracts {
    use super::*;
    use tabula::analysis::{correlation, correlation_matrix};

    // Contract: correlation(x, x) == 1 for non-constant columns.
    #[test]
    fn test_self_correlation_is_one() {
        let x = floats("x", vec![Some(1.0), Some(4.0), None, Some(-2.0), Some(0.5)]);
        assert_eq!(correlation(&x, &x).unwrap(), 1.0);
        let y = floats("y", vec![Some(0.0), Some(1.0), Some(2.0)]);
        assert_eq!(correlation(&y, &y).unwrap(), 1.0);
    }

    // Contract: correlation(a, b) == correlation(b, a).
    #[test]
    fn test_correlation_is_symmetric() {
        let a = ints("a", vec![Some(3), Some(1), Some(4), Some(1), Some(5)]);
        let b = floats("b", vec![Some(2.0), Some(7.0), Some(1.0), None, Some(8.0)]);
        assert_eq!(correlation(&a, &b).unwrap(), correlation(&b, &a).unwrap());
    }

    // Contract: correlationMatrix(T) is symmetric with a unit diagonal.
    #[test]
    fn test_matrix_symmetry() {
        let table = Table::try_new(vec![
            ints("a", vec![Some(1), Some(2), Some(3), Some(5)]),
            floats("b", vec![Some(9.0), Some(3.0), Some(4.0), Some(1.0)]),
            floats("c", vec![Some(0.0), None, Some(2.0), Some(2.5)]),
        ])
        .unwrap();
        let matrix = correlation_matrix(&table).unwrap();
        assert_eq!(matrix.num_columns(), 3);
        assert_eq!(matrix.num_rows(), 3);
        let cell = |i: usize, j: usize| {
            matrix.column(i).unwrap().to_array().unwrap().as_primitive::<Float64Type>().value(j)
        };
        for i in 0..3 {
            assert_eq!(cell(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(cell(i, j), cell(j, i));
            }
        }
    }
}

// =============================================================================
// Group aggregation
// =============================================================================

mod aggregation_contracts {
    use super::*;

    // Contract: one output row per group; per-group lengths sum to the row count.
    #[test]
    fn test_rows_match_group_count_and_lengths_sum() {
        let key = strings("k", vec![Some("x"), None, Some("y"), Some("x"), None, Some("z")]);
        let value = floats("v", vec![Some(1.0), None, Some(2.0), Some(3.0), Some(4.0), None]);
        let table = Table::try_new(vec![key.clone(), value.clone()]).unwrap();
        let functions = [AggregateFunction::Length];
        let out = group_aggregate(&table, &key, &[(&value, &functions[..])]).unwrap();

        let index = GroupIndex::build(&key).unwrap();
        assert_eq!(out.num_rows(), index.group_count());

        let lengths = out.column_by_name("v_length").unwrap().to_array().unwrap();
        let total: f64 = lengths.as_primitive::<Float64Type>().values().iter().sum();
        assert_eq!(total, 6.0);
    }

    // Contract: any GroupIndex provider can drive aggregation; group 0 is the
    // null group and comes first.
    #[test]
    fn test_external_group_index() {
        let value = ints("v", vec![Some(1), Some(2), Some(3), Some(4)]);
        let table = Table::try_new(vec![value.clone()]).unwrap();
        let index = GroupIndex::from_parts(
            vec![1, 0, 1, 2],
            true,
            3,
            Arc::new(StringArray::from(vec![None, Some("odd"), Some("even")])) as ArrayRef,
        )
        .unwrap();
        let functions = [AggregateFunction::Sum];
        let out = tabula::Engine::default()
            .group_aggregate_with_index(&table, "parity", &index, &[(&value, &functions[..])])
            .unwrap();
        assert_eq!(out.num_rows(), index.group_count());
        assert_eq!(out.column(0).unwrap().name(), "parity");
        assert_eq!(out.column(0).unwrap().value(0).unwrap(), Value::Null);
        let sums = out.column_by_name("v_sum").unwrap();
        assert_eq!(sums.value(0).unwrap(), Value::Float64(2.0));
        assert_eq!(sums.value(1).unwrap(), Value::Float64(4.0));
        assert_eq!(sums.value(2).unwrap(), Value::Float64(4.0));
    }

    // Scenario: key [a, b, a, null], value [1, 2, 3, 4], Sum => {null:4, a:4, b:2}.
    #[test]
    fn test_sum_scenario() {
        let key = strings("k", vec![Some("a"), Some("b"), Some("a"), None]);
        let value = ints("v", vec![Some(1), Some(2), Some(3), Some(4)]);
        let table = Table::try_new(vec![key.clone(), value.clone()]).unwrap();
        let functions = [AggregateFunction::Sum];
        let out = group_aggregate(&table, &key, &[(&value, &functions[..])]).unwrap();

        let keys = out.column(0).unwrap();
        let sums = out.column_by_name("v_sum").unwrap();
        assert_eq!(keys.value(0).unwrap(), Value::Null);
        assert_eq!(sums.value(0).unwrap(), Value::Float64(4.0));
        let mut rest: Vec<(Value, Value)> = (1..out.num_rows())
            .map(|i| (keys.value(i).unwrap(), sums.value(i).unwrap()))
            .collect();
        rest.sort_by_key(|(k, _)| format!("{k:?}"));
        assert_eq!(
            rest,
            vec![
                (Value::from("a"), Value::Float64(4.0)),
                (Value::from("b"), Value::Float64(2.0)),
            ]
        );
    }
}

// =============================================================================
// Interpreter scenarios
// =============================================================================

mod interpreter_contracts {
    use super::*;

    // Scenario: 2 * colA + 1 over [1, 2, 3] = [3, 5, 7].
    #[test]
    fn test_affine_expression() {
        let table = Table::try_new(vec![ints("a", vec![Some(1), Some(2), Some(3)])]).unwrap();
        let expr = Expr::binary(
            ValueOperator::Add,
            Expr::binary(ValueOperator::Multiply, Expr::literal(2), Expr::column(0)),
            Expr::literal(1),
        );
        let out = evaluate_value(&table, &expr, &[0]).unwrap();
        assert_eq!(out.as_primitive::<Int64Type>().values(), &[3, 5, 7]);
        assert_eq!(out.null_count(), 0);
    }

    // Scenario: colA > 1 AND colB == "x" over a=[1,2,3], b=["x","y","x"] = [0,0,1].
    #[test]
    fn test_conjunction_mask() {
        let table = Table::try_new(vec![
            ints("a", vec![Some(1), Some(2), Some(3)]),
            strings("b", vec![Some("x"), Some("y"), Some("x")]),
        ])
        .unwrap();
        let predicate = Predicate::and(
            Predicate::compare(
                PredicateFromValueOperator::Greater,
                Expr::column(0),
                Expr::literal(1),
            ),
            Predicate::compare(
                PredicateFromValueOperator::Equal,
                Expr::column(1),
                Expr::literal("x"),
            ),
        );
        let mask = evaluate_predicate(&table, &predicate, &[0, 1]).unwrap();
        assert_eq!(mask.as_bytes(), &[0, 0, 1]);
    }

    // Scenario: StartsWith("hello", "he") is true; StartsWith("he", "hello") is false.
    #[test]
    fn test_starts_with_direction() {
        let table = Table::try_new(vec![
            strings("long", vec![Some("hello")]),
            strings("short", vec![Some("he")]),
        ])
        .unwrap();
        let starts_with = |lhs: usize, rhs: usize| {
            let predicate = Predicate::compare(
                PredicateFromValueOperator::StartsWith,
                Expr::column(lhs),
                Expr::column(rhs),
            );
            evaluate_predicate(&table, &predicate, &[0, 1]).unwrap().as_bytes()[0]
        };
        assert_eq!(starts_with(0, 1), 1);
        assert_eq!(starts_with(1, 0), 0);
    }
}
