//! Vectorized expression interpreter.

use arrow::array::ArrayRef;
use tracing::debug_span;

use super::kernels::{self, PatternCache};
use super::mask::PredicateMask;
use super::operand::{ByteMask, Operand};
use crate::error::{Result, TabulaError};
use crate::expression::ast::operand;
use crate::expression::{Expr, Predicate};
use crate::storage::{Column, Table};
use crate::EngineConfig;

/// Evaluates expression trees against one table.
///
/// Column references in the tree are slot numbers translated through
/// `mapping` into table column positions. Operands borrow column storage for
/// the interpreter's lifetime.
pub struct Interpreter<'a> {
    table: &'a Table,
    mapping: &'a [usize],
    patterns: PatternCache,
}

impl<'a> Interpreter<'a> {
    /// Creates an interpreter over `table`.
    ///
    /// # Errors
    ///
    /// Returns `StructuralViolation` if `mapping` names a column the table
    /// does not have.
    pub fn new(table: &'a Table, mapping: &'a [usize], config: &EngineConfig) -> Result<Self> {
        if let Some(bad) = mapping.iter().find(|&&index| index >= table.num_columns()) {
            return Err(TabulaError::StructuralViolation(format!(
                "column mapping refers to column {bad} but table has {}",
                table.num_columns()
            )));
        }
        Ok(Interpreter {
            table,
            mapping,
            patterns: PatternCache::new(config.regex_size_limit, config.regex_cache_capacity),
        })
    }

    /// Returns the number of rows every vector operand spans.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.table.num_rows()
    }

    fn column(&self, slot: usize) -> Result<&'a Column> {
        let table: &'a Table = self.table;
        self.mapping
            .get(slot)
            .and_then(|&index| table.column(index))
            .ok_or_else(|| {
                TabulaError::StructuralViolation(format!(
                    "column reference {slot} is outside the column mapping"
                ))
            })
    }

    /// Evaluates a value node to a scalar or vector operand.
    ///
    /// # Errors
    ///
    /// Propagates type, structural and arithmetic errors from the tree.
    pub fn evaluate_value(&mut self, expr: &'a Expr) -> Result<Operand<'a>> {
        let len = self.num_rows();
        match expr {
            Expr::ColumnReference(slot) => Operand::from_array(self.column(*slot)?.single_chunk()?),
            Expr::Literal(value) => Operand::from_literal(value),
            Expr::ValueOperation { op, operands } => {
                let lhs = self.evaluate_value(operand(operands, 0, op.name())?)?;
                if op.arity() == 1 {
                    return kernels::unary_arithmetic(*op, &lhs, len);
                }
                let rhs = self.evaluate_value(operand(operands, 1, op.name())?)?;
                kernels::arithmetic(*op, &lhs, &rhs, len)
            }
        }
    }

    /// Evaluates a predicate node to a byte mask with validity.
    ///
    /// # Errors
    ///
    /// Propagates type, structural and pattern errors from the tree.
    pub fn evaluate(&mut self, predicate: &'a Predicate) -> Result<ByteMask> {
        let len = self.num_rows();
        match predicate {
            Predicate::FromValueOperation { op, operands } => {
                let lhs = self.evaluate_value(operand(operands, 0, op.name())?)?;
                let rhs = self.evaluate_value(operand(operands, 1, op.name())?)?;
                kernels::compare(*op, &lhs, &rhs, len, &mut self.patterns)
            }
            Predicate::Operation { op, operands } => {
                let lhs = self.evaluate(operand(operands, 0, op.name())?)?;
                if op.arity() == 1 {
                    return kernels::unary_connective(*op, &lhs);
                }
                let rhs = self.evaluate(operand(operands, 1, op.name())?)?;
                kernels::binary_connective(*op, &lhs, &rhs)
            }
        }
    }
}

/// Evaluates `predicate` over every row of `table`.
///
/// # Errors
///
/// Returns an error if the tree is ill-typed, references a column outside
/// `mapping`, reads a multi-segment column, or carries a malformed pattern.
pub fn evaluate_predicate(
    table: &Table,
    predicate: &Predicate,
    mapping: &[usize],
) -> Result<PredicateMask> {
    evaluate_predicate_with(table, predicate, mapping, &EngineConfig::default())
}

pub(crate) fn evaluate_predicate_with(
    table: &Table,
    predicate: &Predicate,
    mapping: &[usize],
    config: &EngineConfig,
) -> Result<PredicateMask> {
    let _span = debug_span!("evaluate_predicate", rows = table.num_rows()).entered();
    let mut interpreter = Interpreter::new(table, mapping, config)?;
    let mask = interpreter.evaluate(predicate)?;
    Ok(PredicateMask::from_byte_mask(mask))
}

/// Evaluates `expr` into an array of `table.num_rows()` rows.
///
/// Scalar results are broadcast at this boundary.
///
/// # Errors
///
/// Returns an error for the same conditions as [`evaluate_predicate`], and
/// `NotImplemented` if a string scalar would have to become a new string column.
pub fn evaluate_value(table: &Table, expr: &Expr, mapping: &[usize]) -> Result<ArrayRef> {
    evaluate_value_with(table, expr, mapping, &EngineConfig::default())
}

pub(crate) fn evaluate_value_with(
    table: &Table,
    expr: &Expr,
    mapping: &[usize],
    config: &EngineConfig,
) -> Result<ArrayRef> {
    let _span = debug_span!("evaluate_value", rows = table.num_rows()).entered();
    let mut interpreter = Interpreter::new(table, mapping, config)?;
    interpreter
        .evaluate_value(expr)?
        .into_datum()
        .into_array(table.num_rows())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use arrow::array::{Array, AsArray, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Float64Type, Int64Type};
    use crate::expression::{PredicateFromValueOperator, PredicateOperator, ValueOperator};

    fn table() -> Table {
        Table::try_new(vec![
            Column::new("a", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            Column::new("b", Arc::new(StringArray::from(vec!["x", "y", "x"])) as ArrayRef),
            Column::new(
                "c",
                Arc::new(Float64Array::from(vec![Some(0.5), None, Some(2.5)])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_two_times_column_plus_one() {
        let expr = Expr::binary(
            ValueOperator::Add,
            Expr::binary(ValueOperator::Multiply, Expr::literal(2), Expr::column(0)),
            Expr::literal(1),
        );
        let out = evaluate_value(&table(), &expr, &[0]).unwrap();
        assert_eq!(out.as_primitive::<Int64Type>().values(), &[3, 5, 7]);
    }

    #[test]
    fn test_mapping_translates_slots() {
        let expr = Expr::column(0);
        let out = evaluate_value(&table(), &expr, &[2]).unwrap();
        assert!(out.is_null(1));
        assert_eq!(out.as_primitive::<Float64Type>().value(2), 2.5);
    }

    #[test]
    fn test_scalar_only_expression_broadcasts() {
        let expr = Expr::binary(ValueOperator::Subtract, Expr::literal(10), Expr::literal(4));
        let out = evaluate_value(&table(), &expr, &[]).unwrap();
        assert_eq!(out.as_primitive::<Int64Type>().values(), &[6, 6, 6]);
    }

    #[test]
    fn test_and_predicate() {
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
        let mask = evaluate_predicate(&table(), &predicate, &[0, 1]).unwrap();
        assert_eq!(mask.as_bytes(), &[0, 0, 1]);
    }

    #[test]
    fn test_null_row_masks_to_zero() {
        let predicate = Predicate::not(Predicate::compare(
            PredicateFromValueOperator::Greater,
            Expr::column(0),
            Expr::literal(1.0),
        ));
        let mask = evaluate_predicate(&table(), &predicate, &[2]).unwrap();
        assert_eq!(mask.as_bytes(), &[1, 0, 0]);
    }

    #[test]
    fn test_bad_mapping_is_structural() {
        let predicate = Predicate::compare(
            PredicateFromValueOperator::Equal,
            Expr::column(0),
            Expr::literal(1),
        );
        let err = evaluate_predicate(&table(), &predicate, &[7]).unwrap_err();
        assert!(matches!(err, TabulaError::StructuralViolation(_)));

        let err = evaluate_predicate(&table(), &predicate, &[]).unwrap_err();
        assert!(matches!(err, TabulaError::StructuralViolation(_)));
    }

    #[test]
    fn test_multi_segment_column_is_structural() {
        let chunked = Column::from_chunks(
            "a",
            vec![
                Arc::new(Int64Array::from(vec![1])) as ArrayRef,
                Arc::new(Int64Array::from(vec![2])) as ArrayRef,
            ],
        )
        .unwrap();
        let table = Table::try_new(vec![chunked]).unwrap();
        let err = evaluate_value(&table, &Expr::column(0), &[0]).unwrap_err();
        assert!(matches!(err, TabulaError::StructuralViolation(_)));
    }

    #[test]
    fn test_missing_operand_slot_is_structural() {
        let predicate = Predicate::Operation {
            op: PredicateOperator::And,
            operands: [
                Some(Box::new(Predicate::compare(
                    PredicateFromValueOperator::Equal,
                    Expr::literal(1),
                    Expr::literal(1),
                ))),
                None,
            ],
        };
        let err = evaluate_predicate(&table(), &predicate, &[]).unwrap_err();
        assert!(matches!(err, TabulaError::StructuralViolation(_)));
    }

    #[test]
    fn test_string_literal_value_is_not_implemented() {
        let err = evaluate_value(&table(), &Expr::literal("x"), &[]).unwrap_err();
        assert!(matches!(err, TabulaError::NotImplemented(_)));
    }
}
