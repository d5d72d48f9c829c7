//! Executor module for expression evaluation.
//!
//! The interpreter walks an expression tree over the columns of a table and
//! produces arrays or predicate masks.

pub mod vectorized;

pub use vectorized::{evaluate_predicate, evaluate_value, Interpreter, PredicateMask};
