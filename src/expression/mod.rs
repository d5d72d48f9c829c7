//! Expression trees evaluated by the vectorized interpreter.

pub mod ast;

pub use ast::{
    Expr, Operands, Predicate, PredicateFromValueOperator, PredicateOperator, ValueOperator,
    MAX_OPERATOR_ARITY,
};
