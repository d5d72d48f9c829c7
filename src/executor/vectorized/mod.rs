//! Vectorized execution module.
//!
//! Expressions are evaluated column-at-a-time over contiguous Arrow buffers:
//! the element type of each operand is resolved once per operator, and the
//! row loop runs on concrete types.

pub mod evaluator;
pub mod kernels;
mod mask;
pub mod operand;

pub use evaluator::{evaluate_predicate, evaluate_value, Interpreter};
pub use kernels::PatternCache;
pub use mask::PredicateMask;
pub use operand::{mask_to_boolean_array, ByteMask, Datum, Operand, Vector};
