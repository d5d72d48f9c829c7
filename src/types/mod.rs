//! Type registry: element type tags, scalar values and numeric dispatch.

pub mod dispatch;
mod value;

pub use dispatch::{iterate_over, present_values, visit_numeric, NumericType, NumericVisitor};
pub use value::{DataType, Value};
