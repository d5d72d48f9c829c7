//! Expression tree definitions.
//!
//! Two node families: value nodes ([`Expr`]) produce scalars or arrays,
//! predicate nodes ([`Predicate`]) produce row masks. Operator nodes always
//! carry exactly [`MAX_OPERATOR_ARITY`] operand slots; unary operators leave
//! the second slot empty.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};
use crate::types::Value;

/// Number of operand slots on every operator node.
pub const MAX_OPERATOR_ARITY: usize = 2;

/// Fixed operand slots of an operator node.
pub type Operands<T> = [Option<Box<T>>; MAX_OPERATOR_ARITY];

/// Arithmetic/value operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueOperator {
    /// `lhs + rhs`
    Add,
    /// `lhs - rhs`
    Subtract,
    /// `lhs * rhs`
    Multiply,
    /// `lhs / rhs`
    Divide,
    /// `-lhs` (unary)
    Negate,
}

/// Operators comparing two values into a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateFromValueOperator {
    /// `lhs > rhs`
    Greater,
    /// `lhs < rhs`
    Lesser,
    /// `lhs == rhs`
    Equal,
    /// String prefix test.
    StartsWith,
    /// Whole-string regular expression match.
    Matches,
}

/// Boolean connectives over predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateOperator {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
    /// Negation (unary).
    Not,
}

macro_rules! operator_ids {
    ($ty:ident, $kind:literal, { $($variant:ident = $id:literal => $name:literal, $arity:literal;)* }) => {
        impl $ty {
            /// Resolves a numeric operator code.
            ///
            /// # Errors
            ///
            /// Returns `NotImplemented` for unknown codes.
            pub fn from_id(id: u8) -> Result<Self> {
                match id {
                    $($id => Ok($ty::$variant),)*
                    other => Err(TabulaError::NotImplemented(format!(
                        concat!($kind, " {}"),
                        other
                    ))),
                }
            }

            /// Returns the numeric operator code.
            #[must_use]
            pub fn id(self) -> u8 {
                match self {
                    $($ty::$variant => $id,)*
                }
            }

            /// Returns the operator name used in error messages.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)*
                }
            }

            /// Returns the number of operand slots the operator reads.
            #[must_use]
            pub fn arity(self) -> usize {
                match self {
                    $($ty::$variant => $arity,)*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

operator_ids!(ValueOperator, "value operator", {
    Add = 0 => "Add", 2;
    Subtract = 1 => "Subtract", 2;
    Multiply = 2 => "Multiply", 2;
    Divide = 3 => "Divide", 2;
    Negate = 4 => "Negate", 1;
});

operator_ids!(PredicateFromValueOperator, "predicate operator", {
    Greater = 0 => "Greater", 2;
    Lesser = 1 => "Lesser", 2;
    Equal = 2 => "Equal", 2;
    StartsWith = 3 => "StartsWith", 2;
    Matches = 4 => "Matches", 2;
});

operator_ids!(PredicateOperator, "predicate operator", {
    And = 0 => "And", 2;
    Or = 1 => "Or", 2;
    Not = 2 => "Not", 1;
});

/// Value node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a column slot; resolved through the column mapping.
    ColumnReference(usize),
    /// Constant of a declared type.
    Literal(Value),
    /// Arithmetic over value operands.
    ValueOperation {
        op: ValueOperator,
        operands: Operands<Expr>,
    },
}

impl Expr {
    /// Creates a column reference.
    #[must_use]
    pub fn column(slot: usize) -> Self {
        Expr::ColumnReference(slot)
    }

    /// Creates a literal.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Creates a binary value operation.
    #[must_use]
    pub fn binary(op: ValueOperator, lhs: Expr, rhs: Expr) -> Self {
        Expr::ValueOperation {
            op,
            operands: [Some(Box::new(lhs)), Some(Box::new(rhs))],
        }
    }

    /// Creates a unary value operation.
    #[must_use]
    pub fn unary(op: ValueOperator, operand: Expr) -> Self {
        Expr::ValueOperation {
            op,
            operands: [Some(Box::new(operand)), None],
        }
    }
}

/// Predicate node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Comparison of two value operands.
    FromValueOperation {
        op: PredicateFromValueOperator,
        operands: Operands<Expr>,
    },
    /// Boolean connective over predicate operands.
    Operation {
        op: PredicateOperator,
        operands: Operands<Predicate>,
    },
}

impl Predicate {
    /// Creates a comparison predicate.
    #[must_use]
    pub fn compare(op: PredicateFromValueOperator, lhs: Expr, rhs: Expr) -> Self {
        Predicate::FromValueOperation {
            op,
            operands: [Some(Box::new(lhs)), Some(Box::new(rhs))],
        }
    }

    /// Creates a conjunction.
    #[must_use]
    pub fn and(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::Operation {
            op: PredicateOperator::And,
            operands: [Some(Box::new(lhs)), Some(Box::new(rhs))],
        }
    }

    /// Creates a disjunction.
    #[must_use]
    pub fn or(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::Operation {
            op: PredicateOperator::Or,
            operands: [Some(Box::new(lhs)), Some(Box::new(rhs))],
        }
    }

    /// Creates a negation.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Predicate) -> Self {
        Predicate::Operation {
            op: PredicateOperator::Not,
            operands: [Some(Box::new(operand)), None],
        }
    }
}

/// Returns the operand in `slot`, failing if the tree left it empty.
///
/// # Errors
///
/// Returns `StructuralViolation` naming `operator` and the slot.
pub fn operand<'a, T>(operands: &'a Operands<T>, slot: usize, operator: &str) -> Result<&'a T> {
    operands
        .get(slot)
        .and_then(Option::as_deref)
        .ok_or_else(|| {
            TabulaError::StructuralViolation(format!("{operator} is missing operand {slot}"))
        })
}
