//! Error types for tabula operations.

use arrow::error::ArrowError;
use thiserror::Error;

/// Result type alias using [`TabulaError`].
pub type Result<T> = std::result::Result<T, TabulaError>;

/// Error types for tabula operations.
///
/// Every failure is synchronous and propagated to the caller. The only
/// conditions that produce nulls instead of errors are the empty-sample
/// statistics and aggregates.
#[derive(Debug, Error)]
pub enum TabulaError {
    /// An operator or statistic was invoked on an element type it does not support.
    #[error("Unsupported type: {operation} does not support {data_type}")]
    UnsupportedType {
        operation: String,
        data_type: String,
    },

    /// Operand types are incompatible for the requested operator.
    #[error("Type mismatch: {operator} does not support operand types {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    /// A recognized-but-unhandled operator or function id.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A structural precondition was violated (segments, row counts, mappings).
    #[error("Structural violation: {0}")]
    StructuralViolation(String),

    /// The pattern given to `Matches` is not a valid regular expression.
    #[error("Malformed pattern `{pattern}`: {source}")]
    MalformedPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Integer division by zero in expression evaluation.
    #[error("Division by zero")]
    DivisionByZero,

    /// An argument outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure inside an Arrow kernel or builder.
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl TabulaError {
    pub(crate) fn unsupported(operation: impl Into<String>, data_type: impl ToString) -> Self {
        TabulaError::UnsupportedType {
            operation: operation.into(),
            data_type: data_type.to_string(),
        }
    }

    pub(crate) fn mismatch(
        operator: impl Into<String>,
        left: impl ToString,
        right: impl ToString,
    ) -> Self {
        TabulaError::TypeMismatch {
            operator: operator.into(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}
