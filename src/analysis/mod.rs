//! Statistics, group aggregation and correlation.
//!
//! All reductions run through the accumulators in [`accumulator`]; numeric
//! columns are dispatched once per call to a routine specialized for their
//! element type.

pub mod accumulator;
pub mod aggregate;
pub mod correlation;
pub mod group_index;
pub mod statistics;

pub use accumulator::{Accumulator, AggregateFunction, AnyAccumulator};
pub use aggregate::{group_aggregate, group_aggregate_with_index, AggregateRequest};
pub use correlation::{auto_correlation, correlation, correlation_matrix, correlation_with, shift};
pub use group_index::GroupIndex;
pub use statistics::{
    count_values, maximum, mean, median, minimum, quantile, standard_deviation, sum, variance,
};
