//! tabula - columnar expression evaluation and statistics
//!
//! An in-memory execution kernel over Arrow-backed columns: a vectorized
//! interpreter for value and predicate trees, whole-column statistics,
//! per-group aggregation and Pearson correlation.

pub mod analysis;
pub mod error;
pub mod executor;
pub mod expression;
pub mod storage;
pub mod types;

use arrow::array::ArrayRef;
use serde::{Deserialize, Serialize};

pub use analysis::{AggregateFunction, AggregateRequest, GroupIndex};
pub use error::{Result, TabulaError};
pub use executor::{evaluate_predicate, evaluate_value, Interpreter, PredicateMask};
pub use expression::{
    Expr, Predicate, PredicateFromValueOperator, PredicateOperator, ValueOperator,
};
pub use storage::{Column, Table};
pub use types::{DataType, Value};

/// Default compiled-size cap for `Matches` patterns (10 MiB).
pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// Default number of per-row `Matches` patterns kept compiled.
pub const DEFAULT_REGEX_CACHE_CAPACITY: usize = 64;

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run independent per-column and per-pair passes on the rayon pool
    /// (default: false).
    pub parallel: bool,
    /// Compiled-size cap handed to the regex builder (default: 10 MiB).
    pub regex_size_limit: usize,
    /// Distinct per-row patterns cached while evaluating `Matches` (default: 64).
    pub regex_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
            regex_cache_capacity: DEFAULT_REGEX_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables parallel passes.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the compiled-size cap for `Matches` patterns.
    #[must_use]
    pub fn with_regex_size_limit(mut self, limit: usize) -> Self {
        self.regex_size_limit = limit;
        self
    }

    /// Sets the number of cached per-row `Matches` patterns.
    #[must_use]
    pub fn with_regex_cache_capacity(mut self, capacity: usize) -> Self {
        self.regex_cache_capacity = capacity;
        self
    }
}

/// Entry point bundling every operation with one configuration.
///
/// The engine holds no state besides its configuration; each call builds and
/// discards its own working buffers.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Engine { config }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluates a predicate into a row mask.
    ///
    /// # Errors
    ///
    /// See [`evaluate_predicate`].
    pub fn evaluate_predicate(
        &self,
        table: &Table,
        predicate: &Predicate,
        mapping: &[usize],
    ) -> Result<PredicateMask> {
        executor::vectorized::evaluator::evaluate_predicate_with(
            table,
            predicate,
            mapping,
            &self.config,
        )
    }

    /// Evaluates a value expression into an array.
    ///
    /// # Errors
    ///
    /// See [`evaluate_value`].
    pub fn evaluate_value(&self, table: &Table, expr: &Expr, mapping: &[usize]) -> Result<ArrayRef> {
        executor::vectorized::evaluator::evaluate_value_with(table, expr, mapping, &self.config)
    }

    /// Keeps the rows of `table` for which `predicate` holds.
    ///
    /// # Errors
    ///
    /// See [`evaluate_predicate`].
    pub fn filter(&self, table: &Table, predicate: &Predicate, mapping: &[usize]) -> Result<Table> {
        self.evaluate_predicate(table, predicate, mapping)?
            .filter(table)
    }

    /// Aggregates value columns per distinct key.
    ///
    /// # Errors
    ///
    /// See [`analysis::group_aggregate`].
    pub fn group_aggregate(
        &self,
        table: &Table,
        key: &Column,
        requests: &[AggregateRequest<'_>],
    ) -> Result<Table> {
        analysis::aggregate::group_aggregate_with(table, key, requests, &self.config)
    }

    /// Aggregates value columns over a grouping computed elsewhere.
    ///
    /// # Errors
    ///
    /// See [`analysis::group_aggregate_with_index`].
    pub fn group_aggregate_with_index(
        &self,
        table: &Table,
        key_name: &str,
        index: &GroupIndex,
        requests: &[AggregateRequest<'_>],
    ) -> Result<Table> {
        analysis::aggregate::aggregate_groups(table, key_name, index, requests, &self.config)
    }

    /// Pairwise correlation matrix of a table.
    ///
    /// # Errors
    ///
    /// See [`analysis::correlation_matrix`].
    pub fn correlation_matrix(&self, table: &Table) -> Result<Table> {
        analysis::correlation::correlation_matrix_with(table, &self.config)
    }

    /// Correlates `column` with every column of `table`.
    ///
    /// # Errors
    ///
    /// See [`analysis::correlation_with`].
    pub fn correlation_with(&self, table: &Table, column: &Column) -> Result<Column> {
        analysis::correlation_with(table, column)
    }

    /// Pearson correlation of two columns.
    ///
    /// # Errors
    ///
    /// See [`analysis::correlation`].
    pub fn correlation(&self, x: &Column, y: &Column) -> Result<f64> {
        analysis::correlation(x, y)
    }

    /// Correlation of a column with its own lagged copy.
    ///
    /// # Errors
    ///
    /// See [`analysis::auto_correlation`].
    pub fn auto_correlation(&self, column: &Column, lag: i64) -> Result<f64> {
        analysis::auto_correlation(column, lag)
    }

    /// Counts occurrences of each distinct value.
    ///
    /// # Errors
    ///
    /// See [`analysis::count_values`].
    pub fn count_values(&self, column: &Column) -> Result<Table> {
        analysis::count_values(column)
    }

    /// Quantile `q` of a numeric column.
    ///
    /// # Errors
    ///
    /// See [`analysis::quantile`].
    pub fn quantile(&self, column: &Column, q: f64) -> Result<Column> {
        analysis::quantile(column, q)
    }

    /// Computes one named statistic (`min`, `max`, `mean`, `sum`, `variance`,
    /// `std dev` or `median`) of a numeric column.
    ///
    /// # Errors
    ///
    /// Returns `NotImplemented` for an unknown statistic name, plus the
    /// errors of the statistic itself.
    pub fn statistic(&self, name: &str, column: &Column) -> Result<Column> {
        match name {
            "min" => analysis::minimum(column),
            "max" => analysis::maximum(column),
            "mean" => analysis::mean(column),
            "sum" => analysis::sum(column),
            "variance" => analysis::variance(column),
            "std dev" => analysis::standard_deviation(column),
            "median" => analysis::median(column),
            other => Err(TabulaError::NotImplemented(format!("statistic `{other}`"))),
        }
    }
}
