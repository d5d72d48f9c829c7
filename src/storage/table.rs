//! Read-only tables of equal-length columns.

use std::sync::Arc;

use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::error::{Result, TabulaError};
use crate::storage::Column;

/// Ordered collection of equal-length columns.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    /// Creates a table from columns.
    ///
    /// # Errors
    ///
    /// Returns `StructuralViolation` if the columns differ in length.
    pub fn try_new(columns: Vec<Column>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, Column::len);
        if let Some(odd) = columns.iter().find(|c| c.len() != num_rows) {
            return Err(TabulaError::StructuralViolation(format!(
                "column `{}` has {} rows, expected {num_rows}",
                odd.name(),
                odd.len()
            )));
        }
        Ok(Table { columns, num_rows })
    }

    /// Wraps the columns of a record batch; storage is shared.
    #[must_use]
    pub fn from_record_batch(batch: &RecordBatch) -> Self {
        let columns = batch
            .schema()
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| Column::new(field.name().clone(), Arc::clone(array)))
            .collect();
        Table {
            columns,
            num_rows: batch.num_rows(),
        }
    }

    /// Exports the table as a record batch, concatenating multi-segment columns.
    ///
    /// # Errors
    ///
    /// Returns an Arrow error if concatenation or batch construction fails.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(c.name(), c.arrow_type().clone(), c.null_count() > 0))
            .collect();
        let arrays = self
            .columns
            .iter()
            .map(Column::to_array)
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns a column by position.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the first column with the given name.
    #[must_use]
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Returns all columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}
