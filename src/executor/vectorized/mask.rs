//! Predicate masks and row filtering.

use arrow::array::BooleanArray;
use arrow::buffer::BooleanBuffer;
use arrow::compute::filter;

use super::operand::ByteMask;
use crate::error::{Result, TabulaError};
use crate::storage::{Column, Table};

/// Result of predicate evaluation: one 0/1 byte per table row.
///
/// Rows where the predicate evaluated to null hold 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateMask {
    bytes: Vec<u8>,
}

impl PredicateMask {
    /// Creates a mask from 0/1 bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        PredicateMask { bytes }
    }

    pub(crate) fn from_byte_mask(mask: ByteMask) -> Self {
        let (mut bytes, nulls) = mask.into_parts();
        if let Some(nulls) = nulls {
            for (byte, valid) in bytes.iter_mut().zip(nulls.iter()) {
                if !valid {
                    *byte = 0;
                }
            }
        }
        PredicateMask { bytes }
    }

    /// Returns the mask bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the mask into its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the number of rows covered by the mask.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the mask covers no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the number of selected rows.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.bytes.iter().filter(|b| **b != 0).count()
    }

    /// Returns the indices of selected rows.
    #[must_use]
    pub fn selected_indices(&self) -> Vec<u32> {
        self.bytes
            .iter()
            .enumerate()
            .filter(|(_, b)| **b != 0)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Converts the mask into an Arrow boolean array without nulls.
    #[must_use]
    pub fn to_boolean_array(&self) -> BooleanArray {
        BooleanArray::new(
            BooleanBuffer::from_iter(self.bytes.iter().map(|b| *b != 0)),
            None,
        )
    }

    /// Keeps the rows of `table` selected by this mask.
    ///
    /// # Errors
    ///
    /// Returns `StructuralViolation` if the mask and table differ in row
    /// count, or an Arrow error if filtering fails.
    pub fn filter(&self, table: &Table) -> Result<Table> {
        if self.len() != table.num_rows() {
            return Err(TabulaError::StructuralViolation(format!(
                "mask covers {} rows but table has {}",
                self.len(),
                table.num_rows()
            )));
        }
        let predicate = self.to_boolean_array();
        let columns = table
            .columns()
            .iter()
            .map(|column| {
                let filtered = filter(column.to_array()?.as_ref(), &predicate)?;
                Ok(Column::new(column.name(), filtered))
            })
            .collect::<Result<Vec<_>>>()?;
        Table::try_new(columns)
    }
}
