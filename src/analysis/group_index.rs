//! Row-to-group assignment for a key column.

use std::collections::HashMap;
use std::hash::Hash;

use arrow::array::{Array, ArrayRef, AsArray, UInt32Array};
use arrow::compute::take;
use arrow::datatypes::{Float64Type, Int64Type};

use crate::error::{Result, TabulaError};
use crate::storage::Column;
use crate::types::DataType;

/// Group assignment for every row of a key column.
///
/// When the key has nulls, group 0 is the null group and distinct present
/// keys take ids `1..group_count`; otherwise they take `0..group_count`.
/// Present keys are numbered in first-seen row order.
#[derive(Debug, Clone)]
pub struct GroupIndex {
    group_ids: Vec<u32>,
    has_nulls: bool,
    group_count: usize,
    unique_keys: ArrayRef,
}

impl GroupIndex {
    /// Builds the index for `key`.
    ///
    /// Floating-point keys group by value: `-0.0` and `0.0` share a group,
    /// as do all NaNs.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for key types without an element path
    /// (lists, structs, ...).
    pub fn build(key: &Column) -> Result<Self> {
        let array = key.to_array()?;
        let has_nulls = key.null_count() > 0;
        let (group_ids, first_rows) = match key.data_type() {
            DataType::Int64 => assign(
                array.as_primitive::<Int64Type>().iter(),
                array.len(),
                has_nulls,
            )?,
            DataType::Float64 => assign(
                array
                    .as_primitive::<Float64Type>()
                    .iter()
                    .map(|v| v.map(canonical_bits)),
                array.len(),
                has_nulls,
            )?,
            DataType::Bool => assign(array.as_boolean().iter(), array.len(), has_nulls)?,
            DataType::String => assign(
                array.as_string::<i32>().iter(),
                array.len(),
                has_nulls,
            )?,
            DataType::Unsupported => {
                return Err(TabulaError::unsupported("group by", key.arrow_type()));
            }
        };

        let indices = UInt32Array::from(first_rows);
        let unique_keys = take(array.as_ref(), &indices, None)?;
        Ok(GroupIndex {
            group_ids,
            has_nulls,
            group_count: unique_keys.len(),
            unique_keys,
        })
    }

    /// Assembles an index computed elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `StructuralViolation` if an id is out of range, `unique_keys`
    /// does not hold one row per group, or `has_nulls` disagrees with the
    /// null-ness of group 0.
    pub fn from_parts(
        group_ids: Vec<u32>,
        has_nulls: bool,
        group_count: usize,
        unique_keys: ArrayRef,
    ) -> Result<Self> {
        if unique_keys.len() != group_count {
            return Err(TabulaError::StructuralViolation(format!(
                "group index declares {group_count} groups but carries {} keys",
                unique_keys.len()
            )));
        }
        if let Some(bad) = group_ids.iter().find(|&&id| id as usize >= group_count) {
            return Err(TabulaError::StructuralViolation(format!(
                "group id {bad} is outside 0..{group_count}"
            )));
        }
        let null_first = group_count > 0 && unique_keys.is_null(0);
        if has_nulls != null_first {
            return Err(TabulaError::StructuralViolation(
                "group 0 must be the null group exactly when the key has nulls".to_string(),
            ));
        }
        Ok(GroupIndex {
            group_ids,
            has_nulls,
            group_count,
            unique_keys,
        })
    }

    /// Returns the group id of every row.
    #[must_use]
    pub fn group_ids(&self) -> &[u32] {
        &self.group_ids
    }

    /// Returns true if group 0 is the null group.
    #[must_use]
    pub fn has_nulls(&self) -> bool {
        self.has_nulls
    }

    /// Returns the number of groups, including the null group.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Returns one key per group, in group-id order.
    #[must_use]
    pub fn unique_keys(&self) -> &ArrayRef {
        &self.unique_keys
    }
}

/// Numbers distinct keys in first-seen order, reserving id 0 for nulls.
///
/// Returns the per-row ids and, per group in id order, the row where the
/// group's key first occurs.
fn assign<K, I>(keys: I, len: usize, has_nulls: bool) -> Result<(Vec<u32>, Vec<u32>)>
where
    K: Hash + Eq,
    I: Iterator<Item = Option<K>>,
{
    // Slot 0 holds the first null row once it is seen.
    let mut first_rows: Vec<u32> = if has_nulls { vec![0] } else { Vec::new() };
    let mut null_seen = false;

    let mut ids: HashMap<K, u32> = HashMap::new();
    let mut group_ids = Vec::with_capacity(len);
    for (row, key) in keys.enumerate() {
        let id = match key {
            None => {
                if !null_seen {
                    first_rows[0] = row_index(row)?;
                    null_seen = true;
                }
                0
            }
            Some(key) => match ids.get(&key) {
                Some(id) => *id,
                None => {
                    let id = row_index(first_rows.len())?;
                    first_rows.push(row_index(row)?);
                    ids.insert(key, id);
                    id
                }
            },
        };
        group_ids.push(id);
    }
    Ok((group_ids, first_rows))
}

fn row_index(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        TabulaError::StructuralViolation(format!("{value} exceeds the 32-bit group index range"))
    })
}

fn canonical_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0_f64.to_bits()
    } else {
        value.to_bits()
    }
}
