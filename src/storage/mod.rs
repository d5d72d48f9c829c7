//! Storage module for in-memory columnar data.
//!
//! This module provides the read-only inputs and freshly built outputs of
//! every operation:
//! - Named Arrow-backed columns ([`Column`])
//! - Tables of equal-length columns ([`Table`])

mod column;
mod table;

pub use column::Column;
pub use table::Table;
