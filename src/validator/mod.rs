//! Row validation: splitting, rule fan-out, merge, and the validator pool
//!
//! A [`RowValidator`] checks one row at a time. It runs every rule of its
//! [`RuleSet`] concurrently, merges the partial results into one pooled
//! record, and hands that record to the write-back queue, or reports a
//! [`RowFailure`] to the error queue on the first rule failure. The
//! [`ValidatorPool`] bounds how many rows are in flight.

use thiserror::Error;

use crate::errors::ValidationError;

pub mod pool;
pub mod record_pool;
pub mod row;
pub mod row_validator;
pub mod rule;

pub use pool::{ValidatorGuard, ValidatorPool};
pub use record_pool::{FieldName, PooledRecord, Record, RecordPool, RecordPoolStats};
pub use row::Row;
pub use row_validator::RowValidator;
pub use rule::{FieldRule, FnRule, RuleSet, ValidationContext};

/// A row that did not make it into the store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("row {row} (id '{id}'): {error}")]
pub struct RowFailure {
    /// Line number in the input, header included
    pub row: u64,
    pub id: String,
    /// Name of the rule that failed, when a rule was responsible
    pub rule: Option<String>,
    #[source]
    pub error: ValidationError,
}

impl RowFailure {
    /// Store key for this failure
    pub fn key(&self) -> String {
        format!("err:row{}:id{}", self.row, self.id)
    }
}
