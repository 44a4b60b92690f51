use crate::errors::{RuleError, RuleResult};
use crate::validator::{FieldRule, Row, ValidationContext};

/// Rejects rows whose column count differs from `expected_columns`
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnCount;

impl FieldRule for ColumnCount {
    fn name(&self) -> &str {
        "column_count"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let expected = ctx.config().expected_columns;
        if row.len() != expected {
            return Err(RuleError::ColumnCount {
                expected,
                actual: row.len(),
            });
        }
        Ok(None)
    }
}
