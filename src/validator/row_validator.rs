use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use super::record_pool::PooledRecord;
use super::row::Row;
use super::rule::{RuleSet, ValidationContext};
use super::RowFailure;
use crate::errors::{RuleError, ValidationError};
use crate::pipeline::{ErrorSender, WriteBackSender};

/// Validates one row end to end: split, fan out to every rule, merge, and
/// hand the result to the write-back or error queue.
pub struct RowValidator {
    context: Arc<ValidationContext>,
    rules: RuleSet,
    write_back: Option<WriteBackSender>,
    errors: Option<ErrorSender>,
}

impl RowValidator {
    pub fn new(
        context: Arc<ValidationContext>,
        rules: RuleSet,
        write_back: WriteBackSender,
        errors: ErrorSender,
    ) -> Self {
        Self {
            context,
            rules,
            write_back: Some(write_back),
            errors: Some(errors),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn is_closed(&self) -> bool {
        self.write_back.is_none()
    }

    /// Stop accepting rows and release this validator's queue handles
    pub fn close(&mut self) {
        self.write_back = None;
        self.errors = None;
    }

    /// Validate `raw_line`, the `row_number`-th line of the input.
    ///
    /// Returns the row id on success, after the aggregated record has been
    /// queued for write-back; this waits while the write-back queue is full.
    /// On failure the record is discarded, the failure is queued for the
    /// error pipeline and also returned.
    pub async fn validate(&self, row_number: u64, raw_line: &str) -> Result<String, RowFailure> {
        let (Some(write_back), Some(errors)) = (&self.write_back, &self.errors) else {
            return Err(RowFailure {
                row: row_number,
                id: String::new(),
                rule: None,
                error: ValidationError::Closed,
            });
        };

        let row = Arc::new(Row::split(raw_line, &self.context.config().delimiter));
        let id = row.id().to_string();

        let mut record = self.context.new_record();
        record.set("id", id.clone());
        record.set("raw", raw_line);

        let outcome = match self.run_rules(&row, &mut record).await {
            Ok(()) => match write_back.push(record).await {
                Ok(()) => Ok(id),
                Err(_unsent) => Err((None, ValidationError::WriteBackClosed)),
            },
            Err(failed) => {
                drop(record);
                Err(failed)
            }
        };

        match outcome {
            Ok(id) => {
                trace!(row = row_number, id = %id, "Row queued for write-back");
                Ok(id)
            }
            Err((rule, error)) => {
                let failure = RowFailure {
                    row: row_number,
                    id: row.id().to_string(),
                    rule,
                    error,
                };
                debug!(
                    row = row_number,
                    id = %failure.id,
                    rule = failure.rule.as_deref().unwrap_or("-"),
                    error = %failure.error,
                    "Row rejected"
                );
                if let Err(unsent) = errors.push(failure.clone()).await {
                    warn!(
                        row = unsent.row,
                        id = %unsent.id,
                        error = %ValidationError::ErrorQueueClosed,
                        "Row failure not recorded"
                    );
                }
                Err(failure)
            }
        }
    }

    /// Run every rule concurrently and merge successful partial results into
    /// `record`. Merging happens here, on the only task that owns `record`;
    /// the first failure returns immediately and the remaining tasks are
    /// aborted, so no later result is ever merged.
    async fn run_rules(
        &self,
        row: &Arc<Row>,
        record: &mut PooledRecord,
    ) -> Result<(), (Option<String>, ValidationError)> {
        let mut tasks = JoinSet::new();

        for (index, rule) in self.rules.iter().enumerate() {
            let rule = Arc::clone(rule);
            let context = Arc::clone(&self.context);
            let row = Arc::clone(row);

            tasks.spawn(async move {
                let result = catch_unwind(AssertUnwindSafe(|| rule.check(&context, &row)))
                    .unwrap_or_else(|payload| {
                        Err(RuleError::Panicked {
                            rule: rule.name().to_string(),
                            message: panic_message(payload.as_ref()),
                        })
                    });
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Some(partial)))) => record.absorb(partial),
                Ok((_, Ok(None))) => {}
                Ok((index, Err(error))) => {
                    tasks.abort_all();
                    let rule = self.rules.get(index).map(|rule| rule.name().to_string());
                    return Err((rule, error.into()));
                }
                Err(err) => {
                    tasks.abort_all();
                    return Err((
                        None,
                        ValidationError::TaskFailed {
                            message: err.to_string(),
                        },
                    ));
                }
            }
        }

        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
