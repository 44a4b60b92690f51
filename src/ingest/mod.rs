//! Line-reading driver
//!
//! Reads the input line by line, hands each data row to a validator from the
//! pool and returns without waiting for persistence. [`Ingestor::shutdown`]
//! stops the pipeline in order: in-flight rows, validator pool, write-back
//! queue, error queue.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cache::DistributedCache;
use crate::config::Config;
use crate::errors::AppResult;
use crate::pipeline::{ErrorPipeline, QueueSender, WriteBackPipeline};
use crate::validator::{RecordPool, RowValidator, RuleSet, ValidationContext, ValidatorPool};

/// Outcome of an ingest run, available once every queue has drained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// Data rows submitted for validation, header excluded
    pub rows_read: u64,
    pub rows_valid: u64,
    pub rows_invalid: u64,
    pub records_written: u64,
    pub fields_written: u64,
    pub errors_written: u64,
    /// Store writes that failed in either pipeline
    pub write_failures: u64,
    pub elapsed: Duration,
    /// Mean wall time per progress interval, when at least one completed
    pub avg_interval_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct RowCounters {
    valid: AtomicU64,
    invalid: AtomicU64,
}

pub struct Ingestor {
    has_header: bool,
    progress_interval: u64,
    records: Arc<RecordPool>,
    validators: ValidatorPool,
    write_back: WriteBackPipeline,
    errors: ErrorPipeline,
    tasks: TaskTracker,
    counters: Arc<RowCounters>,
    next_row: u64,
    rows_read: u64,
    started: Instant,
    checkpoint: Instant,
    intervals: Vec<u64>,
}

impl Ingestor {
    /// Build the record pool, both pipelines and `validator_pool_size`
    /// validators sharing one read-only context. Must be called inside a
    /// tokio runtime.
    pub fn new(config: &Config, cache: Arc<dyn DistributedCache>, rules: RuleSet) -> Self {
        let pipeline = &config.pipeline;
        let records = RecordPool::new(pipeline.record_pool_max_idle);
        let context = Arc::new(
            ValidationContext::new(Arc::new(config.parser.clone()), Arc::clone(&records))
                .with_store(Arc::clone(&cache)),
        );

        let write_back = WriteBackPipeline::start(
            Arc::clone(&cache),
            pipeline.write_back_queue_capacity,
            pipeline.write_back_workers,
            pipeline.replace_existing,
        );
        let errors = ErrorPipeline::start(cache, pipeline.error_queue_capacity, pipeline.error_workers);

        let validators = (0..pipeline.validator_pool_size)
            .map(|_| {
                RowValidator::new(
                    Arc::clone(&context),
                    rules.clone(),
                    write_back.sender(),
                    errors.sender(),
                )
            })
            .collect();

        info!(
            validators = pipeline.validator_pool_size,
            rules = ?rules,
            delimiter = %config.parser.delimiter,
            expected_columns = config.parser.expected_columns,
            "Ingestor ready"
        );

        let now = Instant::now();
        Self {
            has_header: config.parser.has_header,
            progress_interval: pipeline.progress_interval.max(1),
            records,
            validators: ValidatorPool::new(validators),
            write_back,
            errors,
            tasks: TaskTracker::new(),
            counters: Arc::new(RowCounters::default()),
            next_row: 0,
            rows_read: 0,
            started: now,
            checkpoint: now,
            intervals: Vec::new(),
        }
    }

    /// Submit every line of `reader` for validation. Returns once the last
    /// row has been handed to a validator; rows may still be in flight.
    ///
    /// Rows are numbered from 0 with the header line counted, so the first
    /// data row of a file with a header is row 1.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD and the row is
    /// validated as usual, so one bad line never stops the run.
    pub async fn run<R>(&mut self, mut reader: R) -> AppResult<u64>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::with_capacity(4096);
        let mut submitted = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let row_number = self.next_row;
            self.next_row += 1;

            if row_number == 0 && self.has_header {
                debug!("Skipping header line");
                continue;
            }

            let line = match decode_line(&buf) {
                Cow::Borrowed(line) => line.to_string(),
                Cow::Owned(line) => {
                    warn!(row = row_number, "Line is not valid UTF-8, invalid bytes replaced");
                    line
                }
            };

            // blocks while every validator is busy
            let validator = self.validators.acquire().await?;
            let counters = Arc::clone(&self.counters);
            self.tasks.spawn(async move {
                match validator.validate(row_number, &line).await {
                    Ok(_) => counters.valid.fetch_add(1, Ordering::Relaxed),
                    Err(_) => counters.invalid.fetch_add(1, Ordering::Relaxed),
                };
            });
            submitted += 1;
            self.rows_read += 1;

            if row_number % self.progress_interval == 0 {
                self.report_progress(row_number);
            }
        }

        Ok(submitted)
    }

    fn report_progress(&mut self, row_number: u64) {
        let now = Instant::now();
        let interval_ms = u64::try_from(now.duration_since(self.checkpoint).as_millis())
            .unwrap_or(u64::MAX);
        self.checkpoint = now;
        self.intervals.push(interval_ms);

        let stats = self.records.stats();
        info!(
            rows = row_number,
            interval_ms,
            in_flight = self.tasks.len(),
            records_allocated = stats.allocated,
            records_reused = stats.reused,
            records_idle = stats.idle,
            records_in_use = stats.in_use,
            "Processed rows"
        );
        log_queue_depth(&self.write_back.sender());
        log_queue_depth(&self.errors.sender());
    }

    /// Rows submitted so far, header excluded
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Wait for in-flight rows, close the validator pool, then drain the
    /// write-back and error queues.
    pub async fn shutdown(self) -> IngestSummary {
        self.tasks.close();
        self.tasks.wait().await;
        info!(rows = self.rows_read, "Row parsing complete");

        self.validators.close_all().await;
        let written = self.write_back.shutdown().await;
        let errors = self.errors.shutdown().await;
        info!("Finished writing to cache");

        let avg_interval_ms = if self.intervals.is_empty() {
            None
        } else {
            Some(self.intervals.iter().sum::<u64>() / self.intervals.len() as u64)
        };

        let summary = IngestSummary {
            rows_read: self.rows_read,
            rows_valid: self.counters.valid.load(Ordering::Relaxed),
            rows_invalid: self.counters.invalid.load(Ordering::Relaxed),
            records_written: written.records_written,
            fields_written: written.fields_written,
            errors_written: errors.failures_recorded,
            write_failures: written.write_failures + errors.write_failures,
            elapsed: self.started.elapsed(),
            avg_interval_ms,
        };

        info!(
            rows = summary.rows_read,
            valid = summary.rows_valid,
            invalid = summary.rows_invalid,
            records_written = summary.records_written,
            errors_written = summary.errors_written,
            write_failures = summary.write_failures,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            avg_interval_ms = ?summary.avg_interval_ms,
            "Ingest finished"
        );
        summary
    }
}

fn log_queue_depth<T>(queue: &QueueSender<T>) {
    debug!(
        queue = queue.name(),
        queued = queue.queued(),
        capacity = queue.max_capacity(),
        "Queue depth"
    );
}

/// Strip the line terminator (`\n` or `\r\n`) and decode lossily
fn decode_line(buf: &[u8]) -> Cow<'_, str> {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line)
}
