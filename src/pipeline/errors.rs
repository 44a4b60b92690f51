use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::worker_pool::{QueueHandler, QueueSender, WorkerPool};
use crate::cache::DistributedCache;
use crate::validator::RowFailure;

pub type ErrorSender = QueueSender<RowFailure>;

/// Totals reported once the error workers have drained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorSummary {
    pub failures_recorded: u64,
    pub write_failures: u64,
}

#[derive(Debug, Default)]
struct ErrorCounters {
    failures_recorded: AtomicU64,
    write_failures: AtomicU64,
}

struct FailureWriter {
    cache: Arc<dyn DistributedCache>,
    counters: Arc<ErrorCounters>,
}

#[async_trait]
impl QueueHandler<RowFailure> for FailureWriter {
    async fn handle(&self, failure: RowFailure) {
        let key = failure.key();
        let message = failure.error.to_string();

        debug!(
            row = failure.row,
            id = %failure.id,
            rule = failure.rule.as_deref().unwrap_or("-"),
            error = %message,
            "Row failed validation"
        );

        match self.cache.set(&key, &message).await {
            Ok(()) => {
                self.counters.failures_recorded.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %err, "Error writing to cache");
            }
        }
    }
}

/// Persists row failures under `err:row{row}:id{id}` through a fixed set of workers
pub struct ErrorPipeline {
    sender: ErrorSender,
    workers: WorkerPool,
    counters: Arc<ErrorCounters>,
}

impl ErrorPipeline {
    pub fn start(cache: Arc<dyn DistributedCache>, capacity: usize, worker_count: usize) -> Self {
        let counters = Arc::new(ErrorCounters::default());
        let writer = Arc::new(FailureWriter {
            cache,
            counters: Arc::clone(&counters),
        });
        let (sender, workers) = WorkerPool::start("errors", capacity, worker_count, writer);

        Self {
            sender,
            workers,
            counters,
        }
    }

    pub fn sender(&self) -> ErrorSender {
        self.sender.clone()
    }

    /// Close this pipeline's own producer handle and wait for the workers
    /// to drain. Every other sender must already be dropped.
    pub async fn shutdown(self) -> ErrorSummary {
        drop(self.sender);
        self.workers.wait().await;

        ErrorSummary {
            failures_recorded: self.counters.failures_recorded.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }
}
