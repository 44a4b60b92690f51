use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

use super::worker_pool::{QueueHandler, QueueSender, WorkerPool};
use crate::cache::DistributedCache;
use crate::validator::PooledRecord;

pub type WriteBackSender = QueueSender<PooledRecord>;

/// Totals reported once the write-back workers have drained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteBackSummary {
    pub records_written: u64,
    pub fields_written: u64,
    pub write_failures: u64,
}

#[derive(Debug, Default)]
struct WriteBackCounters {
    records_written: AtomicU64,
    fields_written: AtomicU64,
    write_failures: AtomicU64,
}

struct RecordWriter {
    cache: Arc<dyn DistributedCache>,
    replace_existing: bool,
    counters: Arc<WriteBackCounters>,
}

#[async_trait]
impl QueueHandler<PooledRecord> for RecordWriter {
    async fn handle(&self, record: PooledRecord) {
        let id = record.id();

        if self.replace_existing {
            if let Err(err) = self.cache.delete(id).await {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!(id, error = %err, "Failed to clear existing record");
            }
        }

        for (field, value) in record.iter() {
            match self.cache.set_field(id, field, value).await {
                Ok(()) => {
                    self.counters.fields_written.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(id, field = %field, error = %err, "Error writing to cache");
                }
            }
        }

        self.counters.records_written.fetch_add(1, Ordering::Relaxed);
        trace!(id, fields = record.len(), "Record persisted");
        // dropping `record` returns the container to the record pool
    }
}

/// Persists aggregated records through a fixed set of workers
pub struct WriteBackPipeline {
    sender: WriteBackSender,
    workers: WorkerPool,
    counters: Arc<WriteBackCounters>,
}

impl WriteBackPipeline {
    pub fn start(
        cache: Arc<dyn DistributedCache>,
        capacity: usize,
        worker_count: usize,
        replace_existing: bool,
    ) -> Self {
        let counters = Arc::new(WriteBackCounters::default());
        let writer = Arc::new(RecordWriter {
            cache,
            replace_existing,
            counters: Arc::clone(&counters),
        });
        let (sender, workers) = WorkerPool::start("write_back", capacity, worker_count, writer);

        Self {
            sender,
            workers,
            counters,
        }
    }

    /// A producer handle for row validators
    pub fn sender(&self) -> WriteBackSender {
        self.sender.clone()
    }

    /// Close this pipeline's own producer handle and wait for the workers
    /// to drain. Every other sender must already be dropped.
    pub async fn shutdown(self) -> WriteBackSummary {
        drop(self.sender);
        self.workers.wait().await;

        WriteBackSummary {
            records_written: self.counters.records_written.load(Ordering::Relaxed),
            fields_written: self.counters.fields_written.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::errors::{CacheError, CacheResult};
    use crate::validator::RecordPool;

    #[tokio::test]
    async fn test_records_are_persisted_and_recycled() {
        let cache = Arc::new(InMemoryCache::new());
        let records = RecordPool::new(16);
        let pipeline = WriteBackPipeline::start(cache.clone(), 4, 2, false);
        let sender = pipeline.sender();

        for id in ["L1", "L2", "L3"] {
            let mut record = records.acquire();
            record.set("id", id);
            record.set("raw", format!("{id},1000"));
            record.set("loanAmount", "1000");
            sender.push(record).await.unwrap();
        }
        drop(sender);

        let summary = pipeline.shutdown().await;
        assert_eq!(summary.records_written, 3);
        assert_eq!(summary.fields_written, 9);
        assert_eq!(summary.write_failures, 0);

        let stored = cache.hash("L2").await.unwrap();
        assert_eq!(stored["raw"], "L2,1000");
        assert_eq!(records.stats().in_use, 0);
    }

    #[tokio::test]
    async fn test_replace_existing_deletes_before_writing() {
        let cache = Arc::new(InMemoryCache::new());
        cache.set_field("L1", "loanAmount", "1").await.unwrap();
        cache.set_field("L1", "stale", "x").await.unwrap();

        let records = RecordPool::new(4);
        let pipeline = WriteBackPipeline::start(cache.clone(), 4, 1, true);
        let mut record = records.acquire();
        record.set("id", "L1");
        record.set("loanAmount", "1000");
        pipeline.sender().push(record).await.unwrap();
        pipeline.shutdown().await;

        let stored = cache.hash("L1").await.unwrap();
        assert_eq!(stored["loanAmount"], "1000");
        assert!(!stored.contains_key("stale"));
    }

    struct FailingCache;

    #[async_trait]
    impl DistributedCache for FailingCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Ok(None)
        }
        async fn set(&self, key: &str, _value: &str) -> CacheResult<()> {
            Err(CacheError::operation("set", key, "connection refused"))
        }
        async fn set_field(&self, key: &str, _field: &str, _value: &str) -> CacheResult<()> {
            Err(CacheError::operation("hsetnx", key, "connection refused"))
        }
        async fn delete(&self, _key: &str) -> CacheResult<()> {
            Ok(())
        }
        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed_and_container_returned() {
        let records = RecordPool::new(4);
        let pipeline = WriteBackPipeline::start(Arc::new(FailingCache), 4, 1, false);

        let mut record = records.acquire();
        record.set("id", "L1");
        record.set("raw", "L1");
        pipeline.sender().push(record).await.unwrap();

        let summary = pipeline.shutdown().await;
        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.fields_written, 0);
        assert_eq!(summary.write_failures, 2);
        assert_eq!(records.stats().in_use, 0);
    }
}
