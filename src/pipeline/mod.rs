//! Asynchronous persistence behind bounded queues
//!
//! Both pipelines are a [`worker_pool::WorkerPool`] with a different handler:
//! the write-back pipeline writes every field of an aggregated record, the
//! error pipeline writes one key per failed row. Store failures are logged and
//! counted, never retried.

pub mod errors;
pub mod worker_pool;
pub mod write_back;

pub use errors::{ErrorPipeline, ErrorSender, ErrorSummary};
pub use worker_pool::{bounded, QueueHandler, QueueSender, WorkerPool};
pub use write_back::{WriteBackPipeline, WriteBackSender, WriteBackSummary};
