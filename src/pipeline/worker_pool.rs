//! Bounded queue drained by a fixed set of workers
//!
//! Producers push through a [`QueueSender`]; a full queue suspends the
//! producer, which is how a slow store pushes back on row validation. Each
//! worker takes one item, handles it completely, then takes the next. The
//! queue closes once every `QueueSender` clone has been dropped, and
//! [`WorkerPool::wait`] returns after the workers have drained it.

use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Processes one queued item. Failures are the handler's to log.
#[async_trait]
pub trait QueueHandler<T>: Send + Sync + 'static {
    async fn handle(&self, item: T);
}

/// Producer side of a bounded queue
pub struct QueueSender<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
}

impl<T> QueueSender<T> {
    /// Enqueue `item`, waiting while the queue is full. Hands the item back
    /// when the queue has shut down.
    pub async fn push(&self, item: T) -> Result<(), T> {
        self.tx.send(item).await.map_err(|err| err.0)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Items waiting for a worker
    pub fn queued(&self) -> usize {
        self.max_capacity().saturating_sub(self.available())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for QueueSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSender")
            .field("name", &self.name())
            .field("queued", &self.queued())
            .field("max_capacity", &self.max_capacity())
            .finish()
    }
}

/// A bounded queue without consumers attached
pub fn bounded<T>(name: &'static str, capacity: usize) -> (QueueSender<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueueSender { name, tx }, rx)
}

/// The consumer side: `worker_count` tasks sharing one receiver
pub struct WorkerPool {
    name: &'static str,
    workers: JoinSet<()>,
}

impl WorkerPool {
    pub fn start<T, H>(
        name: &'static str,
        capacity: usize,
        worker_count: usize,
        handler: Arc<H>,
    ) -> (QueueSender<T>, WorkerPool)
    where
        T: Send + 'static,
        H: QueueHandler<T>,
    {
        let (sender, rx) = bounded(name, capacity);
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = JoinSet::new();

        for worker_id in 0..worker_count.max(1) {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            workers.spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(item) = next else {
                        break;
                    };

                    if AssertUnwindSafe(handler.handle(item))
                        .catch_unwind()
                        .await
                        .is_err()
                    {
                        error!(queue = name, worker_id, "Queue handler panicked, item dropped");
                    }
                }
                debug!(queue = name, worker_id, "Worker drained queue and stopped");
            });
        }

        info!(queue = name, capacity, workers = worker_count, "Worker pool started");

        (sender, WorkerPool { name, workers })
    }

    /// Wait for every worker to finish. Returns once all senders are gone
    /// and the queue is empty.
    pub async fn wait(mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(err) = joined {
                error!(queue = self.name, error = %err, "Worker task failed");
            }
        }
        info!(queue = self.name, "Worker pool drained");
    }
}
