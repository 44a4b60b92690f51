//! Reuse pool for aggregated-record containers
//!
//! Every aggregated record and every multi-field rule result is drawn from
//! a [`RecordPool`] as a [`PooledRecord`]. Dropping a `PooledRecord` clears
//! it and hands it back to the pool, so a container is returned on every exit
//! path: after persistence on success, immediately on failure, and during
//! unwinding.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Field names are usually static rule constants; ids and ad-hoc fields are owned
pub type FieldName = Cow<'static, str>;

/// Field name to value mapping for one row
pub type Record = HashMap<FieldName, String>;

/// Point-in-time counters for a [`RecordPool`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordPoolStats {
    /// Containers created because none were idle
    pub allocated: u64,
    /// Acquisitions served from the idle set
    pub reused: u64,
    /// Containers currently waiting for reuse
    pub idle: usize,
    /// Containers currently checked out
    pub in_use: usize,
}

#[derive(Debug)]
pub struct RecordPool {
    idle: Mutex<Vec<Record>>,
    max_idle: usize,
    allocated: AtomicU64,
    reused: AtomicU64,
    in_use: AtomicUsize,
}

impl RecordPool {
    /// Create a pool that keeps at most `max_idle` cleared containers around
    pub fn new(max_idle: usize) -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::with_capacity(max_idle.min(1024))),
            max_idle,
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            in_use: AtomicUsize::new(0),
        })
    }

    /// Take an empty container, reusing an idle one when available
    pub fn acquire(self: &Arc<Self>) -> PooledRecord {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let record = match reused {
            Some(record) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                record
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Record::new()
            }
        };
        self.in_use.fetch_add(1, Ordering::AcqRel);

        PooledRecord {
            record,
            pool: Arc::clone(self),
        }
    }

    /// Return a container early. Equivalent to dropping it.
    pub fn release(&self, record: PooledRecord) {
        drop(record);
    }

    fn put_back(&self, mut record: Record) {
        record.clear();
        self.in_use.fetch_sub(1, Ordering::AcqRel);

        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(record);
        }
    }

    pub fn stats(&self) -> RecordPoolStats {
        RecordPoolStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            idle: self
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            in_use: self.in_use.load(Ordering::Acquire),
        }
    }
}

/// A record checked out of a [`RecordPool`]; returned to it on drop
pub struct PooledRecord {
    record: Record,
    pool: Arc<RecordPool>,
}

impl PooledRecord {
    /// Insert or overwrite a field
    pub fn set<N, V>(&mut self, name: N, value: V)
    where
        N: Into<FieldName>,
        V: Into<String>,
    {
        self.record.insert(name.into(), value.into());
    }

    /// The `id` field, or an empty string when it has not been set
    pub fn id(&self) -> &str {
        self.record.get("id").map(String::as_str).unwrap_or_default()
    }

    /// Move every field of `other` into this record. `other` goes back to
    /// the pool empty.
    pub fn absorb(&mut self, mut other: PooledRecord) {
        self.record.extend(other.record.drain());
    }
}

impl Deref for PooledRecord {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl DerefMut for PooledRecord {
    fn deref_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}

impl Drop for PooledRecord {
    fn drop(&mut self) {
        self.pool.put_back(std::mem::take(&mut self.record));
    }
}

impl fmt::Debug for PooledRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledRecord").field(&self.record).finish()
    }
}
