use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;

use super::record_pool::{PooledRecord, RecordPool};
use super::row::Row;
use crate::cache::DistributedCache;
use crate::config::{ColumnLayout, ParserConfig};
use crate::errors::{CacheResult, RuleResult};

/// Read-only state shared by every rule invocation for a row
pub struct ValidationContext {
    config: Arc<ParserConfig>,
    records: Arc<RecordPool>,
    store: Option<Arc<dyn DistributedCache>>,
}

impl ValidationContext {
    pub fn new(config: Arc<ParserConfig>, records: Arc<RecordPool>) -> Self {
        Self {
            config,
            records,
            store: None,
        }
    }

    /// Give rules read access to the store for cross-row lookups
    pub fn with_store(mut self, store: Arc<dyn DistributedCache>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn columns(&self) -> &ColumnLayout {
        &self.config.columns
    }

    /// Fresh container for a multi-field result
    pub fn new_record(&self) -> PooledRecord {
        self.records.acquire()
    }

    /// The store the row will be written to, when one is attached
    pub fn store(&self) -> Option<&Arc<dyn DistributedCache>> {
        self.store.as_ref()
    }

    /// Blocking [`DistributedCache::get`] for use inside a rule. `Ok(None)`
    /// when no store is attached or the key does not exist.
    ///
    /// Blocks the rule's worker thread through `block_in_place`, so it needs
    /// the multi-thread runtime.
    pub fn lookup(&self, key: &str) -> CacheResult<Option<String>> {
        let Some(store) = self.store.as_ref() else {
            return Ok(None);
        };
        tokio::task::block_in_place(|| Handle::current().block_on(store.get(key)))
    }
}

impl fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("config", &self.config)
            .field("records", &self.records)
            .field("store", &self.store.is_some())
            .finish()
    }
}

/// A pluggable check over one row.
///
/// Rules run concurrently against the same [`Row`] and must only read it.
/// Return `Ok(None)` when there is nothing to contribute, `Ok(Some(record))`
/// with the fields the rule vouches for, or the failure.
pub trait FieldRule: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult;
}

/// Adapts a closure into a named [`FieldRule`]
pub struct FnRule<F> {
    name: String,
    check: F,
}

impl<F> FnRule<F> {
    pub fn new<N>(name: N, check: F) -> Self
    where
        N: Into<String>,
        F: Fn(&ValidationContext, &Row) -> RuleResult + Send + Sync,
    {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> FieldRule for FnRule<F>
where
    F: Fn(&ValidationContext, &Row) -> RuleResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        (self.check)(ctx, row)
    }
}

/// Ordered collection of active rules, passed into each row validator
#[derive(Clone, Default)]
pub struct RuleSet {
    rules: Vec<Arc<dyn FieldRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule, builder style
    pub fn with<R: FieldRule + 'static>(mut self, rule: R) -> Self {
        self.push(rule);
        self
    }

    pub fn push<R: FieldRule + 'static>(&mut self, rule: R) {
        self.rules.push(Arc::new(rule));
    }

    /// Append a rule that is already shared
    pub fn push_shared(&mut self, rule: Arc<dyn FieldRule>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn FieldRule>> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn FieldRule>> {
        self.rules.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
