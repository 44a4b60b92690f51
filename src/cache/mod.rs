//! Key/value store client contract
//!
//! The pipelines only ever call [`DistributedCache::set_field`],
//! [`DistributedCache::set`] and [`DistributedCache::delete`]. Field rules
//! reach [`DistributedCache::get`] through `ValidationContext::lookup`. Retry and
//! backoff are not part of the contract; wrap a client to add them.

use async_trait::async_trait;

use crate::errors::CacheResult;

pub mod memory;

pub use memory::InMemoryCache;

#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Read a string value. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Set one field of the hash stored at `key`
    async fn set_field(&self, key: &str, field: &str, value: &str) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Release the client. Later operations fail with `CacheError::Closed`.
    async fn close(&self);
}
