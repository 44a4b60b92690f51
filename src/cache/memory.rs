use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::DistributedCache;
use crate::errors::{CacheError, CacheResult};

/// A value held by [`InMemoryCache`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CacheValue {
    Value(String),
    Hash(HashMap<String, String>),
}

/// Process-local store with string and hash values.
///
/// `set_field` only writes a field that is not already present, the same
/// set-if-absent behavior as the production store's hash command.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, CacheValue>>,
    closed: AtomicBool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        Ok(())
    }

    /// Fields of the hash at `key`
    pub async fn hash(&self, key: &str) -> Option<HashMap<String, String>> {
        match self.entries.read().await.get(key) {
            Some(CacheValue::Hash(fields)) => Some(fields.clone()),
            _ => None,
        }
    }

    /// String value at `key`
    pub async fn value(&self, key: &str) -> Option<String> {
        match self.entries.read().await.get(key) {
            Some(CacheValue::Value(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Sorted keys starting with `prefix`
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Ordered copy of every entry, suitable for serializing
    pub async fn snapshot(&self) -> BTreeMap<String, CacheValue> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[async_trait]
impl DistributedCache for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_open()?;
        match self.entries.read().await.get(key) {
            None => Ok(None),
            Some(CacheValue::Value(value)) => Ok(Some(value.clone())),
            Some(CacheValue::Hash(_)) => Err(CacheError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.ensure_open()?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheValue::Value(value.to_string()));
        Ok(())
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| CacheValue::Hash(HashMap::new()));

        match entry {
            CacheValue::Hash(fields) => {
                fields
                    .entry(field.to_string())
                    .or_insert_with(|| value.to_string());
                Ok(())
            }
            CacheValue::Value(_) => Err(CacheError::WrongType {
                key: key.to_string(),
                expected: "hash",
            }),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.ensure_open()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("In-memory cache closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();
        assert_ok!(cache.set("k", "v").await);
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_field_keeps_first_value() {
        let cache = InMemoryCache::new();
        assert_ok!(cache.set_field("L1", "id", "L1").await);
        assert_ok!(cache.set_field("L1", "id", "other").await);
        assert_ok!(cache.set_field("L1", "term", "36").await);

        let fields = cache.hash("L1").await.unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["id"], "L1");
        assert_eq!(fields["term"], "36");
    }

    #[tokio::test]
    async fn test_wrong_type_is_rejected() {
        let cache = InMemoryCache::new();
        cache.set("plain", "v").await.unwrap();
        cache.set_field("hashed", "f", "v").await.unwrap();

        assert!(matches!(
            cache.set_field("plain", "f", "v").await,
            Err(CacheError::WrongType { expected: "hash", .. })
        ));
        assert!(matches!(
            cache.get("hashed").await,
            Err(CacheError::WrongType { expected: "string", .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_then_rewrite_replaces_fields() {
        let cache = InMemoryCache::new();
        cache.set_field("L1", "term", "36").await.unwrap();
        assert_ok!(cache.delete("L1").await);
        assert!(!cache.contains_key("L1").await);

        cache.set_field("L1", "term", "60").await.unwrap();
        assert_eq!(cache.hash("L1").await.unwrap()["term"], "60");
    }

    #[tokio::test]
    async fn test_closed_cache_rejects_operations() {
        let cache = InMemoryCache::new();
        cache.close().await;
        assert_err!(cache.set("k", "v").await);
        assert_eq!(cache.get("k").await, Err(CacheError::Closed));
        assert_eq!(cache.delete("k").await, Err(CacheError::Closed));
    }

    #[tokio::test]
    async fn test_keys_with_prefix_and_snapshot() {
        let cache = InMemoryCache::new();
        cache.set("err:row2:idB", "bad").await.unwrap();
        cache.set("err:row1:idA", "bad").await.unwrap();
        cache.set_field("A", "id", "A").await.unwrap();

        assert_eq!(
            cache.keys_with_prefix("err:").await,
            vec!["err:row1:idA".to_string(), "err:row2:idB".to_string()]
        );

        let json = serde_json::to_value(cache.snapshot().await).unwrap();
        assert_eq!(json["A"]["id"], "A");
        assert_eq!(json["err:row1:idA"], "bad");
    }
}
