// In-memory implementation of StateStore.
//
// Used by tests and for throwaway runs. Nothing survives a restart.

use crate::core::storage::{StateStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// A concurrent map from storage key to JSON document.
pub struct InMemoryStateStore {
    data: DashMap<String, Value>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.data.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryStateStore::new();
        assert!(store.get("a").await.unwrap().is_none());

        store.set("a", json!({"n": 1})).await.unwrap();
        store.set("a", json!({"n": 2})).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!({"n": 2})));
        assert_eq!(store.len(), 1);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
    }
}
