// Key-value persistence port.
//
// Every piece of engine state (policies, warnings, tracked windows, security
// logs, DM blocks) is a JSON document stored under a namespaced string key.
// Writes are awaited: when `set` returns, the value is durable.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace the value under `key`.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether a value was present.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

/// Read and deserialize a typed document.
pub async fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    S: StateStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and write a typed document.
pub async fn save_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    S: StateStore + ?Sized,
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value)?;
    store.set(key, value).await
}

// ============================================================================
// KEY LAYOUT
// ============================================================================

pub mod keys {
    pub fn policy(guild_id: u64) -> String {
        format!("policy:{guild_id}")
    }

    pub fn warnings(guild_id: u64, user_id: u64) -> String {
        format!("warnings:{guild_id}:{user_id}")
    }

    pub fn security_log(guild_id: u64) -> String {
        format!("security_log:{guild_id}")
    }

    pub fn dm_block(user_id: u64) -> String {
        format!("dm_block:{user_id}")
    }

    pub fn track(kind: &str, guild_id: u64, subject_id: Option<u64>) -> String {
        match subject_id {
            Some(subject) => format!("track:{kind}:{guild_id}:{subject}"),
            None => format!("track:{kind}:{guild_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::storage::InMemoryStateStore;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_typed_round_trip_through_store() {
        let store = InMemoryStateStore::new();
        let doc = Doc {
            name: "raid".to_string(),
            count: 3,
        };

        save_json(&store, "doc:1", &doc).await.unwrap();
        let loaded: Option<Doc> = load_json(&store, "doc:1").await.unwrap();
        assert_eq!(loaded, Some(doc));

        let missing: Option<Doc> = load_json(&store, "doc:2").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_wrong_shape() {
        let store = InMemoryStateStore::new();
        store
            .set("doc:1", serde_json::json!({ "unexpected": true }))
            .await
            .unwrap();

        let result: Result<Option<Doc>, _> = load_json(&store, "doc:1").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_track_keys_omit_missing_subject() {
        assert_eq!(keys::track("join", 7, None), "track:join:7");
        assert_eq!(keys::track("message", 7, Some(9)), "track:message:7:9");
    }
}
