// SQLite-backed state store.
//
// Tables:
// - state: one JSON document per storage key

use crate::core::storage::{StateStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteStateStore {
    pool: Pool<Sqlite>,
}

impl SqliteStateStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT value FROM state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&value)?;
        sqlx::query(
            r#"
            INSERT INTO state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(raw)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM state WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::WarningEngine;
    use crate::core::policy::{GuildPolicyService, SecurityFeature};
    use crate::core::tracking::SystemClock;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    async fn open(path: &std::path::Path) -> SqliteStateStore {
        SqliteStateStore::connect(&format!("sqlite://{}?mode=rwc", path.display()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_delete() {
        let tmp = NamedTempFile::new().unwrap();
        let store = open(tmp.path()).await;

        store.set("k", json!([1, 2])).await.unwrap();
        store.set("k", json!([3])).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!([3])));

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_owned();

        {
            let store = Arc::new(open(&path).await);
            let policies = GuildPolicyService::new(Arc::clone(&store));
            policies
                .set_enabled(1, SecurityFeature::AntiRaid, false)
                .await
                .unwrap();
            let warnings = WarningEngine::new(store, Arc::new(SystemClock));
            warnings.add_warning(1, 2, "first").await.unwrap();
            warnings.add_warning(1, 2, "second").await.unwrap();
        }

        let store = Arc::new(open(&path).await);
        let policies = GuildPolicyService::new(Arc::clone(&store));
        assert!(!policies.is_enabled(1, SecurityFeature::AntiRaid).await.unwrap());
        let warnings = WarningEngine::new(store, Arc::new(SystemClock));
        assert_eq!(warnings.add_warning(1, 2, "third").await.unwrap().count, 3);
    }
}
