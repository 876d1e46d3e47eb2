// Warning escalation engine - per (guild, user) warning history.
//
// This service handles:
// - Appending warnings and mapping the new count onto the ladder
// - Reading counts and full histories
// - Clearing a user's history on explicit moderator request
//
// NO Discord dependencies here - the responder applies the escalation.

use super::moderation_models::{escalation_for, WarningOutcome, WarningRecord};
use crate::core::storage::{keys, load_json, save_json, KeyedLocks, StateStore, StoreError};
use crate::core::tracking::Clock;
use std::sync::Arc;

pub struct WarningEngine<S: StateStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<(u64, u64)>,
}

impl<S: StateStore> WarningEngine<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Append a warning and return the new count with the ladder step it reached.
    pub async fn add_warning(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<WarningOutcome, StoreError> {
        let _guard = self.locks.lock(&(guild_id, user_id)).await;
        let key = keys::warnings(guild_id, user_id);

        let mut records: Vec<WarningRecord> = load_json(&*self.store, &key).await?.unwrap_or_default();
        let count = records.len() + 1;
        records.push(WarningRecord {
            timestamp: self.clock.now(),
            count,
            reason: reason.to_string(),
        });
        save_json(&*self.store, &key, &records).await?;

        let escalation = escalation_for(count);
        tracing::info!(guild_id, user_id, count, ?escalation, "Warning added");
        Ok(WarningOutcome { count, escalation })
    }

    pub async fn get_warnings(&self, guild_id: u64, user_id: u64) -> Result<usize, StoreError> {
        Ok(self.warnings(guild_id, user_id).await?.len())
    }

    pub async fn warnings(&self, guild_id: u64, user_id: u64) -> Result<Vec<WarningRecord>, StoreError> {
        Ok(load_json(&*self.store, &keys::warnings(guild_id, user_id))
            .await?
            .unwrap_or_default())
    }

    /// Delete the whole history. Returns whether there was one.
    pub async fn clear_warnings(&self, guild_id: u64, user_id: u64) -> Result<bool, StoreError> {
        let _guard = self.locks.lock(&(guild_id, user_id)).await;
        let existed = self.store.delete(&keys::warnings(guild_id, user_id)).await?;
        if existed {
            tracing::info!(guild_id, user_id, "Warnings cleared");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::Escalation;
    use crate::core::testing::ManualClock;
    use crate::infra::storage::InMemoryStateStore;

    fn engine() -> WarningEngine<InMemoryStateStore> {
        WarningEngine::new(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(ManualClock::default()),
        )
    }

    #[tokio::test]
    async fn test_counts_are_monotonic_until_cleared() {
        let engine = engine();

        for expected in 1..=4 {
            let outcome = engine.add_warning(1, 2, "rude").await.unwrap();
            assert_eq!(outcome.count, expected);
        }
        assert_eq!(engine.get_warnings(1, 2).await.unwrap(), 4);

        assert!(engine.clear_warnings(1, 2).await.unwrap());
        assert_eq!(engine.get_warnings(1, 2).await.unwrap(), 0);
        assert_eq!(engine.add_warning(1, 2, "again").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_record_count_matches_position() {
        let engine = engine();
        for i in 0..3 {
            engine.add_warning(1, 2, &format!("reason {i}")).await.unwrap();
        }

        let records = engine.warnings(1, 2).await.unwrap();
        for (index, record) in records.iter().enumerate() {
            assert_eq!(record.count, index + 1);
            assert_eq!(record.reason, format!("reason {index}"));
        }
    }

    #[tokio::test]
    async fn test_clear_without_history_is_noop() {
        let engine = engine();
        assert!(!engine.clear_warnings(1, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_outcome_follows_ladder() {
        let engine = engine();
        let mut last = None;
        for _ in 0..11 {
            last = Some(engine.add_warning(1, 2, "x").await.unwrap());
        }
        assert_eq!(last.unwrap().escalation, Escalation::ExcessiveBan);
    }

    #[tokio::test]
    async fn test_users_and_guilds_are_isolated() {
        let engine = engine();
        engine.add_warning(1, 2, "x").await.unwrap();
        engine.add_warning(1, 2, "x").await.unwrap();

        assert_eq!(engine.add_warning(1, 3, "x").await.unwrap().count, 1);
        assert_eq!(engine.add_warning(9, 2, "x").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_warnings_get_distinct_counts() {
        let engine = Arc::new(engine());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.add_warning(1, 2, "burst").await.unwrap().count
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=10).collect::<Vec<_>>());
    }
}
