// Security log - per-guild audit trail, capped at `SECURITY_LOG_CAP` entries.

use super::security_models::{SecurityLogEntry, SecurityLogKind};
use crate::core::storage::{keys, load_json, save_json, KeyedLocks, StateStore, StoreError};
use crate::core::tracking::Clock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SECURITY_LOG_CAP: usize = 100;

pub struct SecurityLog<S: StateStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<u64>,
}

impl<S: StateStore> SecurityLog<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn append(
        &self,
        guild_id: u64,
        kind: SecurityLogKind,
        details: BTreeMap<String, Value>,
    ) -> Result<SecurityLogEntry, StoreError> {
        let entry = SecurityLogEntry {
            guild_id,
            kind,
            timestamp: self.clock.now(),
            details,
        };

        let _guard = self.locks.lock(&guild_id).await;
        let key = keys::security_log(guild_id);
        let mut entries: Vec<SecurityLogEntry> =
            load_json(&*self.store, &key).await?.unwrap_or_default();
        entries.push(entry.clone());
        if entries.len() > SECURITY_LOG_CAP {
            let overflow = entries.len() - SECURITY_LOG_CAP;
            entries.drain(..overflow);
        }
        save_json(&*self.store, &key, &entries).await?;

        tracing::info!(guild_id, kind = kind.as_str(), "Security log entry recorded");
        Ok(entry)
    }

    /// The newest `limit` entries, newest first.
    pub async fn recent(&self, guild_id: u64, limit: usize) -> Result<Vec<SecurityLogEntry>, StoreError> {
        let entries: Vec<SecurityLogEntry> = load_json(&*self.store, &keys::security_log(guild_id))
            .await?
            .unwrap_or_default();
        Ok(entries.into_iter().rev().take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::ManualClock;
    use crate::infra::storage::InMemoryStateStore;
    use serde_json::json;

    fn log() -> SecurityLog<InMemoryStateStore> {
        SecurityLog::new(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(ManualClock::default()),
        )
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let log = log();
        for i in 0..3 {
            let details = BTreeMap::from([("n".to_string(), json!(i))]);
            log.append(1, SecurityLogKind::SpamDetected, details).await.unwrap();
        }

        let recent = log.recent(1, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].details["n"], json!(2));
        assert_eq!(recent[1].details["n"], json!(1));
    }

    #[tokio::test]
    async fn test_log_is_capped() {
        let log = log();
        for i in 0..(SECURITY_LOG_CAP + 5) {
            let details = BTreeMap::from([("n".to_string(), json!(i))]);
            log.append(1, SecurityLogKind::AutoModTrigger, details).await.unwrap();
        }

        let all = log.recent(1, usize::MAX).await.unwrap();
        assert_eq!(all.len(), SECURITY_LOG_CAP);
        assert_eq!(all.last().unwrap().details["n"], json!(5));
        assert!(log.recent(2, 10).await.unwrap().is_empty());
    }
}
