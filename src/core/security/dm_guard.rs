// DM guard - blocks users who flood the bot with direct messages.
//
// Direct messages share the message window kind under the sentinel guild id.
// A block is permanent until an operator removes it.

use super::security_models::{SecurityThresholds, Severity, Verdict, Violation};
use crate::core::storage::{keys, load_json, save_json, StateStore, StoreError};
use crate::core::tracking::{count_since, Sample, TrackKey, WindowTracker};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmBlockRecord {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DmCheck {
    /// Process the message normally.
    Allowed,
    /// The user was already blocked; drop the message silently.
    Blocked,
    /// This message crossed the threshold and the user is now blocked.
    NewlyBlocked(Verdict),
}

pub struct DmGuard<S: StateStore> {
    store: Arc<S>,
    tracker: Arc<WindowTracker<S>>,
    thresholds: Arc<SecurityThresholds>,
}

impl<S: StateStore> DmGuard<S> {
    pub fn new(store: Arc<S>, tracker: Arc<WindowTracker<S>>, thresholds: Arc<SecurityThresholds>) -> Self {
        Self {
            store,
            tracker,
            thresholds,
        }
    }

    pub async fn block_record(&self, user_id: u64) -> Result<Option<DmBlockRecord>, StoreError> {
        load_json(&*self.store, &keys::dm_block(user_id)).await
    }

    pub async fn is_blocked(&self, user_id: u64) -> Result<bool, StoreError> {
        Ok(self.block_record(user_id).await?.is_some())
    }

    pub async fn check(&self, user_id: u64, content: &str) -> Result<DmCheck, StoreError> {
        if self.is_blocked(user_id).await? {
            return Ok(DmCheck::Blocked);
        }

        let events = self
            .tracker
            .track(
                TrackKey::direct_messages(user_id),
                Sample::Message {
                    content: content.to_string(),
                },
            )
            .await?;

        let cutoff = self.tracker.now() - Duration::seconds(self.thresholds.dm_spam_window_secs);
        let messages = count_since(&events, cutoff, |_| true);
        if messages < self.thresholds.dm_spam_threshold {
            return Ok(DmCheck::Allowed);
        }

        let record = DmBlockRecord {
            timestamp: self.tracker.now(),
            reason: "DM Spam".to_string(),
        };
        save_json(&*self.store, &keys::dm_block(user_id), &record).await?;
        tracing::warn!(user_id, messages, "User blocked for direct message spam");

        Ok(DmCheck::NewlyBlocked(Verdict::new(
            Violation::DmSpam { messages },
            format!("Sent {messages} direct messages in {}s", self.thresholds.dm_spam_window_secs),
            Severity::Medium,
        )))
    }

    /// Lift a block and forget the user's DM history. Returns whether a block existed.
    pub async fn unblock(&self, user_id: u64) -> Result<bool, StoreError> {
        let existed = self.store.delete(&keys::dm_block(user_id)).await?;
        self.tracker.clear(TrackKey::direct_messages(user_id)).await?;
        if existed {
            tracing::info!(user_id, "Direct message block lifted");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::Fixture;

    #[tokio::test]
    async fn test_flood_blocks_then_drops_silently() {
        let fixture = Fixture::new();

        for i in 0..4 {
            fixture.clock.advance(Duration::seconds(1));
            assert_eq!(fixture.dm_guard.check(7, &i.to_string()).await.unwrap(), DmCheck::Allowed);
        }

        fixture.clock.advance(Duration::seconds(1));
        let result = fixture.dm_guard.check(7, "again").await.unwrap();
        assert!(matches!(
            result,
            DmCheck::NewlyBlocked(Verdict {
                violation: Violation::DmSpam { messages: 5 },
                ..
            })
        ));

        fixture.clock.advance(Duration::days(1));
        assert_eq!(fixture.dm_guard.check(7, "hello?").await.unwrap(), DmCheck::Blocked);
        assert!(fixture.dm_guard.is_blocked(7).await.unwrap());
        assert!(!fixture.dm_guard.is_blocked(8).await.unwrap());
    }

    #[tokio::test]
    async fn test_unblock_resets_history() {
        let fixture = Fixture::new();
        for i in 0..5 {
            fixture.dm_guard.check(7, &i.to_string()).await.unwrap();
        }
        assert!(fixture.dm_guard.is_blocked(7).await.unwrap());

        assert!(fixture.dm_guard.unblock(7).await.unwrap());
        assert!(!fixture.dm_guard.unblock(7).await.unwrap());
        assert_eq!(fixture.dm_guard.check(7, "hi").await.unwrap(), DmCheck::Allowed);
    }

    #[tokio::test]
    async fn test_dm_window_is_separate_from_guild_windows() {
        let fixture = Fixture::new();
        for i in 0..4 {
            fixture.dm_guard.check(7, &i.to_string()).await.unwrap();
        }
        let guild_history = fixture.tracker.history(TrackKey::messages(1, 7)).await.unwrap();
        assert!(guild_history.is_empty());
    }
}
