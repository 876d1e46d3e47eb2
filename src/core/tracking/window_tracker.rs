// Window tracker - append-only, count-capped event histories.
//
// There is no expiry task: staleness is decided at read time through
// `count_since`, and the retention cap bounds how much a quiet key occupies.

use super::clock::Clock;
use super::tracking_models::{Sample, TrackKey, TrackedEvent};
use crate::core::storage::{load_json, save_json, KeyedLocks, StateStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct WindowTracker<S: StateStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<TrackKey>,
}

impl<S: StateStore> WindowTracker<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Append `sample` stamped with the current time, trim to the kind's cap
    /// and persist. Returns the window after trimming, oldest first.
    pub async fn track(&self, key: TrackKey, sample: Sample) -> Result<Vec<TrackedEvent>, StoreError> {
        let _guard = self.locks.lock(&key).await;
        let storage_key = key.storage_key();

        let mut events: Vec<TrackedEvent> = load_json(&*self.store, &storage_key)
            .await?
            .unwrap_or_default();

        events.push(TrackedEvent {
            timestamp: self.clock.now(),
            payload: sample,
        });

        let cap = key.kind.retention();
        if events.len() > cap {
            let overflow = events.len() - cap;
            events.drain(..overflow);
        }

        save_json(&*self.store, &storage_key, &events).await?;
        Ok(events)
    }

    /// Current window without modifying it.
    pub async fn history(&self, key: TrackKey) -> Result<Vec<TrackedEvent>, StoreError> {
        let _guard = self.locks.lock(&key).await;
        Ok(load_json(&*self.store, &key.storage_key())
            .await?
            .unwrap_or_default())
    }

    /// Drop the whole window. Returns whether anything was stored.
    pub async fn clear(&self, key: TrackKey) -> Result<bool, StoreError> {
        let _guard = self.locks.lock(&key).await;
        self.store.delete(&key.storage_key()).await
    }
}

/// Count entries at or after `cutoff` that match `predicate`.
pub fn count_since<F>(events: &[TrackedEvent], cutoff: DateTime<Utc>, predicate: F) -> usize
where
    F: Fn(&TrackedEvent) -> bool,
{
    events
        .iter()
        .filter(|event| event.timestamp >= cutoff && predicate(event))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::ManualClock;
    use crate::core::tracking::{ModerationActionKind, TrackKind};
    use crate::infra::storage::InMemoryStateStore;
    use chrono::Duration;

    fn tracker() -> (WindowTracker<InMemoryStateStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let tracker = WindowTracker::new(Arc::new(InMemoryStateStore::new()), clock.clone());
        (tracker, clock)
    }

    fn message(content: &str) -> Sample {
        Sample::Message {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_track_returns_window_in_order() {
        let (tracker, clock) = tracker();
        let key = TrackKey::messages(1, 2);

        tracker.track(key, message("a")).await.unwrap();
        clock.advance(Duration::seconds(1));
        let events = tracker.track(key, message("b")).await.unwrap();

        let contents: Vec<_> = events.iter().filter_map(|e| e.content()).collect();
        assert_eq!(contents, vec!["a", "b"]);
        assert!(events[0].timestamp < events[1].timestamp);
    }

    #[tokio::test]
    async fn test_cap_keeps_most_recent_entries() {
        let (tracker, clock) = tracker();
        let key = TrackKey::messages(1, 2);
        let cap = TrackKind::Message.retention();

        let mut events = Vec::new();
        for i in 0..(cap + 7) {
            clock.advance(Duration::milliseconds(10));
            events = tracker.track(key, message(&i.to_string())).await.unwrap();
        }

        assert_eq!(events.len(), cap);
        let expected: Vec<String> = (7..cap + 7).map(|i| i.to_string()).collect();
        let contents: Vec<String> = events
            .iter()
            .filter_map(|e| e.content().map(str::to_string))
            .collect();
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn test_every_kind_respects_its_own_cap() {
        let (tracker, _clock) = tracker();
        let cases = [
            (TrackKey::joins(1), TrackKind::Join.retention()),
            (TrackKey::actions(1, 5), TrackKind::ModerationAction.retention()),
            (TrackKey::commands(5), TrackKind::Command.retention()),
        ];

        for (key, cap) in cases {
            let mut len = 0;
            for i in 0..(cap * 2) {
                let sample = match key.kind {
                    TrackKind::Join => Sample::Join { user_id: i as u64 },
                    TrackKind::ModerationAction => Sample::ModerationAction {
                        action: ModerationActionKind::Ban,
                    },
                    _ => Sample::Command {
                        command_name: "-ping".to_string(),
                    },
                };
                len = tracker.track(key, sample).await.unwrap().len();
            }
            assert_eq!(len, cap, "{:?}", key.kind);
        }
    }

    #[tokio::test]
    async fn test_stale_entries_stay_until_evicted_by_cap() {
        let (tracker, clock) = tracker();
        let key = TrackKey::messages(1, 2);

        tracker.track(key, message("old")).await.unwrap();
        clock.advance(Duration::days(30));
        let events = tracker.track(key, message("new")).await.unwrap();

        assert_eq!(events.len(), 2);
        let cutoff = clock.now() - Duration::seconds(5);
        assert_eq!(count_since(&events, cutoff, |_| true), 1);
    }

    #[tokio::test]
    async fn test_clear_removes_window() {
        let (tracker, _clock) = tracker();
        let key = TrackKey::messages(1, 2);

        tracker.track(key, message("a")).await.unwrap();
        assert!(tracker.clear(key).await.unwrap());
        assert!(tracker.history(key).await.unwrap().is_empty());
        assert!(!tracker.clear(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (tracker, _clock) = tracker();

        tracker.track(TrackKey::messages(1, 2), message("a")).await.unwrap();
        let other = tracker
            .track(TrackKey::messages(1, 3), message("b"))
            .await
            .unwrap();

        assert_eq!(other.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_tracks_on_one_key_are_not_lost() {
        let (tracker, _clock) = tracker();
        let tracker = Arc::new(tracker);
        let key = TrackKey::joins(9);

        let mut handles = Vec::new();
        for i in 0..20u64 {
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                tracker.track(key, Sample::Join { user_id: i }).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(tracker.history(key).await.unwrap().len(), 20);
    }

    #[test]
    fn test_count_since_applies_predicate() {
        let now = Utc::now();
        let events = vec![
            TrackedEvent {
                timestamp: now,
                payload: Sample::ModerationAction {
                    action: ModerationActionKind::Ban,
                },
            },
            TrackedEvent {
                timestamp: now,
                payload: Sample::ModerationAction {
                    action: ModerationActionKind::Kick,
                },
            },
        ];

        let bans = count_since(&events, now, |e| e.action() == Some(ModerationActionKind::Ban));
        assert_eq!(bans, 1);
    }
}
