// Command guard - catches users hammering prefix or slash commands.

use super::security_models::{SecurityThresholds, Severity, Verdict, Violation};
use crate::core::storage::{StateStore, StoreError};
use crate::core::tracking::{count_since, Sample, TrackKey, WindowTracker};
use chrono::Duration;
use std::sync::Arc;

pub struct CommandGuard<S: StateStore> {
    tracker: Arc<WindowTracker<S>>,
    thresholds: Arc<SecurityThresholds>,
}

impl<S: StateStore> CommandGuard<S> {
    pub fn new(tracker: Arc<WindowTracker<S>>, thresholds: Arc<SecurityThresholds>) -> Self {
        Self {
            tracker,
            thresholds,
        }
    }

    /// Track one invocation. Usage is counted per user across every guild.
    pub async fn check(&self, user_id: u64, command_name: &str) -> Result<Option<Verdict>, StoreError> {
        let events = self
            .tracker
            .track(
                TrackKey::commands(user_id),
                Sample::Command {
                    command_name: command_name.to_string(),
                },
            )
            .await?;

        let window = self.thresholds.command_spam_window_secs;
        let cutoff = self.tracker.now() - Duration::seconds(window);
        let commands = count_since(&events, cutoff, |_| true);
        if commands < self.thresholds.command_spam_threshold {
            return Ok(None);
        }

        Ok(Some(Verdict::new(
            Violation::CommandSpam { commands },
            format!("Used {commands} commands in {window}s"),
            Severity::Medium,
        )))
    }

    pub async fn clear(&self, user_id: u64) -> Result<bool, StoreError> {
        self.tracker.clear(TrackKey::commands(user_id)).await
    }
}
