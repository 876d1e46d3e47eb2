// Nuke detector - per-actor windows of privileged actions.
//
// Exempt actors are rejected before anything is tracked, so their actions
// never enter a window. That covers the guild owner, whitelisted users and
// the fixed set handed in at startup (bot owners and the bot's own account).

use super::security_models::{InboundModAction, SecurityThresholds, Severity, Verdict, Violation};
use crate::core::policy::{GuildPolicyService, SecurityFeature};
use crate::core::storage::{StateStore, StoreError};
use crate::core::tracking::{count_since, Sample, TrackKey, WindowTracker};
use chrono::Duration;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct NukeDetector<S: StateStore> {
    policies: Arc<GuildPolicyService<S>>,
    tracker: Arc<WindowTracker<S>>,
    thresholds: Arc<SecurityThresholds>,
    exempt_actors: Arc<BTreeSet<u64>>,
}

impl<S: StateStore> NukeDetector<S> {
    pub fn new(
        policies: Arc<GuildPolicyService<S>>,
        tracker: Arc<WindowTracker<S>>,
        thresholds: Arc<SecurityThresholds>,
        exempt_actors: Arc<BTreeSet<u64>>,
    ) -> Self {
        Self {
            policies,
            tracker,
            thresholds,
            exempt_actors,
        }
    }

    pub async fn check(&self, event: &InboundModAction) -> Result<Option<Verdict>, StoreError> {
        let policy = self.policies.policy(event.guild_id).await?;
        if !policy.is_enabled(SecurityFeature::AntiNuke) {
            return Ok(None);
        }
        if event.actor_id == event.guild_owner_id
            || self.exempt_actors.contains(&event.actor_id)
            || policy.is_user_whitelisted(event.actor_id)
        {
            return Ok(None);
        }

        let key = TrackKey::actions(event.guild_id, event.actor_id);
        let events = self
            .tracker
            .track(
                key,
                Sample::ModerationAction {
                    action: event.action,
                },
            )
            .await?;

        let window = self.thresholds.nuke_window_secs;
        let cutoff = self.tracker.now() - Duration::seconds(window);
        let count = count_since(&events, cutoff, |e| e.action() == Some(event.action));
        if count < self.thresholds.nuke_threshold(event.action) {
            return Ok(None);
        }

        tracing::warn!(
            guild_id = event.guild_id,
            actor_id = event.actor_id,
            action = %event.action,
            count,
            "Nuke attempt detected"
        );

        if self.thresholds.nuke_reset_on_trigger {
            self.tracker.clear(key).await?;
        }

        Ok(Some(Verdict::new(
            Violation::Nuke {
                action: event.action,
                count,
                window_secs: window,
            },
            format!("Attempted mass {} ({count} in {window}s)", event.action),
            Severity::High,
        )))
    }
}
