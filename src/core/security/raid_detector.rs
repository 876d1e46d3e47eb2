// Raid detector - a burst of joins only counts as a raid when the joining
// account is also new. Old accounts joining together never trigger it.

use super::security_log::SecurityLog;
use super::security_models::{InboundJoin, SecurityLogKind, SecurityThresholds, Severity, Verdict, Violation};
use crate::core::policy::{GuildPolicyService, SecurityFeature};
use crate::core::storage::{StateStore, StoreError};
use crate::core::tracking::{count_since, Sample, TrackKey, WindowTracker};
use chrono::Duration;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct RaidDetector<S: StateStore> {
    policies: Arc<GuildPolicyService<S>>,
    tracker: Arc<WindowTracker<S>>,
    log: Arc<SecurityLog<S>>,
    thresholds: Arc<SecurityThresholds>,
}

impl<S: StateStore> RaidDetector<S> {
    pub fn new(
        policies: Arc<GuildPolicyService<S>>,
        tracker: Arc<WindowTracker<S>>,
        log: Arc<SecurityLog<S>>,
        thresholds: Arc<SecurityThresholds>,
    ) -> Self {
        Self {
            policies,
            tracker,
            log,
            thresholds,
        }
    }

    pub async fn check(&self, join: &InboundJoin) -> Result<Option<Verdict>, StoreError> {
        if !self
            .policies
            .is_enabled(join.guild_id, SecurityFeature::AntiRaid)
            .await?
        {
            return Ok(None);
        }

        let events = self
            .tracker
            .track(
                TrackKey::joins(join.guild_id),
                Sample::Join {
                    user_id: join.user_id,
                },
            )
            .await?;

        let now = self.tracker.now();
        let window = self.thresholds.raid_window_secs;
        let joins = count_since(&events, now - Duration::seconds(window), |_| true);
        if joins < self.thresholds.raid_join_threshold {
            return Ok(None);
        }

        let account_age_days = (now - join.account_created_at).num_days();
        if account_age_days >= self.thresholds.raid_min_account_age_days {
            tracing::debug!(
                guild_id = join.guild_id,
                user_id = join.user_id,
                joins,
                account_age_days,
                "Join burst from an established account"
            );
            return Ok(None);
        }

        let details = BTreeMap::from([
            ("joins_in_window".to_string(), json!(joins)),
            ("member_id".to_string(), json!(join.user_id.to_string())),
            ("account_age_days".to_string(), json!(account_age_days)),
        ]);
        self.log
            .append(join.guild_id, SecurityLogKind::RaidDetected, details)
            .await?;

        tracing::warn!(
            guild_id = join.guild_id,
            user_id = join.user_id,
            joins,
            account_age_days,
            "Raid detected"
        );

        Ok(Some(Verdict::new(
            Violation::Raid {
                joins,
                window_secs: window,
                account_age_days,
            },
            format!("{joins} joins in {window}s, account age {account_age_days} days"),
            Severity::High,
        )))
    }
}
