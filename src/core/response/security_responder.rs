// Security responder - the response sequence for each kind of verdict.
//
// Each sequence runs every step even when an earlier one fails, and always
// attempts its security log write so operators see both the detection and
// the (possibly failed) response.

use super::response_executor::{ActionDirective, ActionOutcome, ResponseExecutor};
use crate::core::localization::{Locale, Localizer};
use crate::core::moderation::{
    format_duration, ladder_message_key, Escalation, WarningEngine, WarningOutcome, LADDER_TOP,
};
use crate::core::policy::GuildPolicyService;
use crate::core::security::{
    InboundJoin, InboundMessage, InboundModAction, SecurityLog, SecurityLogKind, SecurityThresholds, Severity,
    Verdict, Violation,
};
use crate::core::storage::{StateStore, StoreError};
use crate::core::tracking::{TrackKey, WindowTracker};
use chrono::Duration;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How long the automod warning reply stays visible.
pub const TRANSIENT_NOTICE_SECS: u64 = 5;

/// Outcome of one response sequence, step by step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseReport {
    pub steps: Vec<(&'static str, ActionOutcome)>,
    pub logged: bool,
}

impl ResponseReport {
    fn record(&mut self, step: &'static str, outcome: ActionOutcome) -> ActionOutcome {
        self.steps.push((step, outcome.clone()));
        outcome
    }

    pub fn outcome(&self, step: &str) -> Option<&ActionOutcome> {
        self.steps.iter().find(|(name, _)| *name == step).map(|(_, o)| o)
    }
}

/// Who is being warned and where the warning is announced.
#[derive(Debug, Clone)]
pub struct WarningTarget {
    pub guild_id: u64,
    pub guild_name: String,
    pub user_id: u64,
    pub channel_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EscalationReport {
    pub warning: WarningOutcome,
    /// Result of the punitive step, if the ladder called for one.
    pub action: Option<ActionOutcome>,
}

/// A moderator's hand-issued action, as posted to the log channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAction {
    Warn { count: usize },
    ClearWarnings,
    Timeout { minutes: u32 },
    RemoveTimeout,
    Kick,
    Ban,
    Unban,
}

/// Who acts on whom, and why.
#[derive(Debug, Clone)]
pub struct ModeratorRequest {
    pub guild_id: u64,
    pub guild_name: String,
    pub moderator_id: u64,
    pub moderator_name: String,
    pub user_id: u64,
    pub reason: String,
}

pub struct SecurityResponder<S: StateStore> {
    executor: Arc<ResponseExecutor>,
    policies: Arc<GuildPolicyService<S>>,
    warnings: Arc<WarningEngine<S>>,
    log: Arc<SecurityLog<S>>,
    tracker: Arc<WindowTracker<S>>,
    localizer: Arc<dyn Localizer>,
    thresholds: Arc<SecurityThresholds>,
}

impl<S: StateStore> SecurityResponder<S> {
    pub fn new(
        executor: Arc<ResponseExecutor>,
        policies: Arc<GuildPolicyService<S>>,
        warnings: Arc<WarningEngine<S>>,
        log: Arc<SecurityLog<S>>,
        tracker: Arc<WindowTracker<S>>,
        localizer: Arc<dyn Localizer>,
        thresholds: Arc<SecurityThresholds>,
    ) -> Self {
        Self {
            executor,
            policies,
            warnings,
            log,
            tracker,
            localizer,
            thresholds,
        }
    }

    pub fn executor(&self) -> &Arc<ResponseExecutor> {
        &self.executor
    }

    fn text(&self, locale: Locale, key: &str, substitutions: &[(&str, String)]) -> String {
        self.localizer.resolve(locale, key, substitutions)
    }

    /// Locale and configured log channel, falling back to defaults if the
    /// policy cannot be read.
    async fn guild_settings(&self, guild_id: u64) -> (Locale, Option<u64>) {
        match self.policies.policy(guild_id).await {
            Ok(policy) => (policy.locale, policy.log_channel_id),
            Err(error) => {
                tracing::warn!(guild_id, %error, "Using default guild settings");
                (Locale::default(), None)
            }
        }
    }

    /// The standard violation notice sent to a member.
    fn notice(&self, locale: Locale, server: &str, action: String, reason: &str, extra: String) -> String {
        format!(
            "**{}**\n{}\n**{}:** {}\n**{}:** {}\n_{}_",
            self.text(locale, "dm_title", &[]),
            self.text(
                locale,
                "dm_description",
                &[("action", action), ("server", server.to_string())]
            ),
            self.text(locale, "dm_reason", &[]),
            reason,
            self.text(locale, "dm_info", &[]),
            extra,
            self.text(locale, "dm_footer", &[]),
        )
    }

    async fn write_log(&self, guild_id: u64, kind: SecurityLogKind, details: BTreeMap<String, Value>) -> bool {
        match self.log.append(guild_id, kind, details).await {
            Ok(_) => true,
            Err(error) => {
                tracing::error!(guild_id, kind = kind.as_str(), %error, "Security log write failed");
                false
            }
        }
    }

    fn mute_days(&self) -> Duration {
        Duration::days(self.thresholds.auto_mute_days)
    }

    // ========================================================================
    // DETECTOR RESPONSES
    // ========================================================================

    /// Delete, mute, notify, alert, log, then forget the author's window.
    pub async fn respond_spam(&self, message: &InboundMessage, verdict: &Verdict) -> ResponseReport {
        let mut report = ResponseReport::default();
        let (locale, log_channel) = self.guild_settings(message.guild_id).await;
        let days = self.thresholds.auto_mute_days;

        let outcome = self
            .executor
            .execute(&ActionDirective::DeleteMessage {
                channel_id: message.channel_id,
                message_id: message.message_id,
            })
            .await;
        report.record("delete_message", outcome);

        let outcome = self
            .executor
            .execute(&ActionDirective::Timeout {
                guild_id: message.guild_id,
                user_id: message.author_id,
                duration: Some(self.mute_days()),
                reason: format!("[AUTO-MOD] Spam detected: {}", verdict.reason),
            })
            .await;
        report.record("timeout", outcome);

        let content = self.notice(
            locale,
            &message.guild_name,
            self.text(locale, "action_muted_days", &[("days", days.to_string())]),
            &format!("[AUTO-MOD] Spam: {}", verdict.reason),
            self.text(locale, "extra_spam_detected", &[]),
        );
        let outcome = self
            .executor
            .execute(&ActionDirective::DirectMessage {
                user_id: message.author_id,
                content,
            })
            .await;
        report.record("direct_message", outcome);

        let alert = self.text(
            locale,
            "alert_spam",
            &[
                ("user", format!("<@{}>", message.author_id)),
                ("user_id", message.author_id.to_string()),
                ("kind", verdict.violation.label().to_string()),
                ("reason", verdict.reason.clone()),
                ("days", days.to_string()),
            ],
        );
        self.executor.broadcast(message.guild_id, log_channel, &alert).await;

        let details = BTreeMap::from([
            ("user_id".to_string(), json!(message.author_id.to_string())),
            ("type".to_string(), json!(verdict.violation.label())),
            ("reason".to_string(), json!(verdict.reason)),
            ("severity".to_string(), json!(verdict.severity.as_str())),
            ("action".to_string(), json!(format!("muted_{days}days"))),
        ]);
        report.logged = self
            .write_log(message.guild_id, SecurityLogKind::SpamDetected, details)
            .await;

        let key = TrackKey::messages(message.guild_id, message.author_id);
        if let Err(error) = self.tracker.clear(key).await {
            tracing::error!(guild_id = message.guild_id, user_id = message.author_id, %error, "Could not clear spam window");
        }

        report
    }

    /// Mute the flagged member, notify them and alert the guild.
    /// The raid detector has already written the log entry.
    pub async fn respond_raid(&self, join: &InboundJoin, verdict: &Verdict) -> ResponseReport {
        let mut report = ResponseReport::default();
        let (locale, log_channel) = self.guild_settings(join.guild_id).await;
        let days = self.thresholds.auto_mute_days;

        let outcome = self
            .executor
            .execute(&ActionDirective::Timeout {
                guild_id: join.guild_id,
                user_id: join.user_id,
                duration: Some(self.mute_days()),
                reason: format!("[AUTO] Raid Protection: {}", verdict.reason),
            })
            .await;
        report.record("timeout", outcome);

        let content = self.notice(
            locale,
            &join.guild_name,
            self.text(locale, "action_muted_days", &[("days", days.to_string())]),
            &format!("[AUTO-RAID] {}", verdict.reason),
            self.text(locale, "extra_raid_detected", &[]),
        );
        let outcome = self
            .executor
            .execute(&ActionDirective::DirectMessage {
                user_id: join.user_id,
                content,
            })
            .await;
        report.record("direct_message", outcome);

        let (joins, window, age) = match &verdict.violation {
            Violation::Raid {
                joins,
                window_secs,
                account_age_days,
            } => (*joins, *window_secs, *account_age_days),
            _ => (0, self.thresholds.raid_window_secs, 0),
        };
        let alert = self.text(
            locale,
            "alert_raid",
            &[
                ("user", format!("<@{}>", join.user_id)),
                ("user_id", join.user_id.to_string()),
                ("count", joins.to_string()),
                ("window", window.to_string()),
                ("age", age.to_string()),
                ("days", days.to_string()),
            ],
        );
        self.executor.broadcast(join.guild_id, log_channel, &alert).await;
        report.logged = true;

        report
    }

    /// Strip privileged roles, apply the maximum timeout, tell the owner, log.
    pub async fn respond_nuke(&self, event: &InboundModAction, verdict: &Verdict) -> ResponseReport {
        let mut report = ResponseReport::default();
        let (locale, log_channel) = self.guild_settings(event.guild_id).await;
        let reason = "[AUTO] Nuke attempt detected".to_string();

        for role_id in self.executor.privileged_roles(event.guild_id, event.actor_id).await {
            let outcome = self
                .executor
                .execute(&ActionDirective::RemoveRole {
                    guild_id: event.guild_id,
                    user_id: event.actor_id,
                    role_id,
                    reason: reason.clone(),
                })
                .await;
            report.record("remove_role", outcome);
        }

        let outcome = self
            .executor
            .execute(&ActionDirective::Timeout {
                guild_id: event.guild_id,
                user_id: event.actor_id,
                duration: Some(Duration::days(self.thresholds.nuke_timeout_days)),
                reason,
            })
            .await;
        report.record("timeout", outcome);

        let actor = format!("<@{}>", event.actor_id);
        let response = self.text(locale, "nuke_response_action", &[]);
        let owner_alert = format!(
            "**{}**\n{}\n{}: `{}`\n{}: {} ({})\n{}",
            self.text(locale, "nuke_alert", &[]),
            self.text(locale, "nuke_description", &[("user", actor.clone())]),
            self.text(locale, "nuke_label_action", &[]),
            event.action,
            self.text(locale, "nuke_label_moderator", &[]),
            actor,
            event.actor_id,
            response,
        );
        let outcome = self
            .executor
            .execute(&ActionDirective::DirectMessage {
                user_id: event.guild_owner_id,
                content: owner_alert,
            })
            .await;
        report.record("direct_message", outcome);

        let (count, window) = match &verdict.violation {
            Violation::Nuke {
                count, window_secs, ..
            } => (*count, *window_secs),
            _ => (0, self.thresholds.nuke_window_secs),
        };
        if let Some(channel_id) = self
            .executor
            .security_log_channel(event.guild_id, log_channel)
            .await
        {
            let content = format!(
                "**{}**\n{}\n{}",
                self.text(locale, "nuke_blocked", &[]),
                self.text(
                    locale,
                    "nuke_attempt_mass",
                    &[
                        ("user", actor),
                        ("action", event.action.to_string()),
                        ("count", count.to_string()),
                        ("window", window.to_string()),
                    ],
                ),
                response,
            );
            let outcome = self
                .executor
                .execute(&ActionDirective::ChannelMessage { channel_id, content })
                .await;
            report.record("channel_message", outcome);
        }

        let details = BTreeMap::from([
            ("moderator_id".to_string(), json!(event.actor_id.to_string())),
            ("action_type".to_string(), json!(event.action.as_str())),
            ("action_count".to_string(), json!(count)),
            ("time_window".to_string(), json!(window)),
        ]);
        report.logged = self
            .write_log(event.guild_id, SecurityLogKind::NukeAttempt, details)
            .await;

        report
    }

    /// Delete, flash a short-lived warning, escalate high severity, log.
    pub async fn respond_automod(&self, message: &InboundMessage, verdict: &Verdict) -> ResponseReport {
        let mut report = ResponseReport::default();
        let (locale, _) = self.guild_settings(message.guild_id).await;

        let outcome = self
            .executor
            .execute(&ActionDirective::DeleteMessage {
                channel_id: message.channel_id,
                message_id: message.message_id,
            })
            .await;
        report.record("delete_message", outcome);

        let notice = self.text(
            locale,
            "automod_notice",
            &[
                ("user", format!("<@{}>", message.author_id)),
                ("reason", verdict.reason.clone()),
            ],
        );
        if let Some(notice_id) = self.executor.post_message(message.channel_id, &notice).await {
            report.record("channel_message", ActionOutcome::Applied);
            let executor = Arc::clone(&self.executor);
            let channel_id = message.channel_id;
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_secs(TRANSIENT_NOTICE_SECS)).await;
                executor
                    .execute(&ActionDirective::DeleteMessage {
                        channel_id,
                        message_id: notice_id,
                    })
                    .await;
            });
        }

        if verdict.severity == Severity::High {
            let target = WarningTarget {
                guild_id: message.guild_id,
                guild_name: message.guild_name.clone(),
                user_id: message.author_id,
                channel_id: Some(message.channel_id),
            };
            match self
                .apply_warning(&target, &format!("[AUTO-MOD] {}", verdict.reason), true)
                .await
            {
                Ok(escalation) => {
                    if let Some(outcome) = escalation.action {
                        report.record("escalation", outcome);
                    }
                }
                Err(error) => {
                    tracing::error!(guild_id = message.guild_id, user_id = message.author_id, %error, "Automatic warning failed");
                }
            }
        }

        let details = BTreeMap::from([
            ("user_id".to_string(), json!(message.author_id.to_string())),
            ("type".to_string(), json!(verdict.violation.label())),
            ("reason".to_string(), json!(verdict.reason)),
            ("severity".to_string(), json!(verdict.severity.as_str())),
        ]);
        report.logged = self
            .write_log(message.guild_id, SecurityLogKind::AutoModTrigger, details)
            .await;

        report
    }

    /// Mute a command spammer in the guild where they were caught.
    pub async fn respond_command_spam(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
        user_id: u64,
        verdict: &Verdict,
    ) -> ResponseReport {
        let mut report = ResponseReport::default();
        let (locale, _) = self.guild_settings(guild_id).await;

        let outcome = self
            .executor
            .execute(&ActionDirective::Timeout {
                guild_id,
                user_id,
                duration: Some(self.mute_days()),
                reason: format!("[AUTO] Command Spam: {}", verdict.reason),
            })
            .await;
        let muted = report.record("timeout", outcome).is_success();

        if muted {
            if let Some(channel_id) = channel_id {
                let content = self.text(
                    locale,
                    "command_spam_muted",
                    &[
                        ("user", format!("<@{user_id}>")),
                        ("days", self.thresholds.auto_mute_days.to_string()),
                    ],
                );
                let outcome = self
                    .executor
                    .execute(&ActionDirective::ChannelMessage { channel_id, content })
                    .await;
                report.record("channel_message", outcome);
            }
        }

        if let Err(error) = self.tracker.clear(TrackKey::commands(user_id)).await {
            tracing::error!(user_id, %error, "Could not clear command window");
        }

        report
    }

    /// Tell a user once that their direct messages are now ignored.
    pub async fn notify_dm_block(&self, user_id: u64) -> ResponseReport {
        let mut report = ResponseReport::default();
        let content = self.text(Locale::default(), "dm_spam_blocked", &[]);
        let outcome = self
            .executor
            .execute(&ActionDirective::DirectMessage { user_id, content })
            .await;
        report.record("direct_message", outcome);
        report
    }

    // ========================================================================
    // WARNING ESCALATION
    // ========================================================================

    /// Add a warning and carry out the ladder step it reaches.
    ///
    /// The member is always messaged before any timeout, kick or ban.
    pub async fn apply_warning(
        &self,
        target: &WarningTarget,
        reason: &str,
        automatic: bool,
    ) -> Result<EscalationReport, StoreError> {
        let warning = self
            .warnings
            .add_warning(target.guild_id, target.user_id, reason)
            .await?;
        let (locale, _) = self.guild_settings(target.guild_id).await;
        let mention = format!("<@{}>", target.user_id);
        let count = warning.count;
        let audit_reason = match automatic {
            true => format!("[AUTO] Warning #{count}: {reason}"),
            false => format!("Warning #{count}: {reason}"),
        };

        if let Escalation::ExcessiveBan = warning.escalation {
            self.send_notice(
                locale,
                target,
                self.text(locale, "action_banned", &[]),
                reason,
                self.text(locale, "extra_cannot_rejoin", &[]),
            )
            .await;
            let outcome = self
                .executor
                .execute(&ActionDirective::Ban {
                    guild_id: target.guild_id,
                    user_id: target.user_id,
                    reason: format!("Excessive warnings: {count}"),
                })
                .await;
            if let (Some(channel_id), true) = (target.channel_id, outcome.is_success()) {
                let content = self.text(locale, "warning_excessive", &[("user", mention)]);
                self.executor
                    .execute(&ActionDirective::ChannelMessage { channel_id, content })
                    .await;
            }
            return Ok(EscalationReport {
                warning,
                action: Some(outcome),
            });
        }

        let ladder_text = ladder_message_key(count)
            .map(|key| self.text(locale, &key, &[]))
            .unwrap_or_default();

        if let Some(channel_id) = target.channel_id {
            let title = self.text(locale, if automatic { "warning_auto" } else { "warning_title" }, &[]);
            let content = format!(
                "**{title}**\n{ladder_text}\n{}: {mention}\n{}: {count}/{LADDER_TOP}\n{}: {reason}",
                self.text(locale, "warning_member", &[]),
                self.text(locale, "warning_count", &[]),
                self.text(locale, "warning_reason", &[]),
            );
            self.executor
                .execute(&ActionDirective::ChannelMessage { channel_id, content })
                .await;
        }

        self.send_notice(
            locale,
            target,
            self.text(locale, "action_warned", &[("count", count.to_string())]),
            reason,
            ladder_text,
        )
        .await;

        let directive = match warning.escalation {
            Escalation::Notice | Escalation::ExcessiveBan => None,
            Escalation::Timeout { minutes } => Some(ActionDirective::Timeout {
                guild_id: target.guild_id,
                user_id: target.user_id,
                duration: Some(Duration::minutes(i64::from(minutes))),
                reason: audit_reason,
            }),
            Escalation::Kick => {
                self.send_notice(
                    locale,
                    target,
                    self.text(locale, "action_kicked", &[]),
                    reason,
                    self.text(locale, "extra_rejoin", &[]),
                )
                .await;
                Some(ActionDirective::Kick {
                    guild_id: target.guild_id,
                    user_id: target.user_id,
                    reason: audit_reason,
                })
            }
            Escalation::Ban { .. } => {
                self.send_notice(
                    locale,
                    target,
                    self.text(locale, "action_banned", &[]),
                    reason,
                    self.text(locale, "extra_cannot_rejoin", &[]),
                )
                .await;
                Some(ActionDirective::Ban {
                    guild_id: target.guild_id,
                    user_id: target.user_id,
                    reason: audit_reason,
                })
            }
        };

        let action = match directive {
            Some(directive) => Some(self.executor.execute(&directive).await),
            None => None,
        };

        Ok(EscalationReport { warning, action })
    }

    // ========================================================================
    // MANUAL MODERATION
    // ========================================================================

    /// Carry out a moderator's action and post it to the log channel.
    ///
    /// Members are messaged before a timeout, kick or ban. Warnings and
    /// cleared warnings have no platform step here and are only logged.
    pub async fn moderate(&self, request: &ModeratorRequest, action: ManualAction) -> ActionOutcome {
        let (locale, log_channel) = self.guild_settings(request.guild_id).await;
        let target = WarningTarget {
            guild_id: request.guild_id,
            guild_name: request.guild_name.clone(),
            user_id: request.user_id,
            channel_id: None,
        };
        let audit_reason = format!(
            "{} ({}): {}",
            request.moderator_name, request.moderator_id, request.reason
        );
        let (guild_id, user_id) = (request.guild_id, request.user_id);

        let directive = match action {
            ManualAction::Warn { .. } | ManualAction::ClearWarnings => None,
            ManualAction::Timeout { minutes } => {
                let duration = format_duration(minutes, locale);
                self.send_notice(
                    locale,
                    &target,
                    self.text(locale, "action_timeout", &[("duration", duration.clone())]),
                    &request.reason,
                    self.text(locale, "extra_timeout_duration", &[("duration", duration)]),
                )
                .await;
                Some(ActionDirective::Timeout {
                    guild_id,
                    user_id,
                    duration: Some(Duration::minutes(i64::from(minutes))),
                    reason: audit_reason,
                })
            }
            ManualAction::RemoveTimeout => Some(ActionDirective::Timeout {
                guild_id,
                user_id,
                duration: None,
                reason: audit_reason,
            }),
            ManualAction::Kick => {
                self.send_notice(
                    locale,
                    &target,
                    self.text(locale, "action_kicked", &[]),
                    &request.reason,
                    self.text(locale, "extra_rejoin", &[]),
                )
                .await;
                Some(ActionDirective::Kick {
                    guild_id,
                    user_id,
                    reason: audit_reason,
                })
            }
            ManualAction::Ban => {
                self.send_notice(
                    locale,
                    &target,
                    self.text(locale, "action_banned", &[]),
                    &request.reason,
                    self.text(locale, "extra_cannot_rejoin", &[]),
                )
                .await;
                Some(ActionDirective::Ban {
                    guild_id,
                    user_id,
                    reason: audit_reason,
                })
            }
            ManualAction::Unban => Some(ActionDirective::Unban {
                guild_id,
                user_id,
                reason: audit_reason,
            }),
        };

        let outcome = match directive {
            Some(directive) => self.executor.execute(&directive).await,
            None => ActionOutcome::Applied,
        };
        // Only actions that took effect are logged; an unknown ban is not one.
        if outcome == ActionOutcome::Applied {
            self.post_moderation_log(locale, log_channel, request, action).await;
        }
        outcome
    }

    async fn post_moderation_log(
        &self,
        locale: Locale,
        log_channel: Option<u64>,
        request: &ModeratorRequest,
        action: ManualAction,
    ) {
        let Some(channel_id) = self
            .executor
            .security_log_channel(request.guild_id, log_channel)
            .await
        else {
            return;
        };

        let label = match action {
            ManualAction::Warn { count } => self.text(locale, "modlog_warning", &[("count", count.to_string())]),
            ManualAction::ClearWarnings => self.text(locale, "modlog_clear_warnings", &[]),
            ManualAction::Timeout { minutes } => self.text(
                locale,
                "modlog_timeout",
                &[("duration", format_duration(minutes, locale))],
            ),
            ManualAction::RemoveTimeout => self.text(locale, "modlog_remove_timeout", &[]),
            ManualAction::Kick => self.text(locale, "modlog_kick", &[]),
            ManualAction::Ban => self.text(locale, "modlog_ban", &[]),
            ManualAction::Unban => self.text(locale, "modlog_unban", &[]),
        };
        let content = format!(
            "**{}**\n{}: <@{}>\n{}: <@{}>\n{}: {}\nID: {}",
            self.text(locale, "modlog_title", &[("action", label)]),
            self.text(locale, "modlog_moderator", &[]),
            request.moderator_id,
            self.text(locale, "modlog_target", &[]),
            request.user_id,
            self.text(locale, "warning_reason", &[]),
            request.reason,
            request.user_id,
        );
        self.executor
            .execute(&ActionDirective::ChannelMessage { channel_id, content })
            .await;
    }

    async fn send_notice(&self, locale: Locale, target: &WarningTarget, action: String, reason: &str, extra: String) {
        let content = self.notice(locale, &target.guild_name, action, reason, extra);
        self.executor
            .execute(&ActionDirective::DirectMessage {
                user_id: target.user_id,
                content,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::response::ActionError;
    use crate::core::testing::{Fixture, PlatformCall};
    use crate::core::tracking::{ModerationActionKind, Sample};

    fn message(content: &str) -> InboundMessage {
        InboundMessage {
            guild_id: 1,
            guild_name: "Test Guild".to_string(),
            channel_id: 10,
            message_id: 100,
            author_id: 2,
            author_is_bot: false,
            content: content.to_string(),
            mentioned_user_ids: Vec::new(),
        }
    }

    fn target() -> WarningTarget {
        WarningTarget {
            guild_id: 1,
            guild_name: "Test Guild".to_string(),
            user_id: 2,
            channel_id: Some(10),
        }
    }

    fn spam_verdict() -> Verdict {
        Verdict::new(
            Violation::MessageSpam {
                messages: 5,
                window_secs: 5,
            },
            "Sent 5 messages in 5 seconds",
            Severity::Medium,
        )
    }

    #[tokio::test]
    async fn test_spam_response_runs_every_step_in_order() {
        let fixture = Fixture::new();
        fixture
            .tracker
            .track(TrackKey::messages(1, 2), Sample::Message { content: "x".into() })
            .await
            .unwrap();

        let report = fixture.responder.respond_spam(&message("x"), &spam_verdict()).await;

        let kinds = fixture.platform.kinds();
        let delete = kinds.iter().position(|k| *k == "delete_message").unwrap();
        let timeout = kinds.iter().position(|k| *k == "timeout").unwrap();
        let dm = kinds.iter().position(|k| *k == "direct_message").unwrap();
        assert!(delete < timeout && timeout < dm);
        assert!(fixture.platform.calls().iter().any(|call| matches!(
            call,
            PlatformCall::Timeout { user_id: 2, minutes: Some(10_080), .. }
        )));

        assert!(report.logged);
        let log = fixture.security_log.recent(1, 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, SecurityLogKind::SpamDetected);
        assert!(fixture.tracker.history(TrackKey::messages(1, 2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spam_response_survives_permission_errors() {
        let fixture = Fixture::new();
        fixture.platform.fail("delete_message", ActionError::PermissionDenied);
        fixture.platform.fail("timeout", ActionError::Transient("gateway".into()));
        fixture.platform.fail("direct_message", ActionError::PermissionDenied);

        let report = fixture.responder.respond_spam(&message("x"), &spam_verdict()).await;

        assert_eq!(report.outcome("delete_message"), Some(&ActionOutcome::PermissionDenied));
        assert!(matches!(report.outcome("timeout"), Some(ActionOutcome::Failed(_))));
        assert!(report.logged);
        assert_eq!(fixture.security_log.recent(1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nuke_response_strips_roles_even_if_one_fails() {
        let fixture = Fixture::new();
        fixture.platform.set_privileged_roles(vec![70, 71]);
        fixture.platform.set_security_channel(Some(900));
        fixture.platform.fail("remove_role", ActionError::PermissionDenied);

        let event = InboundModAction {
            guild_id: 1,
            guild_name: "Test Guild".to_string(),
            guild_owner_id: 500,
            actor_id: 600,
            action: ModerationActionKind::Ban,
        };
        let verdict = Verdict::new(
            Violation::Nuke {
                action: ModerationActionKind::Ban,
                count: 3,
                window_secs: 10,
            },
            "Attempted mass ban",
            Severity::High,
        );
        let report = fixture.responder.respond_nuke(&event, &verdict).await;

        assert_eq!(fixture.platform.count("remove_role"), 2);
        assert_eq!(report.outcome("timeout"), Some(&ActionOutcome::Applied));
        let calls = fixture.platform.calls();
        assert!(calls.iter().any(|call| matches!(
            call,
            PlatformCall::Timeout { user_id: 600, minutes: Some(40_320), .. }
        )));
        assert!(calls
            .iter()
            .any(|call| matches!(call, PlatformCall::DirectMessage { user_id: 500, .. })));
        assert!(calls
            .iter()
            .any(|call| matches!(call, PlatformCall::ChannelMessage { channel_id: 900, .. })));

        let log = fixture.security_log.recent(1, 10).await.unwrap();
        assert_eq!(log[0].kind, SecurityLogKind::NukeAttempt);
        assert_eq!(log[0].details["action_type"], json!("ban"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_automod_notice_is_removed_after_delay() {
        let fixture = Fixture::new();
        let verdict = Verdict::new(Violation::InviteLink, "Posted Discord invite link", Severity::Medium);

        fixture.responder.respond_automod(&message("discord.gg/x"), &verdict).await;
        assert_eq!(fixture.platform.count("delete_message"), 1);

        tokio::time::sleep(std::time::Duration::from_secs(TRANSIENT_NOTICE_SECS + 1)).await;
        assert_eq!(fixture.platform.count("delete_message"), 2);

        // Medium severity does not touch the warning ladder.
        assert_eq!(fixture.warnings.get_warnings(1, 2).await.unwrap(), 0);
        let log = fixture.security_log.recent(1, 10).await.unwrap();
        assert_eq!(log[0].kind, SecurityLogKind::AutoModTrigger);
    }

    #[tokio::test]
    async fn test_high_severity_automod_adds_warning() {
        let fixture = Fixture::new();
        let verdict = Verdict::new(
            Violation::BlacklistedWord { word: "nazi".into() },
            "Used blacklisted word: nazi",
            Severity::High,
        );

        fixture.responder.respond_automod(&message("nazi"), &verdict).await;

        let records = fixture.warnings.warnings(1, 2).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "[AUTO-MOD] Used blacklisted word: nazi");
    }

    #[tokio::test]
    async fn test_ladder_dm_always_precedes_punishment() {
        let fixture = Fixture::new();

        for count in 1..=11 {
            fixture.platform.clear();
            let report = fixture.responder.apply_warning(&target(), "spamming", false).await.unwrap();
            assert_eq!(report.warning.count, count);

            let kinds = fixture.platform.kinds();
            let first_dm = kinds.iter().position(|k| *k == "direct_message");
            let punishment = kinds
                .iter()
                .position(|k| matches!(*k, "timeout" | "kick" | "ban"));
            assert!(first_dm.is_some(), "count {count} sent no DM");
            match (count, punishment) {
                (1..=3, None) => assert!(report.action.is_none()),
                (1..=3, Some(_)) => panic!("count {count} punished"),
                (_, Some(position)) => assert!(first_dm.unwrap() < position, "count {count}"),
                (_, None) => panic!("count {count} not punished"),
            }
        }
    }

    #[tokio::test]
    async fn test_ladder_actions_match_counts() {
        let fixture = Fixture::new();
        let mut actions = Vec::new();
        for _ in 0..11 {
            fixture.platform.clear();
            fixture.responder.apply_warning(&target(), "x", false).await.unwrap();
            actions.push(
                fixture
                    .platform
                    .calls()
                    .into_iter()
                    .find_map(|call| match call {
                        PlatformCall::Timeout { minutes, .. } => Some(format!("timeout {}", minutes.unwrap_or(0))),
                        PlatformCall::Kick { .. } => Some("kick".to_string()),
                        PlatformCall::Ban { .. } => Some("ban".to_string()),
                        _ => None,
                    })
                    .unwrap_or_else(|| "none".to_string()),
            );
        }
        assert_eq!(
            actions,
            vec![
                "none",
                "none",
                "none",
                "timeout 5",
                "timeout 30",
                "timeout 60",
                "timeout 180",
                "kick",
                "ban",
                "ban",
                "ban"
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_punishment_is_reported_not_fatal() {
        let fixture = Fixture::new();
        for _ in 0..3 {
            fixture.responder.apply_warning(&target(), "x", false).await.unwrap();
        }
        fixture.platform.fail("timeout", ActionError::PermissionDenied);

        let report = fixture.responder.apply_warning(&target(), "x", false).await.unwrap();
        assert_eq!(report.warning.count, 4);
        assert_eq!(report.action, Some(ActionOutcome::PermissionDenied));
    }

    #[tokio::test]
    async fn test_command_spam_mutes_and_clears_window() {
        let fixture = Fixture::new();
        for _ in 0..5 {
            fixture.command_guard.check(2, "-ping").await.unwrap();
        }
        let verdict = Verdict::new(Violation::CommandSpam { commands: 5 }, "Used 5 commands in 10s", Severity::Medium);

        let report = fixture.responder.respond_command_spam(1, Some(10), 2, &verdict).await;

        assert_eq!(report.outcome("timeout"), Some(&ActionOutcome::Applied));
        assert_eq!(report.outcome("channel_message"), Some(&ActionOutcome::Applied));
        assert!(fixture.tracker.history(TrackKey::commands(2)).await.unwrap().is_empty());
    }

    fn request() -> ModeratorRequest {
        ModeratorRequest {
            guild_id: 1,
            guild_name: "Test Guild".to_string(),
            moderator_id: 7,
            moderator_name: "mod".to_string(),
            user_id: 2,
            reason: "raiding".to_string(),
        }
    }

    fn log_posts(fixture: &Fixture, channel: u64) -> Vec<String> {
        fixture
            .platform
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::ChannelMessage { channel_id, content } if channel_id == channel => Some(content),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_manual_kick_and_ban_message_the_member_first() {
        for (action, kind) in [(ManualAction::Kick, "kick"), (ManualAction::Ban, "ban")] {
            let fixture = Fixture::new();
            let outcome = fixture.responder.moderate(&request(), action).await;
            assert_eq!(outcome, ActionOutcome::Applied);

            let kinds = fixture.platform.kinds();
            let dm = kinds.iter().position(|k| *k == "direct_message").unwrap();
            let act = kinds.iter().position(|k| *k == kind).unwrap();
            assert!(dm < act, "{kind}");
            assert!(fixture.platform.calls().iter().any(|call| matches!(
                call,
                PlatformCall::DirectMessage { user_id: 2, content } if content.contains("raiding")
            )));
        }
    }

    #[tokio::test]
    async fn test_manual_actions_are_posted_to_log_channel() {
        let fixture = Fixture::new();
        fixture.policies.set_log_channel(1, Some(950)).await.unwrap();

        fixture.responder.moderate(&request(), ManualAction::Ban).await;
        fixture.responder.moderate(&request(), ManualAction::Unban).await;
        fixture.responder.moderate(&request(), ManualAction::Warn { count: 3 }).await;

        let posts = log_posts(&fixture, 950);
        assert_eq!(posts.len(), 3);
        assert!(posts[0].contains("Ban") && posts[0].contains("<@7>") && posts[0].contains("<@2>"));
        assert!(posts[1].contains("Unban"));
        assert!(posts[2].contains("Warning #3"));
        assert!(fixture.platform.calls().contains(&PlatformCall::Unban { guild_id: 1, user_id: 2 }));
        // Logging a warning never touches the member.
        assert_eq!(fixture.platform.count("direct_message"), 1);
    }

    #[tokio::test]
    async fn test_failed_manual_action_is_not_logged() {
        let fixture = Fixture::new();
        fixture.platform.set_security_channel(Some(960));
        fixture.platform.fail("kick", ActionError::PermissionDenied);
        fixture.platform.fail("unban", ActionError::NotFound);

        let kick = fixture.responder.moderate(&request(), ManualAction::Kick).await;
        let unban = fixture.responder.moderate(&request(), ManualAction::Unban).await;

        assert_eq!(kick, ActionOutcome::PermissionDenied);
        assert_eq!(unban, ActionOutcome::AlreadyGone);
        assert!(log_posts(&fixture, 960).is_empty());
    }

    #[tokio::test]
    async fn test_manual_timeout_uses_requested_minutes() {
        let fixture = Fixture::new();
        fixture.platform.set_security_channel(Some(960));

        fixture
            .responder
            .moderate(&request(), ManualAction::Timeout { minutes: 90 })
            .await;
        fixture.responder.moderate(&request(), ManualAction::RemoveTimeout).await;

        assert_eq!(
            fixture.platform.kinds(),
            vec!["direct_message", "timeout", "channel_message", "remove_timeout", "channel_message"]
        );
        assert!(fixture.platform.calls().iter().any(|call| matches!(
            call,
            PlatformCall::Timeout { minutes: Some(90), reason, .. } if reason.starts_with("mod (7)")
        )));
    }

    #[tokio::test]
    async fn test_nuke_owner_alert_is_fully_localized() {
        let fixture = Fixture::new();
        fixture.policies.set_locale(1, Locale::Vi).await.unwrap();
        let event = InboundModAction {
            guild_id: 1,
            guild_name: "Test Guild".to_string(),
            guild_owner_id: 500,
            actor_id: 600,
            action: ModerationActionKind::Kick,
        };
        let verdict = Verdict::new(
            Violation::Nuke {
                action: ModerationActionKind::Kick,
                count: 3,
                window_secs: 10,
            },
            "Attempted mass kick",
            Severity::High,
        );

        fixture.responder.respond_nuke(&event, &verdict).await;

        let alert = fixture
            .platform
            .calls()
            .into_iter()
            .find_map(|call| match call {
                PlatformCall::DirectMessage { user_id: 500, content } => Some(content),
                _ => None,
            })
            .unwrap();
        assert!(alert.contains("Hành động"));
        assert!(alert.contains("Người thực hiện"));
        assert!(!alert.contains("Moderator"));
    }
}
