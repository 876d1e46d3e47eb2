// Response executor - the single sink for outbound platform actions.
//
// Every call is bounded by a timeout and every failure is classified and
// logged here. Nothing is retried: a failed kick or ban stays failed.

use super::platform::{ActionError, PlatformActions};
use crate::core::tracking::ModerationActionKind;
use chrono::Duration;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum ActionDirective {
    DeleteMessage {
        channel_id: u64,
        message_id: u64,
    },
    Timeout {
        guild_id: u64,
        user_id: u64,
        duration: Option<Duration>,
        reason: String,
    },
    Kick {
        guild_id: u64,
        user_id: u64,
        reason: String,
    },
    Ban {
        guild_id: u64,
        user_id: u64,
        reason: String,
    },
    Unban {
        guild_id: u64,
        user_id: u64,
        reason: String,
    },
    RemoveRole {
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: String,
    },
    DirectMessage {
        user_id: u64,
        content: String,
    },
    ChannelMessage {
        channel_id: u64,
        content: String,
    },
}

impl ActionDirective {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionDirective::DeleteMessage { .. } => "delete_message",
            ActionDirective::Timeout { duration: None, .. } => "remove_timeout",
            ActionDirective::Timeout { .. } => "timeout",
            ActionDirective::Kick { .. } => "kick",
            ActionDirective::Ban { .. } => "ban",
            ActionDirective::Unban { .. } => "unban",
            ActionDirective::RemoveRole { .. } => "remove_role",
            ActionDirective::DirectMessage { .. } => "direct_message",
            ActionDirective::ChannelMessage { .. } => "channel_message",
        }
    }

    fn target(&self) -> u64 {
        match self {
            ActionDirective::DeleteMessage { message_id, .. } => *message_id,
            ActionDirective::Timeout { user_id, .. }
            | ActionDirective::Kick { user_id, .. }
            | ActionDirective::Ban { user_id, .. }
            | ActionDirective::Unban { user_id, .. }
            | ActionDirective::RemoveRole { user_id, .. }
            | ActionDirective::DirectMessage { user_id, .. } => *user_id,
            ActionDirective::ChannelMessage { channel_id, .. } => *channel_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    /// The target no longer exists; counts as done.
    AlreadyGone,
    PermissionDenied,
    Failed(String),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Applied | ActionOutcome::AlreadyGone)
    }
}

impl From<ActionError> for ActionOutcome {
    fn from(error: ActionError) -> Self {
        match error {
            ActionError::PermissionDenied => ActionOutcome::PermissionDenied,
            ActionError::NotFound => ActionOutcome::AlreadyGone,
            ActionError::Transient(detail) => ActionOutcome::Failed(detail),
        }
    }
}

/// Delivery of an alert to the security channel and the top role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub channel_posted: bool,
    pub direct_messages_sent: usize,
}

pub struct ResponseExecutor {
    platform: Arc<dyn PlatformActions>,
    call_timeout: std::time::Duration,
}

impl ResponseExecutor {
    pub fn new(platform: Arc<dyn PlatformActions>, call_timeout: std::time::Duration) -> Self {
        Self {
            platform,
            call_timeout,
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, ActionError>>) -> Result<T, ActionError> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ActionError::Transient(format!(
                "no response within {:?}",
                self.call_timeout
            ))),
        }
    }

    pub async fn execute(&self, directive: &ActionDirective) -> ActionOutcome {
        let platform = &self.platform;
        let result = match directive {
            ActionDirective::DeleteMessage {
                channel_id,
                message_id,
            } => self.bounded(platform.delete_message(*channel_id, *message_id)).await,
            ActionDirective::Timeout {
                guild_id,
                user_id,
                duration,
                reason,
            } => {
                self.bounded(platform.timeout_member(*guild_id, *user_id, *duration, reason))
                    .await
            }
            ActionDirective::Kick {
                guild_id,
                user_id,
                reason,
            } => self.bounded(platform.kick_member(*guild_id, *user_id, reason)).await,
            ActionDirective::Ban {
                guild_id,
                user_id,
                reason,
            } => self.bounded(platform.ban_member(*guild_id, *user_id, reason)).await,
            ActionDirective::Unban {
                guild_id,
                user_id,
                reason,
            } => self.bounded(platform.unban_member(*guild_id, *user_id, reason)).await,
            ActionDirective::RemoveRole {
                guild_id,
                user_id,
                role_id,
                reason,
            } => {
                self.bounded(platform.remove_role(*guild_id, *user_id, *role_id, reason))
                    .await
            }
            ActionDirective::DirectMessage { user_id, content } => {
                self.bounded(platform.send_direct_message(*user_id, content)).await
            }
            ActionDirective::ChannelMessage {
                channel_id,
                content,
            } => self
                .bounded(platform.send_channel_message(*channel_id, content))
                .await
                .map(|_| ()),
        };

        let outcome = match result {
            Ok(()) => ActionOutcome::Applied,
            Err(error) => ActionOutcome::from(error),
        };
        log_outcome(directive.kind(), directive.target(), &outcome);
        outcome
    }

    /// Post a message and return its id so it can be removed later.
    pub async fn post_message(&self, channel_id: u64, content: &str) -> Option<u64> {
        match self
            .bounded(self.platform.send_channel_message(channel_id, content))
            .await
        {
            Ok(message_id) => {
                log_outcome("channel_message", channel_id, &ActionOutcome::Applied);
                Some(message_id)
            }
            Err(error) => {
                log_outcome("channel_message", channel_id, &ActionOutcome::from(error));
                None
            }
        }
    }

    /// Send an alert to the security log channel and DM the top role's members.
    pub async fn broadcast(&self, guild_id: u64, configured_channel: Option<u64>, content: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        if let Some(channel_id) = self.security_log_channel(guild_id, configured_channel).await {
            report.channel_posted = self.post_message(channel_id, content).await.is_some();
        }

        let members = match self.bounded(self.platform.highest_role_members(guild_id)).await {
            Ok(members) => members,
            Err(error) => {
                tracing::warn!(guild_id, %error, "Could not resolve highest role members");
                Vec::new()
            }
        };
        for user_id in members {
            let outcome = self
                .execute(&ActionDirective::DirectMessage {
                    user_id,
                    content: content.to_string(),
                })
                .await;
            if outcome.is_success() {
                report.direct_messages_sent += 1;
            }
        }

        report
    }

    pub async fn security_log_channel(&self, guild_id: u64, configured: Option<u64>) -> Option<u64> {
        match self
            .bounded(self.platform.security_log_channel(guild_id, configured))
            .await
        {
            Ok(channel) => channel,
            Err(error) => {
                tracing::warn!(guild_id, %error, "Could not resolve security log channel");
                None
            }
        }
    }

    pub async fn resolve_actor(
        &self,
        guild_id: u64,
        action: ModerationActionKind,
        target_id: Option<u64>,
    ) -> Option<u64> {
        match self
            .bounded(self.platform.fetch_audit_log_actor(guild_id, action, target_id))
            .await
        {
            Ok(actor) => actor,
            Err(error) => {
                tracing::warn!(guild_id, action = %action, %error, "Audit log lookup failed");
                None
            }
        }
    }

    pub async fn privileged_roles(&self, guild_id: u64, user_id: u64) -> Vec<u64> {
        match self.bounded(self.platform.privileged_roles(guild_id, user_id)).await {
            Ok(roles) => roles,
            Err(error) => {
                tracing::warn!(guild_id, user_id, %error, "Could not list privileged roles");
                Vec::new()
            }
        }
    }
}

fn log_outcome(kind: &'static str, target: u64, outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Applied => tracing::info!(action = kind, target, "Platform action applied"),
        ActionOutcome::AlreadyGone => {
            tracing::debug!(action = kind, target, "Platform action target already gone")
        }
        ActionOutcome::PermissionDenied => {
            tracing::warn!(action = kind, target, "Platform action denied: missing permission")
        }
        ActionOutcome::Failed(detail) => {
            tracing::error!(action = kind, target, detail = %detail, "Platform action failed")
        }
    }
}
