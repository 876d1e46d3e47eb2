// Serenity implementation of the platform port.
//
// HTTP failures are mapped onto `ActionError`: 403 is a missing permission,
// 404 a target that no longer exists, everything else transient.

use crate::core::response::{ActionError, PlatformActions};
use crate::core::tracking::ModerationActionKind;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serenity::model::guild::audit_log::{Action, ChannelAction, MemberAction, RoleAction};
use std::sync::Arc;

/// Name of the fallback channel for security alerts.
pub const SECURITY_LOG_CHANNEL_NAME: &str = "security-log";

/// Audit log entries older than this are not attributed to a live event.
const AUDIT_LOOKBACK_SECS: i64 = 30;

pub struct SerenityPlatform {
    http: Arc<serenity::Http>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

fn classify(error: serenity::Error) -> ActionError {
    if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) = &error {
        match response.status_code.as_u16() {
            403 => return ActionError::PermissionDenied,
            404 => return ActionError::NotFound,
            _ => {}
        }
    }
    ActionError::Transient(error.to_string())
}

fn audit_action(action: ModerationActionKind) -> Action {
    match action {
        ModerationActionKind::Ban => Action::Member(MemberAction::BanAdd),
        ModerationActionKind::Kick => Action::Member(MemberAction::Kick),
        ModerationActionKind::ChannelDelete => Action::Channel(ChannelAction::Delete),
        ModerationActionKind::RoleDelete => Action::Role(RoleAction::Delete),
    }
}

#[async_trait]
impl PlatformActions for SerenityPlatform {
    async fn send_direct_message(&self, user_id: u64, content: &str) -> Result<(), ActionError> {
        let channel = serenity::UserId::new(user_id)
            .create_dm_channel(&self.http)
            .await
            .map_err(classify)?;
        channel
            .id
            .send_message(&self.http, serenity::CreateMessage::new().content(content))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), ActionError> {
        serenity::ChannelId::new(channel_id)
            .delete_message(&self.http, serenity::MessageId::new(message_id))
            .await
            .map_err(classify)
    }

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        duration: Option<chrono::Duration>,
        reason: &str,
    ) -> Result<(), ActionError> {
        let edit = match duration {
            Some(duration) => {
                let until = serenity::Timestamp::from_unix_timestamp((chrono::Utc::now() + duration).timestamp())
                    .map_err(|e| ActionError::Transient(e.to_string()))?;
                serenity::EditMember::new().disable_communication_until_datetime(until)
            }
            None => serenity::EditMember::new().enable_communication(),
        };

        serenity::GuildId::new(guild_id)
            .edit_member(&self.http, serenity::UserId::new(user_id), edit.audit_log_reason(reason))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn kick_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ActionError> {
        serenity::GuildId::new(guild_id)
            .kick_with_reason(&self.http, serenity::UserId::new(user_id), reason)
            .await
            .map_err(classify)
    }

    async fn ban_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ActionError> {
        serenity::GuildId::new(guild_id)
            .ban_with_reason(&self.http, serenity::UserId::new(user_id), 0, reason)
            .await
            .map_err(classify)
    }

    async fn unban_member(&self, guild_id: u64, user_id: u64, _reason: &str) -> Result<(), ActionError> {
        serenity::GuildId::new(guild_id)
            .unban(&self.http, serenity::UserId::new(user_id))
            .await
            .map_err(classify)
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), ActionError> {
        self.http
            .remove_member_role(
                serenity::GuildId::new(guild_id),
                serenity::UserId::new(user_id),
                serenity::RoleId::new(role_id),
                Some(reason),
            )
            .await
            .map_err(classify)
    }

    async fn send_channel_message(&self, channel_id: u64, content: &str) -> Result<u64, ActionError> {
        let message = serenity::ChannelId::new(channel_id)
            .say(&self.http, content)
            .await
            .map_err(classify)?;
        Ok(message.id.get())
    }

    async fn fetch_audit_log_actor(
        &self,
        guild_id: u64,
        action: ModerationActionKind,
        target_id: Option<u64>,
    ) -> Result<Option<u64>, ActionError> {
        let logs = serenity::GuildId::new(guild_id)
            .audit_logs(&self.http, Some(audit_action(action)), None, None, Some(5))
            .await
            .map_err(classify)?;

        let now = chrono::Utc::now().timestamp();
        let actor = logs
            .entries
            .iter()
            .filter(|entry| now - entry.id.created_at().unix_timestamp() <= AUDIT_LOOKBACK_SECS)
            .find(|entry| match target_id {
                Some(target) => entry.target_id.map(|t| t.get()) == Some(target),
                None => true,
            })
            .map(|entry| entry.user_id.get());
        Ok(actor)
    }

    async fn privileged_roles(&self, guild_id: u64, user_id: u64) -> Result<Vec<u64>, ActionError> {
        let guild = serenity::GuildId::new(guild_id);
        let member = guild
            .member(&self.http, serenity::UserId::new(user_id))
            .await
            .map_err(classify)?;
        let roles = guild.roles(&self.http).await.map_err(classify)?;

        let privileged = member
            .roles
            .iter()
            .filter_map(|role_id| roles.get(role_id))
            .filter(|role| {
                role.permissions.administrator() || role.permissions.ban_members() || role.permissions.kick_members()
            })
            .map(|role| role.id.get())
            .collect();
        Ok(privileged)
    }

    async fn highest_role_members(&self, guild_id: u64) -> Result<Vec<u64>, ActionError> {
        let guild = serenity::GuildId::new(guild_id);
        let mut roles: Vec<serenity::Role> = guild.roles(&self.http).await.map_err(classify)?.into_values().collect();
        let members = guild
            .members(&self.http, Some(1000), None)
            .await
            .map_err(classify)?;

        // @everyone shares the guild's id and is held by everyone.
        roles.retain(|role| role.id.get() != guild_id);
        roles.sort_by(|a, b| b.position.cmp(&a.position));

        for role in roles {
            let holders: Vec<&serenity::Member> = members.iter().filter(|m| m.roles.contains(&role.id)).collect();
            if holders.is_empty() {
                continue;
            }
            return Ok(holders
                .into_iter()
                .filter(|m| !m.user.bot)
                .map(|m| m.user.id.get())
                .collect());
        }
        Ok(Vec::new())
    }

    async fn security_log_channel(
        &self,
        guild_id: u64,
        configured: Option<u64>,
    ) -> Result<Option<u64>, ActionError> {
        let channels = serenity::GuildId::new(guild_id)
            .channels(&self.http)
            .await
            .map_err(classify)?;

        if let Some(channel_id) = configured {
            if channels.contains_key(&serenity::ChannelId::new(channel_id)) {
                return Ok(Some(channel_id));
            }
            tracing::warn!(guild_id, channel_id, "Configured log channel no longer exists");
        }

        Ok(channels
            .values()
            .find(|c| c.kind == serenity::ChannelType::Text && c.name == SECURITY_LOG_CHANNEL_NAME)
            .map(|c| c.id.get()))
    }
}
