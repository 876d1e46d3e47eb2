// Gateway events -> security events.
//
// This file only extracts primitive data from serenity types; every decision
// is made by the core dispatcher.

use crate::core::dispatch::{ObservedModAction, SecurityEvent};
use crate::core::security::{InboundJoin, InboundMessage};
use crate::core::tracking::ModerationActionKind;
use crate::discord::{Data, Error};
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

/// Name and owner of a cached guild. Copied out so no cache guard lives
/// across an await.
fn guild_identity(ctx: &serenity::Context, guild_id: serenity::GuildId) -> (String, u64) {
    ctx.cache
        .guild(guild_id)
        .map(|guild| (guild.name.clone(), guild.owner_id.get()))
        .unwrap_or_else(|| (guild_id.to_string(), 0))
}

fn to_utc(timestamp: serenity::Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0).unwrap_or_else(Utc::now)
}

/// Translate one gateway event, if it is one the engine cares about.
pub fn translate(ctx: &serenity::Context, event: &serenity::FullEvent) -> Option<SecurityEvent> {
    match event {
        serenity::FullEvent::Message { new_message } => Some(match new_message.guild_id {
            None => SecurityEvent::DirectMessage {
                user_id: new_message.author.id.get(),
                author_is_bot: new_message.author.bot,
                content: new_message.content.clone(),
            },
            Some(guild_id) => {
                let (guild_name, _) = guild_identity(ctx, guild_id);
                SecurityEvent::Message(InboundMessage {
                    guild_id: guild_id.get(),
                    guild_name,
                    channel_id: new_message.channel_id.get(),
                    message_id: new_message.id.get(),
                    author_id: new_message.author.id.get(),
                    author_is_bot: new_message.author.bot,
                    content: new_message.content.clone(),
                    mentioned_user_ids: new_message.mentions.iter().map(|u| u.id.get()).collect(),
                })
            }
        }),
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            let (guild_name, _) = guild_identity(ctx, new_member.guild_id);
            Some(SecurityEvent::MemberJoined(InboundJoin {
                guild_id: new_member.guild_id.get(),
                guild_name,
                user_id: new_member.user.id.get(),
                user_is_bot: new_member.user.bot,
                account_created_at: to_utc(new_member.user.created_at()),
            }))
        }
        serenity::FullEvent::GuildBanAddition { guild_id, banned_user } => Some(moderation_action(
            ctx,
            *guild_id,
            ModerationActionKind::Ban,
            Some(banned_user.id.get()),
        )),
        // A removal is only a kick if the audit log says so; plain leaves
        // resolve to no actor and are ignored.
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => Some(moderation_action(
            ctx,
            *guild_id,
            ModerationActionKind::Kick,
            Some(user.id.get()),
        )),
        serenity::FullEvent::ChannelDelete { channel, .. } => Some(moderation_action(
            ctx,
            channel.guild_id,
            ModerationActionKind::ChannelDelete,
            Some(channel.id.get()),
        )),
        serenity::FullEvent::GuildRoleDelete {
            guild_id,
            removed_role_id,
            ..
        } => Some(moderation_action(
            ctx,
            *guild_id,
            ModerationActionKind::RoleDelete,
            Some(removed_role_id.get()),
        )),
        _ => None,
    }
}

fn moderation_action(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    action: ModerationActionKind,
    target_id: Option<u64>,
) -> SecurityEvent {
    let (guild_name, guild_owner_id) = guild_identity(ctx, guild_id);
    SecurityEvent::ModerationAction(ObservedModAction {
        guild_id: guild_id.get(),
        guild_name,
        guild_owner_id,
        action,
        target_id,
        actor_id: None,
    })
}

/// Event handler registered with the poise framework.
pub async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Ready { data_about_bot } = event {
        tracing::info!(user = %data_about_bot.user.name, guilds = data_about_bot.guilds.len(), "Connected to gateway");
        return Ok(());
    }

    // Our own messages never reach the detectors.
    if let serenity::FullEvent::Message { new_message } = event {
        if new_message.author.id == ctx.cache.current_user().id {
            return Ok(());
        }
    }

    if let Some(security_event) = translate(ctx, event) {
        let outcome = data.dispatcher.dispatch(security_event).await;
        tracing::debug!(?outcome, "Security event handled");
    }

    Ok(())
}
