// Security configuration commands.
//
// All of these require Administrator; bot owners skip the check through the
// framework's owner list.

use crate::core::policy::{PolicyError, SecurityFeature};
use crate::discord::{require_guild, tr, Context, Error};
use poise::serenity_prelude as serenity;

const RECENT_LOG_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum Toggle {
    #[name = "on"]
    On,
    #[name = "off"]
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

/// Show protection status and the latest security events.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn security(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let dispatcher = &ctx.data().dispatcher;
    let policy = dispatcher.policies.policy(guild_id).await?;
    let entries = dispatcher.security_log.recent(guild_id, RECENT_LOG_LIMIT).await?;

    let on = tr(ctx, "security_on", &[]).await?;
    let off = tr(ctx, "security_off", &[]).await?;
    let mut embed = serenity::CreateEmbed::new()
        .title(tr(ctx, "security_title", &[]).await?)
        .color(0x3498DB);

    for (feature, key) in [
        (SecurityFeature::AntiNuke, "security_anti_nuke"),
        (SecurityFeature::AntiRaid, "security_anti_raid"),
        (SecurityFeature::AntiSpam, "security_anti_spam"),
        (SecurityFeature::AutoMod, "security_auto_mod"),
    ] {
        let state = if policy.is_enabled(feature) { &on } else { &off };
        embed = embed.field(tr(ctx, key, &[]).await?, state.clone(), true);
    }

    let logs = if entries.is_empty() {
        tr(ctx, "security_logs_empty", &[]).await?
    } else {
        entries
            .iter()
            .map(|entry| {
                let user = entry
                    .details
                    .get("user_id")
                    .and_then(|v| v.as_str())
                    .map(|id| format!(" <@{id}>"))
                    .unwrap_or_default();
                format!(
                    "<t:{}:R> `{}`{user}",
                    entry.timestamp.timestamp(),
                    entry.kind.as_str()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    embed = embed.field(tr(ctx, "security_logs", &[]).await?, logs, false);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

async fn set_feature(ctx: Context<'_>, feature: SecurityFeature, state: Toggle) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data()
        .dispatcher
        .policies
        .set_enabled(guild_id, feature, state.enabled())
        .await?;

    tracing::info!(guild_id, feature = %feature, enabled = state.enabled(), "Security feature toggled");
    let key = if state.enabled() { "feature_enabled" } else { "feature_disabled" };
    ctx.say(tr(ctx, key, &[("feature", feature.to_string())]).await?)
        .await?;
    Ok(())
}

/// Turn spam detection on or off.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn antispam(ctx: Context<'_>, #[description = "on or off"] state: Toggle) -> Result<(), Error> {
    set_feature(ctx, SecurityFeature::AntiSpam, state).await
}

/// Turn raid detection on or off.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn antiraid(ctx: Context<'_>, #[description = "on or off"] state: Toggle) -> Result<(), Error> {
    set_feature(ctx, SecurityFeature::AntiRaid, state).await
}

/// Turn nuke detection on or off.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn antinuke(ctx: Context<'_>, #[description = "on or off"] state: Toggle) -> Result<(), Error> {
    set_feature(ctx, SecurityFeature::AntiNuke, state).await
}

/// Turn content filtering on or off.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn automod(ctx: Context<'_>, #[description = "on or off"] state: Toggle) -> Result<(), Error> {
    set_feature(ctx, SecurityFeature::AutoMod, state).await
}

// ============================================================================
// WHITELISTS
// ============================================================================

/// Exempt members from detection.
#[poise::command(
    slash_command,
    subcommands("whitelist_add", "whitelist_remove"),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn whitelist(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

#[poise::command(slash_command, guild_only, rename = "add", required_permissions = "ADMINISTRATOR")]
pub async fn whitelist_add(ctx: Context<'_>, #[description = "Member to exempt"] user: serenity::User) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let changed = ctx
        .data()
        .dispatcher
        .policies
        .add_whitelist(guild_id, user.id.get())
        .await?;
    let key = if changed { "whitelist_added" } else { "whitelist_unchanged" };
    ctx.say(tr(ctx, key, &[("target", format!("<@{}>", user.id))]).await?)
        .await?;
    Ok(())
}

#[poise::command(slash_command, guild_only, rename = "remove", required_permissions = "ADMINISTRATOR")]
pub async fn whitelist_remove(
    ctx: Context<'_>,
    #[description = "Member to stop exempting"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let changed = ctx
        .data()
        .dispatcher
        .policies
        .remove_whitelist(guild_id, user.id.get())
        .await?;
    let key = if changed { "whitelist_removed" } else { "whitelist_unchanged" };
    ctx.say(tr(ctx, key, &[("target", format!("<@{}>", user.id))]).await?)
        .await?;
    Ok(())
}

/// Exempt channels from spam and content checks.
#[poise::command(
    slash_command,
    subcommands("whitelistchannel_add", "whitelistchannel_remove"),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn whitelistchannel(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

#[poise::command(slash_command, guild_only, rename = "add", required_permissions = "ADMINISTRATOR")]
pub async fn whitelistchannel_add(
    ctx: Context<'_>,
    #[description = "Channel to exempt"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let changed = ctx
        .data()
        .dispatcher
        .policies
        .add_channel_whitelist(guild_id, channel.id.get())
        .await?;
    let key = if changed { "whitelist_added" } else { "whitelist_unchanged" };
    ctx.say(tr(ctx, key, &[("target", format!("<#{}>", channel.id))]).await?)
        .await?;
    Ok(())
}

#[poise::command(slash_command, guild_only, rename = "remove", required_permissions = "ADMINISTRATOR")]
pub async fn whitelistchannel_remove(
    ctx: Context<'_>,
    #[description = "Channel to stop exempting"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let changed = ctx
        .data()
        .dispatcher
        .policies
        .remove_channel_whitelist(guild_id, channel.id.get())
        .await?;
    let key = if changed { "whitelist_removed" } else { "whitelist_unchanged" };
    ctx.say(tr(ctx, key, &[("target", format!("<#{}>", channel.id))]).await?)
        .await?;
    Ok(())
}

// ============================================================================
// BLACKLIST
// ============================================================================

/// Manage the guild's blocked words.
#[poise::command(
    slash_command,
    subcommands("blacklist_add", "blacklist_remove", "blacklist_list"),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn blacklist(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

#[poise::command(slash_command, guild_only, rename = "add", required_permissions = "ADMINISTRATOR")]
pub async fn blacklist_add(ctx: Context<'_>, #[description = "Word to block"] word: String) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    match ctx.data().dispatcher.policies.add_blacklist_word(guild_id, &word).await {
        Ok(_) => {
            let word = word.trim().to_lowercase();
            ctx.say(tr(ctx, "blacklist_added", &[("word", word)]).await?).await?;
        }
        Err(PolicyError::InvalidInput(detail)) => {
            ctx.say(tr(ctx, "error_invalid_input", &[("detail", detail)]).await?)
                .await?;
        }
        Err(PolicyError::Store(e)) => return Err(e.into()),
    }
    Ok(())
}

#[poise::command(slash_command, guild_only, rename = "remove", required_permissions = "ADMINISTRATOR")]
pub async fn blacklist_remove(
    ctx: Context<'_>,
    #[description = "Word to unblock"] word: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    match ctx
        .data()
        .dispatcher
        .policies
        .remove_blacklist_word(guild_id, &word)
        .await
    {
        Ok(removed) => {
            let key = if removed { "blacklist_removed" } else { "blacklist_missing" };
            let word = word.trim().to_lowercase();
            ctx.say(tr(ctx, key, &[("word", word)]).await?).await?;
        }
        Err(PolicyError::InvalidInput(detail)) => {
            ctx.say(tr(ctx, "error_invalid_input", &[("detail", detail)]).await?)
                .await?;
        }
        Err(PolicyError::Store(e)) => return Err(e.into()),
    }
    Ok(())
}

/// Words this guild added (the built-in list is not shown).
#[poise::command(slash_command, guild_only, rename = "list", required_permissions = "ADMINISTRATOR")]
pub async fn blacklist_list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let words = ctx.data().dispatcher.policies.policy(guild_id).await?.blacklist_words;

    if words.is_empty() {
        ctx.say(tr(ctx, "blacklist_empty", &[]).await?).await?;
        return Ok(());
    }

    let listing = words
        .iter()
        .map(|w| format!("`{w}`"))
        .collect::<Vec<_>>()
        .join(", ");
    let embed = serenity::CreateEmbed::new()
        .title(tr(ctx, "blacklist_title", &[]).await?)
        .description(listing)
        .color(0xE74C3C);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

// ============================================================================
// DM BLOCKS
// ============================================================================

/// Let a user message the bot again after a DM spam block.
#[poise::command(slash_command, owners_only)]
pub async fn dmunblock(ctx: Context<'_>, #[description = "Blocked user"] user: serenity::User) -> Result<(), Error> {
    let removed = ctx.data().dispatcher.dm_guard.unblock(user.id.get()).await?;
    let key = if removed { "dm_unblocked" } else { "dm_not_blocked" };
    ctx.say(tr(ctx, key, &[("user", format!("<@{}>", user.id))]).await?)
        .await?;
    Ok(())
}
