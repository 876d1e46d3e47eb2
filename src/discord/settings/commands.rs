// Guild settings commands: language, security log channel, message prefix.

use crate::core::localization::Locale;
use crate::core::policy::PolicyError;
use crate::discord::{require_guild, tr, Context, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum LanguageChoice {
    #[name = "English"]
    English,
    #[name = "Tiếng Việt"]
    Vietnamese,
}

impl From<LanguageChoice> for Locale {
    fn from(choice: LanguageChoice) -> Self {
        match choice {
            LanguageChoice::English => Locale::En,
            LanguageChoice::Vietnamese => Locale::Vi,
        }
    }
}

/// Change the language the bot uses in this server.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn language(ctx: Context<'_>, #[description = "Language"] language: LanguageChoice) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let locale = Locale::from(language);
    ctx.data().dispatcher.policies.set_locale(guild_id, locale).await?;

    // Reply in the new language.
    let reply = ctx.data().text(
        locale,
        "language_changed",
        &[("language", locale.display_name().to_string())],
    );
    ctx.say(reply).await?;
    Ok(())
}

/// Show, set or clear the security log channel.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn logchannel(
    ctx: Context<'_>,
    #[description = "Channel for security alerts"] channel: Option<serenity::GuildChannel>,
    #[description = "Stop using a dedicated channel"] clear: Option<bool>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let policies = &ctx.data().dispatcher.policies;

    if clear.unwrap_or(false) {
        policies.set_log_channel(guild_id, None).await?;
        ctx.say(tr(ctx, "logchannel_cleared", &[]).await?).await?;
        return Ok(());
    }

    let reply = match channel {
        Some(channel) => {
            policies.set_log_channel(guild_id, Some(channel.id.get())).await?;
            tr(ctx, "logchannel_set", &[("channel", format!("<#{}>", channel.id))]).await?
        }
        None => match policies.policy(guild_id).await?.log_channel_id {
            Some(id) => tr(ctx, "logchannel_current", &[("channel", format!("<#{id}>"))]).await?,
            None => tr(ctx, "logchannel_none", &[]).await?,
        },
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Change the prefix for text commands (at most 5 characters).
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn prefix(ctx: Context<'_>, #[description = "New prefix"] prefix: String) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let reply = match ctx.data().dispatcher.policies.set_prefix(guild_id, &prefix).await {
        Ok(()) => tr(ctx, "prefix_changed", &[("prefix", prefix.trim().to_string())]).await?,
        Err(PolicyError::InvalidInput(_)) => tr(ctx, "error_prefix_long", &[]).await?,
        Err(PolicyError::Store(e)) => return Err(e.into()),
    };
    ctx.say(reply).await?;
    Ok(())
}
