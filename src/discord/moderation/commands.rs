// Moderator commands: warnings, timeouts, kicks and bans.

use crate::core::localization::Locale;
use crate::core::moderation::{
    escalation_for, format_duration, ladder_message_key, parse_duration, Escalation, LADDER_TOP,
};
use crate::core::response::{ActionOutcome, ManualAction, ModeratorRequest, WarningTarget};
use crate::discord::{guild_locale, require_guild, tr, Context, Data, Error};
use poise::serenity_prelude as serenity;

/// Refuse actions against yourself or a bot. Returns false after replying.
async fn valid_target(ctx: Context<'_>, user: &serenity::User) -> Result<bool, Error> {
    let key = if user.id == ctx.author().id {
        "error_self_action"
    } else if user.bot {
        "error_bot_action"
    } else {
        return Ok(true);
    };
    ctx.send(
        poise::CreateReply::default()
            .content(tr(ctx, key, &[]).await?)
            .ephemeral(true),
    )
    .await?;
    Ok(false)
}

fn guild_name(ctx: Context<'_>) -> String {
    ctx.guild().map(|g| g.name.clone()).unwrap_or_default()
}

fn moderator_request(ctx: Context<'_>, guild_id: u64, user: &serenity::User, reason: String) -> ModeratorRequest {
    ModeratorRequest {
        guild_id,
        guild_name: guild_name(ctx),
        moderator_id: ctx.author().id.get(),
        moderator_name: ctx.author().name.clone(),
        user_id: user.id.get(),
        reason,
    }
}

/// Human description of a ladder step.
fn describe(data: &Data, locale: Locale, count: usize, escalation: Escalation) -> String {
    match escalation {
        Escalation::Notice => ladder_message_key(count)
            .map(|key| data.text(locale, &key, &[]))
            .unwrap_or_default(),
        Escalation::Timeout { minutes } => data.text(
            locale,
            "action_timeout",
            &[("duration", format_duration(minutes, locale))],
        ),
        Escalation::Kick => data.text(locale, "action_kicked", &[]),
        Escalation::Ban { .. } | Escalation::ExcessiveBan => data.text(locale, "action_banned", &[]),
    }
}

/// Localized failure message for a punitive step, if it failed.
fn failure_key(kind: &str, outcome: &ActionOutcome) -> Option<&'static str> {
    match outcome {
        ActionOutcome::Applied | ActionOutcome::AlreadyGone => None,
        ActionOutcome::PermissionDenied => Some(match kind {
            "kick" => "error_forbidden_kick",
            "ban" => "error_forbidden_ban",
            "unban" => "error_forbidden_unban",
            _ => "error_forbidden_timeout",
        }),
        ActionOutcome::Failed(_) => Some("error_action_failed"),
    }
}

/// Warn a member. Repeated warnings climb the escalation ladder.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] user: serenity::User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    if !valid_target(ctx, &user).await? {
        return Ok(());
    }

    let locale = guild_locale(ctx).await?;
    let reason = reason.unwrap_or_else(|| ctx.data().text(locale, "dm_no_reason", &[]));
    let target = WarningTarget {
        guild_id,
        guild_name: guild_name(ctx),
        user_id: user.id.get(),
        channel_id: Some(ctx.channel_id().get()),
    };

    ctx.defer_ephemeral().await?;
    let report = ctx
        .data()
        .dispatcher
        .responder
        .apply_warning(&target, &reason, false)
        .await?;

    tracing::info!(
        guild_id,
        user_id = target.user_id,
        moderator_id = ctx.author().id.get(),
        count = report.warning.count,
        "Manual warning issued"
    );
    ctx.data()
        .dispatcher
        .responder
        .moderate(
            &moderator_request(ctx, guild_id, &user, reason),
            ManualAction::Warn {
                count: report.warning.count,
            },
        )
        .await;

    let mut reply = format!(
        "{}: {}/{LADDER_TOP}",
        ctx.data().text(locale, "warning_count", &[]),
        report.warning.count
    );
    if let Some(action) = &report.action {
        let kind = match report.warning.escalation {
            Escalation::Kick => "kick",
            Escalation::Ban { .. } | Escalation::ExcessiveBan => "ban",
            _ => "timeout",
        };
        if let Some(key) = failure_key(kind, action) {
            reply.push('\n');
            reply.push_str(&ctx.data().text(locale, key, &[]));
        }
    }
    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Show a member's warnings and what the next one will do.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warnings(ctx: Context<'_>, #[description = "Member to check"] user: serenity::User) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let locale = guild_locale(ctx).await?;
    let data = ctx.data();
    let records = data.dispatcher.warnings.warnings(guild_id, user.id.get()).await?;
    let mention = format!("<@{}>", user.id);

    if records.is_empty() {
        ctx.say(data.text(locale, "warning_none", &[("user", mention)]))
            .await?;
        return Ok(());
    }

    let count = records.len();
    let history = records
        .iter()
        .rev()
        .take(10)
        .map(|r| format!("**#{}** <t:{}:R> {}", r.count, r.timestamp.timestamp(), r.reason))
        .collect::<Vec<_>>()
        .join("\n");
    let next = describe(data, locale, count + 1, escalation_for(count + 1));

    let embed = serenity::CreateEmbed::new()
        .title(data.text(locale, "warning_stats", &[]))
        .color(0xF1C40F)
        .field(data.text(locale, "warning_member", &[]), mention, true)
        .field(
            data.text(locale, "warning_count", &[]),
            format!("{count}/{LADDER_TOP}"),
            true,
        )
        .field(data.text(locale, "warning_next", &[]), next, false)
        .field(data.text(locale, "warning_reason", &[]), history, false);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Remove every warning a member has.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn clearwarns(ctx: Context<'_>, #[description = "Member to clear"] user: serenity::User) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let data = ctx.data();
    let cleared = data.dispatcher.warnings.clear_warnings(guild_id, user.id.get()).await?;
    if cleared {
        let locale = guild_locale(ctx).await?;
        let reason = data.text(locale, "dm_no_reason", &[]);
        data.dispatcher
            .responder
            .moderate(&moderator_request(ctx, guild_id, &user, reason), ManualAction::ClearWarnings)
            .await;
    }
    let key = if cleared { "warning_cleared" } else { "warning_none" };
    ctx.say(tr(ctx, key, &[("user", format!("<@{}>", user.id))]).await?)
        .await?;
    Ok(())
}

/// Time out a member, e.g. `10m`, `2h30m`, `1d`.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "Member to time out"] user: serenity::User,
    #[description = "Duration (5m, 1h, 2h30m, 1d)"] duration: String,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    if !valid_target(ctx, &user).await? {
        return Ok(());
    }
    let locale = guild_locale(ctx).await?;

    let minutes = match parse_duration(&duration) {
        Ok(minutes) => minutes,
        Err(_) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(tr(ctx, "error_invalid_time", &[]).await?)
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };

    let reason = reason.unwrap_or_else(|| ctx.data().text(locale, "dm_no_reason", &[]));
    ctx.defer().await?;
    let outcome = ctx
        .data()
        .dispatcher
        .responder
        .moderate(
            &moderator_request(ctx, guild_id, &user, reason),
            ManualAction::Timeout { minutes },
        )
        .await;

    let reply = match failure_key("timeout", &outcome) {
        Some(key) => ctx.data().text(locale, key, &[]),
        None => ctx.data().text(
            locale,
            "timeout_success",
            &[
                ("user", format!("<@{}>", user.id)),
                ("duration", format_duration(minutes, locale)),
            ],
        ),
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Lift a member's timeout.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn untimeout(ctx: Context<'_>, #[description = "Member to release"] user: serenity::User) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let reason = tr(ctx, "dm_no_reason", &[]).await?;
    let outcome = ctx
        .data()
        .dispatcher
        .responder
        .moderate(&moderator_request(ctx, guild_id, &user, reason), ManualAction::RemoveTimeout)
        .await;

    let key = failure_key("timeout", &outcome).unwrap_or("untimeout_success");
    ctx.say(tr(ctx, key, &[("user", format!("<@{}>", user.id))]).await?)
        .await?;
    Ok(())
}

/// Kick or ban after messaging the member, then report the result.
async fn remove_member(
    ctx: Context<'_>,
    user: serenity::User,
    reason: Option<String>,
    action: ManualAction,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    if !valid_target(ctx, &user).await? {
        return Ok(());
    }
    let locale = guild_locale(ctx).await?;
    let reason = reason.unwrap_or_else(|| ctx.data().text(locale, "dm_no_reason", &[]));
    let (kind, success_key) = match action {
        ManualAction::Ban => ("ban", "ban_success"),
        _ => ("kick", "kick_success"),
    };

    ctx.defer().await?;
    let outcome = ctx
        .data()
        .dispatcher
        .responder
        .moderate(&moderator_request(ctx, guild_id, &user, reason), action)
        .await;

    let key = failure_key(kind, &outcome).unwrap_or(success_key);
    ctx.say(ctx.data().text(locale, key, &[("user", format!("<@{}>", user.id))]))
        .await?;
    Ok(())
}

/// Kick a member. They are told why before they are removed.
#[poise::command(slash_command, guild_only, required_permissions = "KICK_MEMBERS")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] user: serenity::User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    remove_member(ctx, user, reason, ManualAction::Kick).await
}

/// Ban a member. They are told why before they are removed.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member to ban"] user: serenity::User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    remove_member(ctx, user, reason, ManualAction::Ban).await
}

/// Lift a ban by user.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "User to unban (ID works too)"] user: serenity::User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let locale = guild_locale(ctx).await?;
    let reason = reason.unwrap_or_else(|| ctx.data().text(locale, "dm_no_reason", &[]));
    let outcome = ctx
        .data()
        .dispatcher
        .responder
        .moderate(&moderator_request(ctx, guild_id, &user, reason), ManualAction::Unban)
        .await;

    let key = match outcome {
        ActionOutcome::AlreadyGone => "error_not_banned",
        ref other => failure_key("unban", other).unwrap_or("unban_success"),
    };
    ctx.say(ctx.data().text(locale, key, &[("user", format!("<@{}>", user.id))]))
        .await?;
    Ok(())
}
