// Entry point of the security bot.
//
// **Architecture Overview:**
// - `core/` = detection engine and response orchestration (platform-agnostic)
// - `infra/` = storage implementations of core traits
// - `discord/` = serenity/poise adapters (events in, actions out, commands)
//
// This file's job is to:
// 1. Load configuration
// 2. Open the state store
// 3. Wire the dispatcher (dependency injection)
// 4. Set up the Discord framework

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::dispatch::{Dispatcher, EngineSettings, SecurityEvent};
use crate::core::localization::{Locale, TextCatalog};
use crate::core::tracking::SystemClock;
use crate::discord::security::events::handle_event;
use crate::discord::security::SerenityPlatform;
use crate::discord::{Data, Error};
use crate::infra::storage::SqliteStateStore;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Create the directory holding a file-backed sqlite database, if any.
fn ensure_database_dir(url: &str) -> anyhow::Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Rate-limit command invocations before poise runs them.
async fn command_guard(ctx: poise::Context<'_, Data, Error>) -> Result<bool, Error> {
    let event = SecurityEvent::CommandInvoked {
        guild_id: ctx.guild_id().map(|g| g.get()),
        channel_id: Some(ctx.channel_id().get()),
        user_id: ctx.author().id.get(),
        command_name: format!("/{}", ctx.command().qualified_name),
    };
    let outcome = ctx.data().dispatcher.dispatch(event).await;
    Ok(!outcome.is_acted())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::error!(command = %ctx.command().qualified_name, %error, "Command failed");
            let text = ctx.data().text(Locale::default(), "error_internal", &[]);
            if let Err(e) = ctx.send(poise::CreateReply::default().content(text).ephemeral(true)).await {
                tracing::warn!("Failed to report command error: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().context("configuration")?;
    tracing::info!(
        owners = config.owner_ids.len(),
        database = %config.database_url,
        "Configuration loaded"
    );

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    ensure_database_dir(&config.database_url)?;
    let store = Arc::new(
        SqliteStateStore::connect(&config.database_url)
            .await
            .context("failed to open state store")?,
    );
    let localizer = Arc::new(TextCatalog::new());
    let settings = EngineSettings {
        thresholds: config.thresholds.clone(),
        owner_ids: config.owner_ids.clone(),
        bot_user_id: None,
        call_timeout: config.action_timeout,
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MODERATION;

    let owners = config
        .owner_ids
        .iter()
        .map(|id| serenity::UserId::new(*id))
        .collect();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::all_commands(),
            owners,
            skip_checks_for_owners: true,
            command_check: Some(|ctx| Box::pin(command_guard(ctx))),
            event_handler: |ctx, event, _framework, data| Box::pin(handle_event(ctx, event, data)),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let bot_user_id = ready.user.id.get();
            Box::pin(async move {
                tracing::info!(user = %ready.user.name, "Bot is starting up");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                let platform = Arc::new(SerenityPlatform::new(ctx.http.clone()));
                let settings = EngineSettings {
                    bot_user_id: Some(bot_user_id),
                    ..settings
                };
                let dispatcher = Dispatcher::new(store, Arc::new(SystemClock), platform, localizer.clone(), settings);

                Ok(Data {
                    dispatcher: Arc::new(dispatcher),
                    localizer,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("error creating client")?;

    client.start().await.context("error running bot")?;
    Ok(())
}
