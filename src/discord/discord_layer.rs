// Discord layer - gateway events in, platform actions out, slash commands.
//
// Commands stay thin: extract primitives, call a core service, render the
// result in the guild's language.

#[path = "security/mod.rs"]
pub mod security;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "settings/commands.rs"]
pub mod settings;

use crate::core::dispatch::Dispatcher;
use crate::core::localization::{Locale, Localizer, TextCatalog};
use crate::infra::storage::SqliteStateStore;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared state handed to every command and event handler.
pub struct Data {
    pub dispatcher: Arc<Dispatcher<SqliteStateStore>>,
    pub localizer: Arc<TextCatalog>,
}

impl Data {
    pub fn text(&self, locale: Locale, key: &str, substitutions: &[(&str, String)]) -> String {
        self.localizer.resolve(locale, key, substitutions)
    }
}

/// Language of the guild the command runs in (English outside guilds).
pub async fn guild_locale(ctx: Context<'_>) -> Result<Locale, Error> {
    match ctx.guild_id() {
        Some(guild_id) => Ok(ctx.data().dispatcher.policies.locale(guild_id.get()).await?),
        None => Ok(Locale::default()),
    }
}

/// Localized text for the invoking guild.
pub async fn tr(ctx: Context<'_>, key: &str, substitutions: &[(&str, String)]) -> Result<String, Error> {
    let locale = guild_locale(ctx).await?;
    Ok(ctx.data().text(locale, key, substitutions))
}

pub fn require_guild(ctx: Context<'_>) -> Result<u64, Error> {
    Ok(ctx.guild_id().ok_or("This command only works in servers")?.get())
}

/// Every slash command the bot registers.
pub fn all_commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        security::commands::security(),
        security::commands::antispam(),
        security::commands::antiraid(),
        security::commands::antinuke(),
        security::commands::automod(),
        security::commands::whitelist(),
        security::commands::whitelistchannel(),
        security::commands::blacklist(),
        security::commands::dmunblock(),
        moderation::commands::warn(),
        moderation::commands::warnings(),
        moderation::commands::clearwarns(),
        moderation::commands::timeout(),
        moderation::commands::untimeout(),
        moderation::commands::kick(),
        moderation::commands::ban(),
        moderation::commands::unban(),
        settings::language(),
        settings::logchannel(),
        settings::prefix(),
    ]
}
