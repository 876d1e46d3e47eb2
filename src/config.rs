// Process configuration read from the environment (and `.env` via dotenv).
//
// Every detector threshold can be overridden with a `SENTINEL_*` variable;
// anything unset keeps the default from `SecurityThresholds`.

use crate::core::security::SecurityThresholds;
use crate::core::tracking::TrackKind;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/sentinel.db?mode=rwc";
const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 10;

/// Longest detection window, one day.
const MAX_WINDOW_SECS: i64 = 86_400;
/// Discord caps member timeouts at 28 days.
const MAX_TIMEOUT_DAYS: i64 = 28;
const MAX_ACTION_TIMEOUT_SECS: u64 = 300;
const MAX_ACCOUNT_AGE_DAYS: i64 = 3_650;
/// Longest message Discord accepts.
const MAX_MESSAGE_LENGTH: usize = 2_000;
const MAX_MENTIONS: usize = 100;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub owner_ids: BTreeSet<u64>,
    pub database_url: String,
    pub action_timeout: Duration,
    pub thresholds: SecurityThresholds,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any name → value lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let owner_ids = match lookup("BOT_OWNER_IDS") {
            Some(raw) => parse_id_list("BOT_OWNER_IDS", &raw)?,
            None => match lookup("OWNER_ID") {
                Some(raw) => parse_id_list("OWNER_ID", &raw)?,
                None => BTreeSet::new(),
            },
        };

        let database_url = lookup("SENTINEL_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let mut timeout_secs = DEFAULT_ACTION_TIMEOUT_SECS;
        override_within(
            &lookup,
            "SENTINEL_ACTION_TIMEOUT_SECS",
            &mut timeout_secs,
            1..=MAX_ACTION_TIMEOUT_SECS,
        )?;

        Ok(Self {
            discord_token,
            owner_ids,
            database_url,
            action_timeout: Duration::from_secs(timeout_secs),
            thresholds: thresholds_from(&lookup)?,
        })
    }
}

fn parse_id_list(name: &'static str, raw: &str) -> Result<BTreeSet<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name,
                value: part.to_string(),
            })
        })
        .collect()
}

fn parsed<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

fn override_with<T, F>(lookup: &F, name: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = parsed(lookup, name)? {
        *target = value;
    }
    Ok(())
}

/// Like `override_with`, but the value must fall inside `range`.
fn override_within<T, F>(
    lookup: &F,
    name: &'static str,
    target: &mut T,
    range: RangeInclusive<T>,
) -> Result<(), ConfigError>
where
    T: FromStr + PartialOrd + Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = parsed::<T, F>(lookup, name)? {
        if !range.contains(&value) {
            return Err(ConfigError::Invalid {
                name,
                value: value.to_string(),
            });
        }
        *target = value;
    }
    Ok(())
}

fn thresholds_from<F>(lookup: &F) -> Result<SecurityThresholds, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut t = SecurityThresholds::default();
    let windows = 1..=MAX_WINDOW_SECS;
    // A count above the retention cap could never be observed.
    let messages = 1..=TrackKind::Message.retention();
    let joins = 1..=TrackKind::Join.retention();
    let actions = 1..=TrackKind::ModerationAction.retention();
    let commands = 1..=TrackKind::Command.retention();

    override_within(lookup, "SENTINEL_SPAM_MESSAGE_THRESHOLD", &mut t.spam_message_threshold, messages.clone())?;
    override_within(lookup, "SENTINEL_SPAM_WINDOW_SECS", &mut t.spam_window_secs, windows.clone())?;
    override_within(
        lookup,
        "SENTINEL_SPAM_MENTION_THRESHOLD",
        &mut t.spam_mention_threshold,
        1..=MAX_MENTIONS,
    )?;
    // One identical message is not a run.
    override_within(
        lookup,
        "SENTINEL_SPAM_DUPLICATE_THRESHOLD",
        &mut t.spam_duplicate_threshold,
        2..=TrackKind::Message.retention(),
    )?;
    override_within(lookup, "SENTINEL_RAID_JOIN_THRESHOLD", &mut t.raid_join_threshold, joins)?;
    override_within(lookup, "SENTINEL_RAID_WINDOW_SECS", &mut t.raid_window_secs, windows.clone())?;
    override_within(
        lookup,
        "SENTINEL_RAID_MIN_ACCOUNT_AGE_DAYS",
        &mut t.raid_min_account_age_days,
        0..=MAX_ACCOUNT_AGE_DAYS,
    )?;
    override_within(lookup, "SENTINEL_NUKE_BAN_THRESHOLD", &mut t.nuke_ban_threshold, actions.clone())?;
    override_within(lookup, "SENTINEL_NUKE_KICK_THRESHOLD", &mut t.nuke_kick_threshold, actions.clone())?;
    override_within(
        lookup,
        "SENTINEL_NUKE_CHANNEL_DELETE_THRESHOLD",
        &mut t.nuke_channel_delete_threshold,
        actions.clone(),
    )?;
    override_within(
        lookup,
        "SENTINEL_NUKE_ROLE_DELETE_THRESHOLD",
        &mut t.nuke_role_delete_threshold,
        actions,
    )?;
    override_within(lookup, "SENTINEL_NUKE_WINDOW_SECS", &mut t.nuke_window_secs, windows.clone())?;
    override_with(lookup, "SENTINEL_NUKE_RESET_ON_TRIGGER", &mut t.nuke_reset_on_trigger)?;
    override_within(lookup, "SENTINEL_CAPS_THRESHOLD_PERCENT", &mut t.caps_threshold_percent, 1..=100)?;
    override_within(
        lookup,
        "SENTINEL_CAPS_MIN_LENGTH",
        &mut t.caps_min_length,
        1..=MAX_MESSAGE_LENGTH,
    )?;
    override_within(lookup, "SENTINEL_DM_SPAM_THRESHOLD", &mut t.dm_spam_threshold, messages)?;
    override_within(lookup, "SENTINEL_DM_SPAM_WINDOW_SECS", &mut t.dm_spam_window_secs, windows.clone())?;
    override_within(lookup, "SENTINEL_COMMAND_SPAM_THRESHOLD", &mut t.command_spam_threshold, commands)?;
    override_within(
        lookup,
        "SENTINEL_COMMAND_SPAM_WINDOW_SECS",
        &mut t.command_spam_window_secs,
        windows,
    )?;
    override_within(lookup, "SENTINEL_AUTO_MUTE_DAYS", &mut t.auto_mute_days, 1..=MAX_TIMEOUT_DAYS)?;
    override_within(lookup, "SENTINEL_NUKE_TIMEOUT_DAYS", &mut t.nuke_timeout_days, 1..=MAX_TIMEOUT_DAYS)?;

    Ok(t)
}
