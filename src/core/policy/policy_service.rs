// Guild policy service - lazily created per-guild settings over the state store.
//
// Every mutator persists before returning so a crash never loses an
// acknowledged change.

use super::policy_models::{GuildPolicy, SecurityFeature, DEFAULT_BLACKLIST, MAX_PREFIX_LEN};
use crate::core::localization::Locale;
use crate::core::storage::{keys, load_json, save_json, KeyedLocks, StateStore, StoreError};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct GuildPolicyService<S: StateStore> {
    store: Arc<S>,
    locks: KeyedLocks<u64>,
    default_blacklist: BTreeSet<String>,
}

impl<S: StateStore> GuildPolicyService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_default_blacklist(store, DEFAULT_BLACKLIST.iter().map(|w| w.to_string()))
    }

    pub fn with_default_blacklist(store: Arc<S>, words: impl IntoIterator<Item = String>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            default_blacklist: words.into_iter().map(|w| w.trim().to_lowercase()).collect(),
        }
    }

    /// Current policy, or defaults if the guild never changed anything.
    pub async fn policy(&self, guild_id: u64) -> Result<GuildPolicy, StoreError> {
        Ok(load_json(&*self.store, &keys::policy(guild_id))
            .await?
            .unwrap_or_default())
    }

    /// Apply `change` under the guild's lock and persist the result.
    async fn update<R>(
        &self,
        guild_id: u64,
        change: impl FnOnce(&mut GuildPolicy) -> R,
    ) -> Result<R, StoreError> {
        let _guard = self.locks.lock(&guild_id).await;
        let mut policy = self.policy(guild_id).await?;
        let result = change(&mut policy);
        save_json(&*self.store, &keys::policy(guild_id), &policy).await?;
        Ok(result)
    }

    pub async fn is_enabled(&self, guild_id: u64, feature: SecurityFeature) -> Result<bool, StoreError> {
        Ok(self.policy(guild_id).await?.is_enabled(feature))
    }

    pub async fn set_enabled(
        &self,
        guild_id: u64,
        feature: SecurityFeature,
        value: bool,
    ) -> Result<(), StoreError> {
        tracing::info!(guild_id, feature = %feature, value, "Security feature toggled");
        self.update(guild_id, |policy| policy.set_enabled(feature, value))
            .await
    }

    pub async fn is_whitelisted(&self, guild_id: u64, user_id: u64) -> Result<bool, StoreError> {
        Ok(self.policy(guild_id).await?.is_user_whitelisted(user_id))
    }

    /// Returns `false` if the user was already whitelisted.
    pub async fn add_whitelist(&self, guild_id: u64, user_id: u64) -> Result<bool, StoreError> {
        self.update(guild_id, |policy| policy.whitelisted_users.insert(user_id))
            .await
    }

    pub async fn remove_whitelist(&self, guild_id: u64, user_id: u64) -> Result<bool, StoreError> {
        self.update(guild_id, |policy| policy.whitelisted_users.remove(&user_id))
            .await
    }

    pub async fn is_channel_whitelisted(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<bool, StoreError> {
        Ok(self.policy(guild_id).await?.is_channel_whitelisted(channel_id))
    }

    pub async fn add_channel_whitelist(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<bool, StoreError> {
        self.update(guild_id, |policy| policy.whitelisted_channels.insert(channel_id))
            .await
    }

    pub async fn remove_channel_whitelist(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<bool, StoreError> {
        self.update(guild_id, |policy| policy.whitelisted_channels.remove(&channel_id))
            .await
    }

    /// Global defaults merged with the guild's own words, lower-cased.
    pub async fn blacklist(&self, guild_id: u64) -> Result<BTreeSet<String>, StoreError> {
        let policy = self.policy(guild_id).await?;
        Ok(self.merged_blacklist(&policy))
    }

    pub fn merged_blacklist(&self, policy: &GuildPolicy) -> BTreeSet<String> {
        self.default_blacklist
            .iter()
            .cloned()
            .chain(policy.blacklist_words.iter().map(|w| w.to_lowercase()))
            .collect()
    }

    pub async fn add_blacklist_word(&self, guild_id: u64, word: &str) -> Result<bool, PolicyError> {
        let word = normalize_word(word)?;
        Ok(self
            .update(guild_id, |policy| policy.blacklist_words.insert(word))
            .await?)
    }

    pub async fn remove_blacklist_word(&self, guild_id: u64, word: &str) -> Result<bool, PolicyError> {
        let word = normalize_word(word)?;
        Ok(self
            .update(guild_id, |policy| policy.blacklist_words.remove(&word))
            .await?)
    }

    pub async fn set_prefix(&self, guild_id: u64, prefix: &str) -> Result<(), PolicyError> {
        let prefix = prefix.trim();
        if prefix.is_empty() || prefix.chars().count() > MAX_PREFIX_LEN {
            return Err(PolicyError::InvalidInput(format!(
                "prefix must be 1-{MAX_PREFIX_LEN} characters"
            )));
        }
        let prefix = prefix.to_string();
        Ok(self.update(guild_id, |policy| policy.prefix = prefix).await?)
    }

    pub async fn locale(&self, guild_id: u64) -> Result<Locale, StoreError> {
        Ok(self.policy(guild_id).await?.locale)
    }

    pub async fn set_locale(&self, guild_id: u64, locale: Locale) -> Result<(), StoreError> {
        self.update(guild_id, |policy| policy.locale = locale).await
    }

    pub async fn set_log_channel(&self, guild_id: u64, channel_id: Option<u64>) -> Result<(), StoreError> {
        self.update(guild_id, |policy| policy.log_channel_id = channel_id)
            .await
    }
}

fn normalize_word(word: &str) -> Result<String, PolicyError> {
    let word = word.trim().to_lowercase();
    if word.is_empty() {
        return Err(PolicyError::InvalidInput("blacklist word is empty".to_string()));
    }
    Ok(word)
}
