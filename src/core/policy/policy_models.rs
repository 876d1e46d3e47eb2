// Guild policy models.

use crate::core::localization::Locale;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

pub const DEFAULT_PREFIX: &str = "-";
pub const MAX_PREFIX_LEN: usize = 5;

/// Words every guild blocks in addition to its own list.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "nigga", "nigger", "nazi", "hitler", "faggot", "fag", "retard", "kys",
];

/// The four independently toggled protections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityFeature {
    AntiRaid,
    AntiSpam,
    AntiNuke,
    AutoMod,
}

impl SecurityFeature {
    pub const ALL: [SecurityFeature; 4] = [
        SecurityFeature::AntiNuke,
        SecurityFeature::AntiRaid,
        SecurityFeature::AntiSpam,
        SecurityFeature::AutoMod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityFeature::AntiRaid => "anti_raid",
            SecurityFeature::AntiSpam => "anti_spam",
            SecurityFeature::AntiNuke => "anti_nuke",
            SecurityFeature::AutoMod => "auto_mod",
        }
    }
}

impl std::fmt::Display for SecurityFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "anti_raid" | "antiraid" => Ok(SecurityFeature::AntiRaid),
            "anti_spam" | "antispam" => Ok(SecurityFeature::AntiSpam),
            "anti_nuke" | "antinuke" => Ok(SecurityFeature::AntiNuke),
            "auto_mod" | "automod" => Ok(SecurityFeature::AutoMod),
            other => Err(format!("unknown security feature: {other}")),
        }
    }
}

fn enabled() -> bool {
    true
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// Everything an administrator can configure for one guild.
///
/// Missing fields deserialize to their defaults so documents written by older
/// versions still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildPolicy {
    #[serde(default = "enabled")]
    pub anti_raid_enabled: bool,
    #[serde(default = "enabled")]
    pub anti_spam_enabled: bool,
    #[serde(default = "enabled")]
    pub anti_nuke_enabled: bool,
    #[serde(default = "enabled")]
    pub auto_mod_enabled: bool,
    #[serde(default)]
    pub whitelisted_users: BTreeSet<u64>,
    #[serde(default)]
    pub whitelisted_channels: BTreeSet<u64>,
    /// Guild-specific words only; always stored lower-case.
    #[serde(default)]
    pub blacklist_words: BTreeSet<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub log_channel_id: Option<u64>,
}

impl Default for GuildPolicy {
    fn default() -> Self {
        Self {
            anti_raid_enabled: true,
            anti_spam_enabled: true,
            anti_nuke_enabled: true,
            auto_mod_enabled: true,
            whitelisted_users: BTreeSet::new(),
            whitelisted_channels: BTreeSet::new(),
            blacklist_words: BTreeSet::new(),
            prefix: default_prefix(),
            locale: Locale::default(),
            log_channel_id: None,
        }
    }
}

impl GuildPolicy {
    pub fn is_enabled(&self, feature: SecurityFeature) -> bool {
        match feature {
            SecurityFeature::AntiRaid => self.anti_raid_enabled,
            SecurityFeature::AntiSpam => self.anti_spam_enabled,
            SecurityFeature::AntiNuke => self.anti_nuke_enabled,
            SecurityFeature::AutoMod => self.auto_mod_enabled,
        }
    }

    pub fn set_enabled(&mut self, feature: SecurityFeature, value: bool) {
        let flag = match feature {
            SecurityFeature::AntiRaid => &mut self.anti_raid_enabled,
            SecurityFeature::AntiSpam => &mut self.anti_spam_enabled,
            SecurityFeature::AntiNuke => &mut self.anti_nuke_enabled,
            SecurityFeature::AutoMod => &mut self.auto_mod_enabled,
        };
        *flag = value;
    }

    pub fn is_user_whitelisted(&self, user_id: u64) -> bool {
        self.whitelisted_users.contains(&user_id)
    }

    pub fn is_channel_whitelisted(&self, channel_id: u64) -> bool {
        self.whitelisted_channels.contains(&channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let policy = GuildPolicy::default();
        for feature in SecurityFeature::ALL {
            assert!(policy.is_enabled(feature));
        }
        assert_eq!(policy.prefix, "-");
        assert_eq!(policy.locale, Locale::En);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let policy: GuildPolicy =
            serde_json::from_str(r#"{ "anti_spam_enabled": false, "whitelisted_users": [5] }"#)
                .unwrap();

        assert!(!policy.anti_spam_enabled);
        assert!(policy.anti_raid_enabled);
        assert!(policy.is_user_whitelisted(5));
        assert_eq!(policy.prefix, "-");
    }

    #[test]
    fn test_feature_names_parse() {
        assert_eq!("antispam".parse::<SecurityFeature>(), Ok(SecurityFeature::AntiSpam));
        assert_eq!("anti-nuke".parse::<SecurityFeature>(), Ok(SecurityFeature::AntiNuke));
        assert_eq!("Auto_Mod".parse::<SecurityFeature>(), Ok(SecurityFeature::AutoMod));
        assert!("anti_everything".parse::<SecurityFeature>().is_err());
    }
}
