// Auto-moderation content filter - blacklist, invite links, then caps.
// Stateless per message: nothing is tracked.

use super::security_models::{InboundMessage, SecurityThresholds, Severity, Verdict, Violation};
use crate::core::policy::{GuildPolicyService, SecurityFeature};
use crate::core::storage::{StateStore, StoreError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static INVITE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(discord\.gg/\w+|discord(app)?\.com/invite/\w+)").unwrap());

pub struct AutoModFilter<S: StateStore> {
    policies: Arc<GuildPolicyService<S>>,
    thresholds: Arc<SecurityThresholds>,
}

impl<S: StateStore> AutoModFilter<S> {
    pub fn new(policies: Arc<GuildPolicyService<S>>, thresholds: Arc<SecurityThresholds>) -> Self {
        Self {
            policies,
            thresholds,
        }
    }

    pub async fn check(&self, message: &InboundMessage) -> Result<Option<Verdict>, StoreError> {
        if message.author_is_bot {
            return Ok(None);
        }

        let policy = self.policies.policy(message.guild_id).await?;
        if !policy.is_enabled(SecurityFeature::AutoMod)
            || policy.is_user_whitelisted(message.author_id)
            || policy.is_channel_whitelisted(message.channel_id)
        {
            return Ok(None);
        }

        let blacklist = self.policies.merged_blacklist(&policy);
        Ok(classify(&message.content, blacklist.iter(), &self.thresholds))
    }
}

/// Apply the content rules in order. First match wins.
pub fn classify<'a>(
    content: &str,
    blacklist: impl IntoIterator<Item = &'a String>,
    thresholds: &SecurityThresholds,
) -> Option<Verdict> {
    let lowered = content.to_lowercase();
    if let Some(word) = blacklist.into_iter().find(|word| lowered.contains(word.as_str())) {
        return Some(Verdict::new(
            Violation::BlacklistedWord { word: word.clone() },
            format!("Used blacklisted word: {word}"),
            Severity::High,
        ));
    }

    if INVITE_LINK.is_match(content) {
        return Some(Verdict::new(
            Violation::InviteLink,
            "Posted Discord invite link",
            Severity::Medium,
        ));
    }

    let length = content.chars().count();
    if length >= thresholds.caps_min_length {
        let caps = content.chars().filter(|c| c.is_uppercase()).count();
        let percent = (caps * 100 / length) as u32;
        if percent >= thresholds.caps_threshold_percent {
            return Some(Verdict::new(
                Violation::ExcessiveCaps { percent },
                format!("Message is {percent}% caps"),
                Severity::Low,
            ));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::Fixture;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    fn message(content: &str) -> InboundMessage {
        InboundMessage {
            guild_id: 1,
            guild_name: "Test Guild".to_string(),
            channel_id: 10,
            message_id: 100,
            author_id: 2,
            author_is_bot: false,
            content: content.to_string(),
            mentioned_user_ids: Vec::new(),
        }
    }

    #[test]
    fn test_blacklist_is_case_insensitive_substring() {
        let list = words(&["scam"]);
        let verdict = classify("Total SCAMMER here", &list, &SecurityThresholds::default()).unwrap();
        assert_eq!(
            verdict.violation,
            Violation::BlacklistedWord {
                word: "scam".to_string()
            }
        );
        assert_eq!(verdict.severity, Severity::High);
    }

    #[test]
    fn test_blacklist_beats_invite_and_caps() {
        let list = words(&["scam"]);
        let verdict = classify(
            "SCAM SCAM JOIN DISCORD.GG/ABCDEF",
            &list,
            &SecurityThresholds::default(),
        )
        .unwrap();
        assert_eq!(verdict.severity, Severity::High);
    }

    #[test]
    fn test_invite_links() {
        let thresholds = SecurityThresholds::default();
        for content in [
            "join discord.gg/abc123",
            "https://discord.com/invite/xyz",
            "old link discordapp.com/invite/foo",
        ] {
            let verdict = classify(content, &words(&[]), &thresholds).unwrap();
            assert_eq!(verdict.violation, Violation::InviteLink, "{content}");
            assert_eq!(verdict.severity, Severity::Medium);
        }
        assert!(classify("discord.com is a website", &words(&[]), &thresholds).is_none());
    }

    #[test]
    fn test_caps_ratio_counts_every_character() {
        let thresholds = SecurityThresholds::default();

        let verdict = classify("THIS IS LOUD", &words(&[]), &thresholds).unwrap();
        assert_eq!(verdict.violation, Violation::ExcessiveCaps { percent: 83 });
        assert_eq!(verdict.severity, Severity::Low);

        // Too short to judge.
        assert!(classify("HEY THERE", &words(&[]), &thresholds).is_none());
        // Spaces dilute the ratio below the threshold.
        assert!(classify("A B C D E F G", &words(&[]), &thresholds).is_none());
    }

    #[tokio::test]
    async fn test_uses_default_and_guild_blacklist() {
        let fixture = Fixture::new();
        assert!(fixture.automod.check(&message("you nazi")).await.unwrap().is_some());
        assert!(fixture.automod.check(&message("free nitro")).await.unwrap().is_none());

        fixture.policies.add_blacklist_word(1, "Nitro").await.unwrap();
        let verdict = fixture.automod.check(&message("free nitro")).await.unwrap().unwrap();
        assert_eq!(verdict.severity, Severity::High);
    }

    #[tokio::test]
    async fn test_skips_disabled_and_whitelisted() {
        let fixture = Fixture::new();
        fixture.policies.add_whitelist(1, 2).await.unwrap();
        assert!(fixture.automod.check(&message("nazi")).await.unwrap().is_none());

        fixture.policies.remove_whitelist(1, 2).await.unwrap();
        fixture
            .policies
            .set_enabled(1, SecurityFeature::AutoMod, false)
            .await
            .unwrap();
        assert!(fixture.automod.check(&message("nazi")).await.unwrap().is_none());
    }
}
