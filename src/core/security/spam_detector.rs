// Spam detector - mention, frequency and duplicate rules over the author's
// message window. Rules run in that fixed order and the first match wins.

use super::security_models::{InboundMessage, SecurityThresholds, Severity, Verdict, Violation};
use crate::core::policy::{GuildPolicyService, SecurityFeature};
use crate::core::storage::{StateStore, StoreError};
use crate::core::tracking::{count_since, Sample, TrackKey, WindowTracker};
use chrono::Duration;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct SpamDetector<S: StateStore> {
    policies: Arc<GuildPolicyService<S>>,
    tracker: Arc<WindowTracker<S>>,
    thresholds: Arc<SecurityThresholds>,
}

impl<S: StateStore> SpamDetector<S> {
    pub fn new(
        policies: Arc<GuildPolicyService<S>>,
        tracker: Arc<WindowTracker<S>>,
        thresholds: Arc<SecurityThresholds>,
    ) -> Self {
        Self {
            policies,
            tracker,
            thresholds,
        }
    }

    /// Track the message and classify it. Skipped messages are not tracked.
    pub async fn check(&self, message: &InboundMessage) -> Result<Option<Verdict>, StoreError> {
        if message.author_is_bot {
            return Ok(None);
        }

        let policy = self.policies.policy(message.guild_id).await?;
        if !policy.is_enabled(SecurityFeature::AntiSpam)
            || policy.is_user_whitelisted(message.author_id)
            || policy.is_channel_whitelisted(message.channel_id)
        {
            return Ok(None);
        }

        let events = self
            .tracker
            .track(
                TrackKey::messages(message.guild_id, message.author_id),
                Sample::Message {
                    content: message.content.clone(),
                },
            )
            .await?;

        let mentions = message
            .mentioned_user_ids
            .iter()
            .collect::<BTreeSet<_>>()
            .len();
        if mentions >= self.thresholds.spam_mention_threshold {
            return Ok(Some(Verdict::new(
                Violation::MentionSpam { mentions },
                format!("Mentioned {mentions} users in one message"),
                Severity::High,
            )));
        }

        let window = self.thresholds.spam_window_secs;
        let cutoff = self.tracker.now() - Duration::seconds(window);
        let messages = count_since(&events, cutoff, |_| true);
        if messages >= self.thresholds.spam_message_threshold {
            return Ok(Some(Verdict::new(
                Violation::MessageSpam {
                    messages,
                    window_secs: window,
                },
                format!("Sent {messages} messages in {window} seconds"),
                Severity::Medium,
            )));
        }

        let repeats = self.thresholds.spam_duplicate_threshold;
        if repeats > 0 && events.len() >= repeats {
            let last = &events[events.len() - repeats..];
            let all_same = last
                .iter()
                .all(|event| event.content() == Some(message.content.as_str()));
            if all_same {
                return Ok(Some(Verdict::new(
                    Violation::DuplicateSpam { repeats },
                    format!("Repeated the same message {repeats} times"),
                    Severity::Medium,
                )));
            }
        }

        Ok(None)
    }

    /// Forget the author's history so already-punished messages do not count again.
    pub async fn clear_window(&self, guild_id: u64, user_id: u64) -> Result<bool, StoreError> {
        self.tracker.clear(TrackKey::messages(guild_id, user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{Fixture, ManualClock};

    fn message(author_id: u64, content: &str) -> InboundMessage {
        InboundMessage {
            guild_id: 1,
            guild_name: "Test Guild".to_string(),
            channel_id: 10,
            message_id: 100,
            author_id,
            author_is_bot: false,
            content: content.to_string(),
            mentioned_user_ids: Vec::new(),
        }
    }

    async fn send(fixture: &Fixture, clock: &ManualClock, msg: &InboundMessage, gap_ms: i64) -> Option<Verdict> {
        clock.advance(Duration::milliseconds(gap_ms));
        fixture.spam.check(msg).await.unwrap()
    }

    #[tokio::test]
    async fn test_fifth_message_within_window_is_frequency_spam() {
        let fixture = Fixture::new();
        let words = ["one", "two", "three", "four", "five"];

        for (i, word) in words.iter().enumerate() {
            let verdict = send(&fixture, &fixture.clock, &message(2, word), 600).await;
            if i < 4 {
                assert!(verdict.is_none(), "message {} flagged", i + 1);
            } else {
                let verdict = verdict.expect("fifth message should be spam");
                assert!(matches!(verdict.violation, Violation::MessageSpam { messages: 5, .. }));
                assert_eq!(verdict.severity, Severity::Medium);
            }
        }
    }

    #[tokio::test]
    async fn test_slow_messages_are_not_spam() {
        let fixture = Fixture::new();
        for i in 0..8 {
            let verdict = send(&fixture, &fixture.clock, &message(2, &format!("msg {i}")), 2_000).await;
            assert!(verdict.is_none());
        }
    }

    #[tokio::test]
    async fn test_mention_rule_wins_over_everything() {
        let fixture = Fixture::new();
        let mut msg = message(2, "HELLO EVERYONE LOOK AT THIS");
        msg.mentioned_user_ids = vec![11, 12, 13, 14, 15, 16];

        let verdict = fixture.spam.check(&msg).await.unwrap().unwrap();
        assert_eq!(verdict.violation, Violation::MentionSpam { mentions: 6 });
        assert_eq!(verdict.severity, Severity::High);
    }

    #[tokio::test]
    async fn test_repeated_mentions_of_one_user_count_once() {
        let fixture = Fixture::new();
        let mut msg = message(2, "hey");
        msg.mentioned_user_ids = vec![11, 11, 11, 11, 11];

        assert!(fixture.spam.check(&msg).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_third_identical_message_is_duplicate_spam() {
        let fixture = Fixture::new();
        let msg = message(2, "buy my stuff");

        assert!(send(&fixture, &fixture.clock, &msg, 3_000).await.is_none());
        assert!(send(&fixture, &fixture.clock, &msg, 3_000).await.is_none());
        let verdict = send(&fixture, &fixture.clock, &msg, 3_000).await.unwrap();
        assert_eq!(verdict.violation, Violation::DuplicateSpam { repeats: 3 });
    }

    #[tokio::test]
    async fn test_different_last_message_breaks_duplicate_run() {
        let fixture = Fixture::new();
        send(&fixture, &fixture.clock, &message(2, "same"), 3_000).await;
        send(&fixture, &fixture.clock, &message(2, "same"), 3_000).await;
        let verdict = send(&fixture, &fixture.clock, &message(2, "different"), 3_000).await;
        assert!(verdict.is_none());
    }

    #[tokio::test]
    async fn test_skips_bots_whitelist_and_disabled_without_tracking() {
        let fixture = Fixture::new();

        let mut bot = message(3, "beep");
        bot.author_is_bot = true;
        bot.mentioned_user_ids = vec![1, 2, 3, 4, 5, 6];
        assert!(fixture.spam.check(&bot).await.unwrap().is_none());

        fixture.policies.add_whitelist(1, 4).await.unwrap();
        let mut whitelisted = message(4, "hi");
        whitelisted.mentioned_user_ids = vec![1, 2, 3, 4, 5, 6];
        assert!(fixture.spam.check(&whitelisted).await.unwrap().is_none());

        fixture.policies.add_channel_whitelist(1, 10).await.unwrap();
        let mut in_whitelisted_channel = message(5, "hi");
        in_whitelisted_channel.mentioned_user_ids = vec![1, 2, 3, 4, 5, 6];
        assert!(fixture.spam.check(&in_whitelisted_channel).await.unwrap().is_none());

        fixture
            .policies
            .set_enabled(1, SecurityFeature::AntiSpam, false)
            .await
            .unwrap();
        let mut disabled = message(6, "hi");
        disabled.channel_id = 11;
        disabled.mentioned_user_ids = vec![1, 2, 3, 4, 5, 6];
        assert!(fixture.spam.check(&disabled).await.unwrap().is_none());

        for user in [3, 4, 5, 6] {
            let history = fixture.tracker.history(TrackKey::messages(1, user)).await.unwrap();
            assert!(history.is_empty());
        }
    }

    #[tokio::test]
    async fn test_clear_window_resets_frequency_count() {
        let fixture = Fixture::new();
        for i in 0..4 {
            send(&fixture, &fixture.clock, &message(2, &i.to_string()), 100).await;
        }
        assert!(fixture.spam.clear_window(1, 2).await.unwrap());

        let verdict = send(&fixture, &fixture.clock, &message(2, "next"), 100).await;
        assert!(verdict.is_none());
    }
}
