// Event dispatcher - routes platform events to detectors and verdicts to the
// responder.
//
// The dispatcher is the error boundary: store failures are logged here and
// reported as `DispatchOutcome::Failed`, never propagated to the gateway loop.

use crate::core::localization::Localizer;
use crate::core::moderation::WarningEngine;
use crate::core::policy::GuildPolicyService;
use crate::core::response::{PlatformActions, ResponseExecutor, ResponseReport, SecurityResponder};
use crate::core::security::{
    AutoModFilter, CommandGuard, DmCheck, DmGuard, InboundJoin, InboundMessage, InboundModAction, NukeDetector,
    RaidDetector, SecurityLog, SecurityThresholds, SpamDetector, Verdict,
};
use crate::core::storage::{StateStore, StoreError};
use crate::core::tracking::{Clock, ModerationActionKind, WindowTracker};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Deployment-level knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub thresholds: SecurityThresholds,
    /// Bot owners, exempt from nuke detection.
    pub owner_ids: BTreeSet<u64>,
    /// The bot's own account. Its ladder bans and kicks are never a nuke.
    pub bot_user_id: Option<u64>,
    /// Upper bound for any single platform call.
    pub call_timeout: std::time::Duration,
}

/// A privileged action as seen on the gateway. The actor is resolved from
/// the audit log when the event does not carry it.
#[derive(Debug, Clone)]
pub struct ObservedModAction {
    pub guild_id: u64,
    pub guild_name: String,
    pub guild_owner_id: u64,
    pub action: ModerationActionKind,
    pub target_id: Option<u64>,
    pub actor_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum SecurityEvent {
    Message(InboundMessage),
    DirectMessage {
        user_id: u64,
        author_is_bot: bool,
        content: String,
    },
    MemberJoined(InboundJoin),
    ModerationAction(ObservedModAction),
    CommandInvoked {
        guild_id: Option<u64>,
        channel_id: Option<u64>,
        user_id: u64,
        command_name: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Not subject to checks (bots, exempt actors, unresolved audit entries).
    Ignored,
    /// Checked and found normal.
    Clean,
    /// A verdict fired and its response ran.
    Acted { verdict: Verdict, report: ResponseReport },
    /// Direct message from a blocked user, dropped without reply.
    Dropped,
    /// Engine state could not be read or written; the event was skipped.
    Failed,
}

impl DispatchOutcome {
    pub fn is_acted(&self) -> bool {
        matches!(self, DispatchOutcome::Acted { .. })
    }
}

pub struct Dispatcher<S: StateStore> {
    pub policies: Arc<GuildPolicyService<S>>,
    pub tracker: Arc<WindowTracker<S>>,
    pub security_log: Arc<SecurityLog<S>>,
    pub warnings: Arc<WarningEngine<S>>,
    pub spam: Arc<SpamDetector<S>>,
    pub raid: Arc<RaidDetector<S>>,
    pub nuke: Arc<NukeDetector<S>>,
    pub automod: Arc<AutoModFilter<S>>,
    pub dm_guard: Arc<DmGuard<S>>,
    pub command_guard: Arc<CommandGuard<S>>,
    pub responder: Arc<SecurityResponder<S>>,
}

impl<S: StateStore> Dispatcher<S> {
    /// Composition root of the engine: every service shares `store` and `clock`.
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        platform: Arc<dyn PlatformActions>,
        localizer: Arc<dyn Localizer>,
        settings: EngineSettings,
    ) -> Self {
        let thresholds = Arc::new(settings.thresholds);
        let mut exempt_actors = settings.owner_ids;
        exempt_actors.extend(settings.bot_user_id);

        let policies = Arc::new(GuildPolicyService::new(Arc::clone(&store)));
        let tracker = Arc::new(WindowTracker::new(Arc::clone(&store), Arc::clone(&clock)));
        let security_log = Arc::new(SecurityLog::new(Arc::clone(&store), Arc::clone(&clock)));
        let warnings = Arc::new(WarningEngine::new(Arc::clone(&store), clock));

        let spam = Arc::new(SpamDetector::new(
            Arc::clone(&policies),
            Arc::clone(&tracker),
            Arc::clone(&thresholds),
        ));
        let raid = Arc::new(RaidDetector::new(
            Arc::clone(&policies),
            Arc::clone(&tracker),
            Arc::clone(&security_log),
            Arc::clone(&thresholds),
        ));
        let nuke = Arc::new(NukeDetector::new(
            Arc::clone(&policies),
            Arc::clone(&tracker),
            Arc::clone(&thresholds),
            Arc::new(exempt_actors),
        ));
        let automod = Arc::new(AutoModFilter::new(Arc::clone(&policies), Arc::clone(&thresholds)));
        let dm_guard = Arc::new(DmGuard::new(
            Arc::clone(&store),
            Arc::clone(&tracker),
            Arc::clone(&thresholds),
        ));
        let command_guard = Arc::new(CommandGuard::new(Arc::clone(&tracker), Arc::clone(&thresholds)));

        let executor = Arc::new(ResponseExecutor::new(platform, settings.call_timeout));
        let responder = Arc::new(SecurityResponder::new(
            executor,
            Arc::clone(&policies),
            Arc::clone(&warnings),
            Arc::clone(&security_log),
            Arc::clone(&tracker),
            localizer,
            thresholds,
        ));

        Self {
            policies,
            tracker,
            security_log,
            warnings,
            spam,
            raid,
            nuke,
            automod,
            dm_guard,
            command_guard,
            responder,
        }
    }

    /// Handle one event end to end. Never fails.
    pub async fn dispatch(&self, event: SecurityEvent) -> DispatchOutcome {
        let result = match event {
            SecurityEvent::Message(message) => self.on_message(message).await,
            SecurityEvent::DirectMessage {
                user_id,
                author_is_bot,
                content,
            } => self.on_direct_message(user_id, author_is_bot, &content).await,
            SecurityEvent::MemberJoined(join) => self.on_join(join).await,
            SecurityEvent::ModerationAction(action) => self.on_moderation_action(action).await,
            SecurityEvent::CommandInvoked {
                guild_id,
                channel_id,
                user_id,
                command_name,
            } => {
                self.on_command(guild_id, channel_id, user_id, &command_name)
                    .await
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(%error, "Security event dropped");
                DispatchOutcome::Failed
            }
        }
    }

    /// Spam first, then content filtering, then prefix-command rate limiting.
    async fn on_message(&self, message: InboundMessage) -> Result<DispatchOutcome, StoreError> {
        if message.author_is_bot {
            return Ok(DispatchOutcome::Ignored);
        }

        if let Some(verdict) = self.spam.check(&message).await? {
            tracing::warn!(
                guild_id = message.guild_id,
                user_id = message.author_id,
                kind = verdict.violation.label(),
                "Spam detected"
            );
            let report = self.responder.respond_spam(&message, &verdict).await;
            return Ok(DispatchOutcome::Acted { verdict, report });
        }

        if let Some(verdict) = self.automod.check(&message).await? {
            tracing::info!(
                guild_id = message.guild_id,
                user_id = message.author_id,
                kind = verdict.violation.label(),
                severity = verdict.severity.as_str(),
                "Auto-moderation triggered"
            );
            let report = self.responder.respond_automod(&message, &verdict).await;
            return Ok(DispatchOutcome::Acted { verdict, report });
        }

        let prefix = self.policies.policy(message.guild_id).await?.prefix;
        if let Some(command_name) = prefix_command(&message.content, &prefix) {
            return self
                .on_command(
                    Some(message.guild_id),
                    Some(message.channel_id),
                    message.author_id,
                    command_name,
                )
                .await;
        }

        Ok(DispatchOutcome::Clean)
    }

    async fn on_direct_message(
        &self,
        user_id: u64,
        author_is_bot: bool,
        content: &str,
    ) -> Result<DispatchOutcome, StoreError> {
        if author_is_bot {
            return Ok(DispatchOutcome::Ignored);
        }

        match self.dm_guard.check(user_id, content).await? {
            DmCheck::Allowed => Ok(DispatchOutcome::Clean),
            DmCheck::Blocked => Ok(DispatchOutcome::Dropped),
            DmCheck::NewlyBlocked(verdict) => {
                let report = self.responder.notify_dm_block(user_id).await;
                Ok(DispatchOutcome::Acted { verdict, report })
            }
        }
    }

    async fn on_join(&self, join: InboundJoin) -> Result<DispatchOutcome, StoreError> {
        if join.user_is_bot {
            return Ok(DispatchOutcome::Ignored);
        }

        match self.raid.check(&join).await? {
            Some(verdict) => {
                let report = self.responder.respond_raid(&join, &verdict).await;
                Ok(DispatchOutcome::Acted { verdict, report })
            }
            None => Ok(DispatchOutcome::Clean),
        }
    }

    async fn on_moderation_action(&self, observed: ObservedModAction) -> Result<DispatchOutcome, StoreError> {
        let actor_id = match observed.actor_id {
            Some(actor_id) => Some(actor_id),
            None => {
                self.responder
                    .executor()
                    .resolve_actor(observed.guild_id, observed.action, observed.target_id)
                    .await
            }
        };
        let Some(actor_id) = actor_id else {
            tracing::debug!(
                guild_id = observed.guild_id,
                action = %observed.action,
                "No audit log actor for moderation action"
            );
            return Ok(DispatchOutcome::Ignored);
        };

        let event = InboundModAction {
            guild_id: observed.guild_id,
            guild_name: observed.guild_name,
            guild_owner_id: observed.guild_owner_id,
            actor_id,
            action: observed.action,
        };
        match self.nuke.check(&event).await? {
            Some(verdict) => {
                let report = self.responder.respond_nuke(&event, &verdict).await;
                Ok(DispatchOutcome::Acted { verdict, report })
            }
            None => Ok(DispatchOutcome::Clean),
        }
    }

    async fn on_command(
        &self,
        guild_id: Option<u64>,
        channel_id: Option<u64>,
        user_id: u64,
        command_name: &str,
    ) -> Result<DispatchOutcome, StoreError> {
        let Some(verdict) = self.command_guard.check(user_id, command_name).await? else {
            return Ok(DispatchOutcome::Clean);
        };

        tracing::warn!(user_id, command = command_name, "Command spam detected");
        // Outside a guild there is nobody to mute; the window keeps counting.
        let Some(guild_id) = guild_id else {
            return Ok(DispatchOutcome::Clean);
        };
        let report = self
            .responder
            .respond_command_spam(guild_id, channel_id, user_id, &verdict)
            .await;
        Ok(DispatchOutcome::Acted { verdict, report })
    }
}

/// The command word of a prefixed message, e.g. `-warn` for `-warn @x rude`.
fn prefix_command<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() || !content.starts_with(prefix) {
        return None;
    }
    content.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::response::ActionError;
    use crate::core::security::{SecurityLogKind, Violation};
    use crate::core::testing::{Fixture, PlatformCall};
    use chrono::Duration;

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

    fn ban_by(actor_id: Option<u64>) -> SecurityEvent {
        SecurityEvent::ModerationAction(ObservedModAction {
            guild_id: 1,
            guild_name: "Test Guild".to_string(),
            guild_owner_id: 500,
            action: ModerationActionKind::Ban,
            target_id: Some(77),
            actor_id,
        })
    }

    #[tokio::test]
    async fn test_spammer_scenario_end_to_end() {
        let fixture = Fixture::new();
        let words = ["hi", "yo", "sup", "hey", "hello"];

        let mut outcomes = Vec::new();
        for (i, word) in words.iter().enumerate() {
            fixture.clock.advance(Duration::milliseconds(600));
            let mut msg = message(2, word);
            msg.message_id = 100 + i as u64;
            outcomes.push(fixture.dispatch(SecurityEvent::Message(msg)).await);
        }

        assert!(outcomes[..4].iter().all(|o| *o == DispatchOutcome::Clean));
        match &outcomes[4] {
            DispatchOutcome::Acted { verdict, .. } => {
                assert!(matches!(verdict.violation, Violation::MessageSpam { .. }))
            }
            other => panic!("expected spam verdict, got {other:?}"),
        }

        let calls = fixture.platform.calls();
        assert!(calls.contains(&PlatformCall::DeleteMessage {
            channel_id: 10,
            message_id: 104
        }));
        assert!(calls.iter().any(|call| matches!(
            call,
            PlatformCall::Timeout { user_id: 2, minutes: Some(10_080), .. }
        )));

        let log = fixture.security_log.recent(1, 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, SecurityLogKind::SpamDetected);
        assert!(fixture
            .tracker
            .history(crate::core::tracking::TrackKey::messages(1, 2))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_spam_short_circuits_automod() {
        let fixture = Fixture::new();
        let mut msg = message(2, "nazi @a @b @c @d @e");
        msg.mentioned_user_ids = vec![11, 12, 13, 14, 15];

        let outcome = fixture.dispatch(SecurityEvent::Message(msg)).await;
        match outcome {
            DispatchOutcome::Acted { verdict, .. } => {
                assert!(matches!(verdict.violation, Violation::MentionSpam { .. }))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fixture.warnings.get_warnings(1, 2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_automod_runs_when_spam_is_clean() {
        let fixture = Fixture::new();
        let outcome = fixture
            .dispatch(SecurityEvent::Message(message(2, "join discord.gg/abc")))
            .await;
        assert!(outcome.is_acted());
        let log = fixture.security_log.recent(1, 1).await.unwrap();
        assert_eq!(log[0].kind, SecurityLogKind::AutoModTrigger);
    }

    #[tokio::test]
    async fn test_prefixed_messages_count_as_commands() {
        let fixture = Fixture::new();
        let mut last = DispatchOutcome::Clean;
        for _ in 0..5 {
            fixture.clock.advance(Duration::seconds(1));
            // Clearing the message window keeps the spam rules out of the way.
            last = fixture.dispatch(SecurityEvent::Message(message(3, "-ping"))).await;
            fixture.spam.clear_window(1, 3).await.unwrap();
        }
        match last {
            DispatchOutcome::Acted { verdict, .. } => {
                assert!(matches!(verdict.violation, Violation::CommandSpam { commands: 5 }))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dm_flood_blocks_then_drops() {
        let fixture = Fixture::new();
        let dm = |content: &str| SecurityEvent::DirectMessage {
            user_id: 8,
            author_is_bot: false,
            content: content.to_string(),
        };

        for i in 0..4 {
            assert_eq!(fixture.dispatch(dm(&i.to_string())).await, DispatchOutcome::Clean);
        }
        assert!(fixture.dispatch(dm("4")).await.is_acted());
        assert_eq!(fixture.platform.count("direct_message"), 1);

        assert_eq!(fixture.dispatch(dm("5")).await, DispatchOutcome::Dropped);
        assert_eq!(fixture.platform.count("direct_message"), 1);
    }

    #[tokio::test]
    async fn test_nuke_actor_resolved_from_audit_log() {
        let fixture = Fixture::new();
        fixture.platform.set_audit_actor(Some(600));

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            fixture.clock.advance(Duration::milliseconds(300));
            outcomes.push(fixture.dispatch(ban_by(None)).await.is_acted());
        }
        assert_eq!(outcomes, vec![false, false, true]);
        assert_eq!(fixture.platform.count("audit_log"), 3);
    }

    #[tokio::test]
    async fn test_unresolved_actor_is_ignored() {
        let fixture = Fixture::new();
        fixture.platform.fail("audit_log", ActionError::PermissionDenied);
        assert_eq!(fixture.dispatch(ban_by(None)).await, DispatchOutcome::Ignored);
        assert_eq!(fixture.dispatch(ban_by(None)).await, DispatchOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_owner_mass_bans_never_trigger() {
        let fixture = Fixture::new();
        for _ in 0..10 {
            fixture.clock.advance(Duration::milliseconds(100));
            let outcome = fixture.dispatch(ban_by(Some(500))).await;
            assert_eq!(outcome, DispatchOutcome::Clean);
        }
        assert_eq!(fixture.platform.count("timeout"), 0);
    }

    #[tokio::test]
    async fn test_raid_join_is_muted() {
        let fixture = Fixture::new();
        let mut last = DispatchOutcome::Clean;
        for user_id in 0..5 {
            fixture.clock.advance(Duration::seconds(1));
            let join = InboundJoin {
                guild_id: 1,
                guild_name: "Test Guild".to_string(),
                user_id,
                user_is_bot: false,
                account_created_at: fixture.clock.now() - Duration::days(1),
            };
            last = fixture.dispatch(SecurityEvent::MemberJoined(join)).await;
        }
        assert!(last.is_acted());
        assert!(fixture.platform.calls().iter().any(|call| matches!(
            call,
            PlatformCall::Timeout { user_id: 4, .. }
        )));
    }

    #[test]
    fn test_prefix_command_extraction() {
        assert_eq!(prefix_command("-warn @x rude", "-"), Some("-warn"));
        assert_eq!(prefix_command("hello -warn", "-"), None);
        assert_eq!(prefix_command("!!ping", "!!"), Some("!!ping"));
    }
}
