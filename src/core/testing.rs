// Test support - a controllable clock, a recording platform and a fixture that
// wires every service over the in-memory store.

use crate::core::dispatch::{Dispatcher, EngineSettings};
use crate::core::localization::TextCatalog;
use crate::core::response::{ActionError, PlatformActions};
use crate::core::security::SecurityThresholds;
use crate::core::tracking::{Clock, ModerationActionKind};
use crate::infra::storage::InMemoryStateStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// CLOCK
// ============================================================================

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        ManualClock::now(self)
    }
}

// ============================================================================
// PLATFORM
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    DirectMessage { user_id: u64, content: String },
    DeleteMessage { channel_id: u64, message_id: u64 },
    Timeout { guild_id: u64, user_id: u64, minutes: Option<i64>, reason: String },
    Kick { guild_id: u64, user_id: u64, reason: String },
    Ban { guild_id: u64, user_id: u64, reason: String },
    Unban { guild_id: u64, user_id: u64 },
    RemoveRole { guild_id: u64, user_id: u64, role_id: u64 },
    ChannelMessage { channel_id: u64, content: String },
    AuditLog { guild_id: u64, action: ModerationActionKind },
}

impl PlatformCall {
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformCall::DirectMessage { .. } => "direct_message",
            PlatformCall::DeleteMessage { .. } => "delete_message",
            PlatformCall::Timeout { minutes: None, .. } => "remove_timeout",
            PlatformCall::Timeout { .. } => "timeout",
            PlatformCall::Kick { .. } => "kick",
            PlatformCall::Ban { .. } => "ban",
            PlatformCall::Unban { .. } => "unban",
            PlatformCall::RemoveRole { .. } => "remove_role",
            PlatformCall::ChannelMessage { .. } => "channel_message",
            PlatformCall::AuditLog { .. } => "audit_log",
        }
    }
}

/// Records every call. Failures are queued per call kind and consumed in order.
#[derive(Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    failures: Mutex<HashMap<&'static str, VecDeque<ActionError>>>,
    delay: Mutex<Option<std::time::Duration>>,
    security_channel: Mutex<Option<u64>>,
    highest_role_members: Mutex<Vec<u64>>,
    privileged_roles: Mutex<Vec<u64>>,
    audit_actor: Mutex<Option<u64>>,
    next_message_id: AtomicU64,
}

impl RecordingPlatform {
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.calls().iter().map(PlatformCall::kind).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail(&self, kind: &'static str, error: ActionError) {
        self.failures
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_security_channel(&self, channel_id: Option<u64>) {
        *self.security_channel.lock().unwrap() = channel_id;
    }

    pub fn set_highest_role_members(&self, members: Vec<u64>) {
        *self.highest_role_members.lock().unwrap() = members;
    }

    pub fn set_privileged_roles(&self, roles: Vec<u64>) {
        *self.privileged_roles.lock().unwrap() = roles;
    }

    pub fn set_audit_actor(&self, actor: Option<u64>) {
        *self.audit_actor.lock().unwrap() = actor;
    }

    async fn record(&self, call: PlatformCall) -> Result<(), ActionError> {
        let kind = call.kind();
        self.calls.lock().unwrap().push(call);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.lock().unwrap().get_mut(kind).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformActions for RecordingPlatform {
    async fn send_direct_message(&self, user_id: u64, content: &str) -> Result<(), ActionError> {
        self.record(PlatformCall::DirectMessage {
            user_id,
            content: content.to_string(),
        })
        .await
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), ActionError> {
        self.record(PlatformCall::DeleteMessage {
            channel_id,
            message_id,
        })
        .await
    }

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        duration: Option<Duration>,
        reason: &str,
    ) -> Result<(), ActionError> {
        self.record(PlatformCall::Timeout {
            guild_id,
            user_id,
            minutes: duration.map(|d| d.num_minutes()),
            reason: reason.to_string(),
        })
        .await
    }

    async fn kick_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ActionError> {
        self.record(PlatformCall::Kick {
            guild_id,
            user_id,
            reason: reason.to_string(),
        })
        .await
    }

    async fn ban_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ActionError> {
        self.record(PlatformCall::Ban {
            guild_id,
            user_id,
            reason: reason.to_string(),
        })
        .await
    }

    async fn unban_member(&self, guild_id: u64, user_id: u64, _reason: &str) -> Result<(), ActionError> {
        self.record(PlatformCall::Unban { guild_id, user_id }).await
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        _reason: &str,
    ) -> Result<(), ActionError> {
        self.record(PlatformCall::RemoveRole {
            guild_id,
            user_id,
            role_id,
        })
        .await
    }

    async fn send_channel_message(&self, channel_id: u64, content: &str) -> Result<u64, ActionError> {
        self.record(PlatformCall::ChannelMessage {
            channel_id,
            content: content.to_string(),
        })
        .await?;
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1_000)
    }

    async fn fetch_audit_log_actor(
        &self,
        guild_id: u64,
        action: ModerationActionKind,
        _target_id: Option<u64>,
    ) -> Result<Option<u64>, ActionError> {
        self.record(PlatformCall::AuditLog { guild_id, action }).await?;
        Ok(*self.audit_actor.lock().unwrap())
    }

    async fn privileged_roles(&self, _guild_id: u64, _user_id: u64) -> Result<Vec<u64>, ActionError> {
        Ok(self.privileged_roles.lock().unwrap().clone())
    }

    async fn highest_role_members(&self, _guild_id: u64) -> Result<Vec<u64>, ActionError> {
        Ok(self.highest_role_members.lock().unwrap().clone())
    }

    async fn security_log_channel(
        &self,
        _guild_id: u64,
        configured: Option<u64>,
    ) -> Result<Option<u64>, ActionError> {
        Ok(configured.or(*self.security_channel.lock().unwrap()))
    }
}

// ============================================================================
// FIXTURE
// ============================================================================

/// The account the fixture's engine runs as.
pub const BOT_USER_ID: u64 = 999;

/// Every service wired together over one in-memory store.
///
/// Derefs to the dispatcher so tests reach services as `fixture.spam`,
/// `fixture.policies` and so on.
pub struct Fixture {
    pub store: Arc<InMemoryStateStore>,
    pub clock: Arc<ManualClock>,
    pub platform: Arc<RecordingPlatform>,
    pub dispatcher: Dispatcher<InMemoryStateStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(SecurityThresholds::default(), BTreeSet::new())
    }

    pub fn with_thresholds(thresholds: SecurityThresholds) -> Self {
        Self::build(thresholds, BTreeSet::new())
    }

    pub fn with_owner_ids(owner_ids: impl IntoIterator<Item = u64>) -> Self {
        Self::build(SecurityThresholds::default(), owner_ids.into_iter().collect())
    }

    fn build(thresholds: SecurityThresholds, owner_ids: BTreeSet<u64>) -> Self {
        let store = Arc::new(InMemoryStateStore::new());
        let clock = Arc::new(ManualClock::default());
        let platform = Arc::new(RecordingPlatform::default());

        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            clock.clone(),
            platform.clone(),
            Arc::new(TextCatalog::new()),
            EngineSettings {
                thresholds,
                owner_ids,
                bot_user_id: Some(BOT_USER_ID),
                call_timeout: std::time::Duration::from_secs(2),
            },
        );

        Self {
            store,
            clock,
            platform,
            dispatcher,
        }
    }
}

impl Deref for Fixture {
    type Target = Dispatcher<InMemoryStateStore>;

    fn deref(&self) -> &Self::Target {
        &self.dispatcher
    }
}
