// Security domain models - verdicts, thresholds and the inbound shapes the
// detectors consume.
//
// These are pure domain types with no Discord dependencies. The Discord layer
// converts gateway events into the `Inbound*` structs.

use crate::core::tracking::ModerationActionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Verdict weight. Only `High` content violations feed the warning ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// What was detected, with the evidence that crossed the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Violation {
    MentionSpam { mentions: usize },
    MessageSpam { messages: usize, window_secs: i64 },
    DuplicateSpam { repeats: usize },
    Raid { joins: usize, window_secs: i64, account_age_days: i64 },
    Nuke { action: ModerationActionKind, count: usize, window_secs: i64 },
    BlacklistedWord { word: String },
    InviteLink,
    ExcessiveCaps { percent: u32 },
    DmSpam { messages: usize },
    CommandSpam { commands: usize },
}

impl Violation {
    pub fn label(&self) -> &'static str {
        match self {
            Violation::MentionSpam { .. } => "mention_spam",
            Violation::MessageSpam { .. } => "message_spam",
            Violation::DuplicateSpam { .. } => "duplicate_spam",
            Violation::Raid { .. } => "raid",
            Violation::Nuke { .. } => "nuke",
            Violation::BlacklistedWord { .. } => "blacklisted_word",
            Violation::InviteLink => "invite_link",
            Violation::ExcessiveCaps { .. } => "excessive_caps",
            Violation::DmSpam { .. } => "dm_spam",
            Violation::CommandSpam { .. } => "command_spam",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub violation: Violation,
    pub reason: String,
    pub severity: Severity,
}

impl Verdict {
    pub fn new(violation: Violation, reason: impl Into<String>, severity: Severity) -> Self {
        Self {
            violation,
            reason: reason.into(),
            severity,
        }
    }
}

/// Every tunable constant of the detectors.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityThresholds {
    pub spam_message_threshold: usize,
    pub spam_window_secs: i64,
    pub spam_mention_threshold: usize,
    pub spam_duplicate_threshold: usize,
    pub raid_join_threshold: usize,
    pub raid_window_secs: i64,
    pub raid_min_account_age_days: i64,
    pub nuke_ban_threshold: usize,
    pub nuke_kick_threshold: usize,
    pub nuke_channel_delete_threshold: usize,
    pub nuke_role_delete_threshold: usize,
    pub nuke_window_secs: i64,
    /// Clear the actor's action window once a nuke verdict fires.
    pub nuke_reset_on_trigger: bool,
    pub caps_threshold_percent: u32,
    pub caps_min_length: usize,
    pub dm_spam_threshold: usize,
    pub dm_spam_window_secs: i64,
    pub command_spam_threshold: usize,
    pub command_spam_window_secs: i64,
    /// Mute applied to spammers, raiders and command spammers.
    pub auto_mute_days: i64,
    /// Timeout applied to a nuke actor (the platform maximum).
    pub nuke_timeout_days: i64,
}

impl Default for SecurityThresholds {
    fn default() -> Self {
        Self {
            spam_message_threshold: 5,
            spam_window_secs: 5,
            spam_mention_threshold: 5,
            spam_duplicate_threshold: 3,
            raid_join_threshold: 5,
            raid_window_secs: 10,
            raid_min_account_age_days: 7,
            nuke_ban_threshold: 3,
            nuke_kick_threshold: 3,
            nuke_channel_delete_threshold: 5,
            nuke_role_delete_threshold: 3,
            nuke_window_secs: 10,
            nuke_reset_on_trigger: false,
            caps_threshold_percent: 70,
            caps_min_length: 10,
            dm_spam_threshold: 5,
            dm_spam_window_secs: 10,
            command_spam_threshold: 5,
            command_spam_window_secs: 10,
            auto_mute_days: 7,
            nuke_timeout_days: 28,
        }
    }
}

impl SecurityThresholds {
    pub fn nuke_threshold(&self, action: ModerationActionKind) -> usize {
        match action {
            ModerationActionKind::Ban => self.nuke_ban_threshold,
            ModerationActionKind::Kick => self.nuke_kick_threshold,
            ModerationActionKind::ChannelDelete => self.nuke_channel_delete_threshold,
            ModerationActionKind::RoleDelete => self.nuke_role_delete_threshold,
        }
    }
}

// ============================================================================
// SECURITY LOG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLogKind {
    SpamDetected,
    RaidDetected,
    NukeAttempt,
    AutoModTrigger,
}

impl SecurityLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLogKind::SpamDetected => "spam_detected",
            SecurityLogKind::RaidDetected => "raid_detected",
            SecurityLogKind::NukeAttempt => "nuke_attempt",
            SecurityLogKind::AutoModTrigger => "auto_mod_trigger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityLogEntry {
    pub guild_id: u64,
    #[serde(rename = "type")]
    pub kind: SecurityLogKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

// ============================================================================
// INBOUND EVENTS
// ============================================================================

/// A message posted in a guild channel.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub guild_id: u64,
    pub guild_name: String,
    pub channel_id: u64,
    pub message_id: u64,
    pub author_id: u64,
    pub author_is_bot: bool,
    pub content: String,
    pub mentioned_user_ids: Vec<u64>,
}

/// A member joining a guild.
#[derive(Debug, Clone)]
pub struct InboundJoin {
    pub guild_id: u64,
    pub guild_name: String,
    pub user_id: u64,
    pub user_is_bot: bool,
    pub account_created_at: DateTime<Utc>,
}

/// A completed privileged action whose actor was resolved from the audit log.
#[derive(Debug, Clone)]
pub struct InboundModAction {
    pub guild_id: u64,
    pub guild_name: String,
    pub guild_owner_id: u64,
    pub actor_id: u64,
    pub action: ModerationActionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_serializes_with_type_tag() {
        let value = serde_json::to_value(Violation::MentionSpam { mentions: 6 }).unwrap();
        assert_eq!(value["type"], "mention_spam");
        assert_eq!(value["mentions"], 6);
    }

    #[test]
    fn test_log_entry_uses_type_field() {
        let entry = SecurityLogEntry {
            guild_id: 1,
            kind: SecurityLogKind::NukeAttempt,
            timestamp: Utc::now(),
            details: BTreeMap::new(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "nuke_attempt");
    }

    #[test]
    fn test_default_nuke_thresholds() {
        let thresholds = SecurityThresholds::default();
        assert_eq!(thresholds.nuke_threshold(ModerationActionKind::Ban), 3);
        assert_eq!(thresholds.nuke_threshold(ModerationActionKind::Kick), 3);
        assert_eq!(thresholds.nuke_threshold(ModerationActionKind::ChannelDelete), 5);
        assert_eq!(thresholds.nuke_threshold(ModerationActionKind::RoleDelete), 3);
    }
}
