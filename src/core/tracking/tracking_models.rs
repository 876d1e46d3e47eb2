// Tracking domain models - what a window holds and how it is keyed.

use crate::core::storage::keys;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Guild id used for histories that are not tied to a guild (direct messages).
pub const DIRECT_MESSAGE_GUILD: u64 = 0;

/// Privileged actions watched by the nuke detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationActionKind {
    Ban,
    Kick,
    ChannelDelete,
    RoleDelete,
}

impl ModerationActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationActionKind::Ban => "ban",
            ModerationActionKind::Kick => "kick",
            ModerationActionKind::ChannelDelete => "channel_delete",
            ModerationActionKind::RoleDelete => "role_delete",
        }
    }
}

impl std::fmt::Display for ModerationActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of history a window holds. Each kind has its own retention cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Message,
    Join,
    ModerationAction,
    Command,
}

impl TrackKind {
    /// Maximum entries kept; the oldest entry is evicted first.
    pub fn retention(&self) -> usize {
        match self {
            TrackKind::Message => 10,
            TrackKind::Join => 50,
            TrackKind::ModerationAction => 20,
            TrackKind::Command => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Message => "message",
            TrackKind::Join => "join",
            TrackKind::ModerationAction => "action",
            TrackKind::Command => "command",
        }
    }
}

/// Identifies one window: `(guild, subject, kind)`.
///
/// Join windows are guild-wide and carry no subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackKey {
    pub guild_id: u64,
    pub subject_id: Option<u64>,
    pub kind: TrackKind,
}

impl TrackKey {
    pub fn messages(guild_id: u64, user_id: u64) -> Self {
        Self {
            guild_id,
            subject_id: Some(user_id),
            kind: TrackKind::Message,
        }
    }

    pub fn direct_messages(user_id: u64) -> Self {
        Self::messages(DIRECT_MESSAGE_GUILD, user_id)
    }

    pub fn joins(guild_id: u64) -> Self {
        Self {
            guild_id,
            subject_id: None,
            kind: TrackKind::Join,
        }
    }

    pub fn actions(guild_id: u64, actor_id: u64) -> Self {
        Self {
            guild_id,
            subject_id: Some(actor_id),
            kind: TrackKind::ModerationAction,
        }
    }

    /// Command usage is tracked per user across guilds.
    pub fn commands(user_id: u64) -> Self {
        Self {
            guild_id: DIRECT_MESSAGE_GUILD,
            subject_id: Some(user_id),
            kind: TrackKind::Command,
        }
    }

    pub fn storage_key(&self) -> String {
        keys::track(self.kind.as_str(), self.guild_id, self.subject_id)
    }
}

/// What was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sample", rename_all = "snake_case")]
pub enum Sample {
    Message { content: String },
    Join { user_id: u64 },
    ModerationAction { action: ModerationActionKind },
    Command { command_name: String },
}

/// One entry of a window. Entries are stored oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: Sample,
}

impl TrackedEvent {
    pub fn content(&self) -> Option<&str> {
        match &self.payload {
            Sample::Message { content } => Some(content),
            _ => None,
        }
    }

    pub fn action(&self) -> Option<ModerationActionKind> {
        match &self.payload {
            Sample::ModerationAction { action } => Some(*action),
            _ => None,
        }
    }
}
