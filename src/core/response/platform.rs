// Platform actions port - everything the engine asks the chat platform to do.
//
// The Discord layer implements this over serenity; tests use a recording mock.

use crate::core::tracking::ModerationActionKind;
use async_trait::async_trait;
use chrono::Duration;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The bot lacks the permission or role rank for this action.
    #[error("Permission denied")]
    PermissionDenied,

    /// The target is already gone.
    #[error("Target not found")]
    NotFound,

    /// Network failure, rate limit or timeout.
    #[error("Transient platform error: {0}")]
    Transient(String),
}

// ============================================================================
// PLATFORM TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait PlatformActions: Send + Sync {
    async fn send_direct_message(&self, user_id: u64, content: &str) -> Result<(), ActionError>;

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), ActionError>;

    /// `None` lifts an existing timeout.
    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        duration: Option<Duration>,
        reason: &str,
    ) -> Result<(), ActionError>;

    async fn kick_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ActionError>;

    async fn ban_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ActionError>;

    async fn unban_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ActionError>;

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), ActionError>;

    /// Returns the id of the posted message.
    async fn send_channel_message(&self, channel_id: u64, content: &str) -> Result<u64, ActionError>;

    /// Who performed the most recent `action` (optionally against `target_id`).
    async fn fetch_audit_log_actor(
        &self,
        guild_id: u64,
        action: ModerationActionKind,
        target_id: Option<u64>,
    ) -> Result<Option<u64>, ActionError>;

    /// Roles held by `user_id` that grant administrator, ban or kick.
    async fn privileged_roles(&self, guild_id: u64, user_id: u64) -> Result<Vec<u64>, ActionError>;

    /// Human members of the highest-positioned role that has any members.
    async fn highest_role_members(&self, guild_id: u64) -> Result<Vec<u64>, ActionError>;

    /// The configured log channel if it still exists, else a channel named
    /// `security-log`.
    async fn security_log_channel(
        &self,
        guild_id: u64,
        configured: Option<u64>,
    ) -> Result<Option<u64>, ActionError>;
}
