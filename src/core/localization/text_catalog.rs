// Text catalog - maps (locale, key) to a template with `{name}` placeholders.
//
// Lookups fall back to English, then to the key itself, so a missing
// translation degrades to readable text instead of an error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Vi,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Vi => "vi",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Locale::En => "English",
            Locale::Vi => "Tiếng Việt",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Locale::En),
            "vi" | "vietnamese" | "tiếng việt" => Ok(Locale::Vi),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

/// Resolves user-facing text. Implementations must be pure: the locale is
/// always supplied by the caller.
pub trait Localizer: Send + Sync {
    fn resolve(&self, locale: Locale, key: &str, substitutions: &[(&str, String)]) -> String;
}

pub struct TextCatalog {
    entries: HashMap<(Locale, &'static str), &'static str>,
}

impl TextCatalog {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for (key, text) in EN {
            entries.insert((Locale::En, *key), *text);
        }
        for (key, text) in VI {
            entries.insert((Locale::Vi, *key), *text);
        }
        Self { entries }
    }
}

impl Default for TextCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Localizer for TextCatalog {
    fn resolve(&self, locale: Locale, key: &str, substitutions: &[(&str, String)]) -> String {
        let template = self
            .entries
            .get(&(locale, key))
            .or_else(|| self.entries.get(&(Locale::En, key)))
            .copied()
            .unwrap_or(key);

        let mut text = template.to_string();
        for (name, value) in substitutions {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }
}

const EN: &[(&str, &str)] = &[
    // Direct message notices
    ("dm_title", "⚠️ Violation Notice"),
    ("dm_description", "You have been **{action}** in server **{server}**"),
    ("dm_reason", "📝 Reason"),
    ("dm_info", "ℹ️ Additional Info"),
    ("dm_footer", "Please follow server rules"),
    ("dm_no_reason", "No reason provided"),
    ("action_warned", "warned {count}/10 times"),
    ("action_kicked", "kicked from server"),
    ("action_banned", "permanently banned"),
    ("action_timeout", "timed out for {duration}"),
    ("action_muted_days", "muted for {days} days"),
    ("extra_rejoin", "You can rejoin if you have an invite link"),
    ("extra_cannot_rejoin", "You cannot rejoin this server"),
    ("extra_timeout_duration", "Mute duration: {duration}"),
    ("extra_spam_detected", "Automatic punishment for spam behavior"),
    ("extra_raid_detected", "Automatic punishment for raid behavior"),
    ("extra_nuke_detected", "Automatic punishment for nuke attempt"),
    // Escalation ladder
    ("warn_level_1", "⚠️ Warning 1: Please follow the rules!"),
    ("warn_level_2", "⚠️ Warning 2: Watch your behavior!"),
    ("warn_level_3", "⚠️ Warning 3: This is your final warning!"),
    ("warn_level_4", "🔇 Warning 4: You are muted for 5 minutes!"),
    ("warn_level_5", "🔇 Warning 5: You are muted for 30 minutes!"),
    ("warn_level_6", "🔇 Warning 6: You are muted for 1 hour!"),
    ("warn_level_7", "🔇 Warning 7: You are muted for 3 hours!"),
    ("warn_level_8", "👢 Warning 8: You are kicked from the server!"),
    ("warn_level_9", "🔨 Warning 9: You are banned from the server!"),
    ("warn_level_10", "🔨 Warning 10: You are permanently banned!"),
    ("warning_auto", "⚠️ AUTOMATIC WARNING"),
    ("warning_title", "⚠️ WARNING"),
    ("warning_member", "👤 Member"),
    ("warning_count", "🔢 Warning Count"),
    ("warning_reason", "📝 Reason"),
    ("warning_stats", "📊 Warning Statistics"),
    ("warning_next", "⏭️ Next Punishment"),
    ("warning_cleared", "✅ Cleared all warnings for {user}"),
    ("warning_none", "ℹ️ {user} has no warnings!"),
    ("warning_excessive", "🔨 {user} exceeded warning limit and has been banned!"),
    // Security alerts
    ("security_alert", "🚨 Security Alert"),
    (
        "alert_spam",
        "🚨 **Spam Detected**\nUser: {user} (`{user_id}`)\nType: {kind}\nReason: {reason}\nAction: Auto-muted for {days} days",
    ),
    (
        "alert_raid",
        "🛡️ **Raid Detected**\nUser: {user} (`{user_id}`)\n{count} joins in {window}s, account age {age} days\nAction: Auto-muted for {days} days",
    ),
    ("nuke_alert", "🚨 NUKE ATTEMPT DETECTED!"),
    ("nuke_description", "**{user}** attempted to nuke the server!"),
    ("nuke_blocked", "🚨 NUKE ATTEMPT BLOCKED"),
    ("nuke_attempt_mass", "**{user}** attempted mass {action} ({count} in {window}s)"),
    ("nuke_response_action", "Removed permissions and timed out"),
    ("nuke_label_action", "Action"),
    ("nuke_label_moderator", "Moderator"),
    ("modlog_title", "🔒 {action}"),
    ("modlog_moderator", "👮 Moderator"),
    ("modlog_target", "👤 Target"),
    ("modlog_warning", "Warning #{count}"),
    ("modlog_clear_warnings", "Clear Warnings"),
    ("modlog_timeout", "Timeout {duration}"),
    ("modlog_remove_timeout", "Remove Timeout"),
    ("modlog_kick", "Kick"),
    ("modlog_ban", "Ban"),
    ("modlog_unban", "Unban"),
    ("automod_notice", "⚠️ {user} {reason}"),
    ("dm_spam_blocked", "⛔ **You have been blocked from messaging this bot**\nReason: Spam detected"),
    ("command_spam_muted", "🚨 {user} has been muted for {days} days for command spam!"),
    // Command replies
    ("security_title", "🛡️ Security Status"),
    ("security_anti_nuke", "🚫 Anti-Nuke"),
    ("security_anti_raid", "🛡️ Anti-Raid"),
    ("security_anti_spam", "📢 Anti-Spam"),
    ("security_auto_mod", "🤖 Auto-Mod"),
    ("security_on", "✅ On"),
    ("security_off", "❌ Off"),
    ("security_logs", "📋 Recent Logs"),
    ("security_logs_empty", "No security events recorded."),
    ("feature_enabled", "✅ **ENABLED** {feature}!"),
    ("feature_disabled", "⚠️ **DISABLED** {feature}!"),
    ("whitelist_added", "✅ Added {target} to the whitelist!"),
    ("whitelist_removed", "✅ Removed {target} from the whitelist!"),
    ("whitelist_unchanged", "ℹ️ Whitelist already up to date for {target}."),
    ("blacklist_title", "📋 Blacklisted Words"),
    ("blacklist_empty", "ℹ️ No words in blacklist yet!"),
    ("blacklist_added", "✅ Added word `{word}` to blacklist!"),
    ("blacklist_removed", "✅ Removed word `{word}` from blacklist!"),
    ("blacklist_missing", "ℹ️ `{word}` is not on the blacklist."),
    ("timeout_success", "🔇 {user} has been timed out for {duration}."),
    ("untimeout_success", "✅ Removed timeout for {user}."),
    ("kick_success", "👢 {user} has been kicked."),
    ("ban_success", "🔨 {user} has been banned."),
    ("unban_success", "✅ {user} has been unbanned."),
    ("error_forbidden_unban", "❌ No permission to unban this user!"),
    ("error_not_banned", "ℹ️ {user} is not banned."),
    ("error_forbidden_timeout", "❌ No permission to timeout this member!"),
    ("error_forbidden_kick", "❌ No permission to kick this member!"),
    ("error_forbidden_ban", "❌ No permission to ban this member!"),
    ("error_action_failed", "❌ The platform did not accept the action. Try again later."),
    ("error_invalid_time", "❌ Invalid time format! Use: 5m, 1h, 2h30m, etc."),
    ("error_invalid_input", "❌ {detail}"),
    ("error_prefix_long", "❌ Prefix cannot be longer than 5 characters!"),
    ("error_self_action", "❌ You cannot use this on yourself!"),
    ("error_bot_action", "❌ Cannot perform this action on a bot!"),
    ("error_no_permission", "❌ You do not have permission to use this command!"),
    ("error_internal", "❌ Something went wrong. The incident was logged."),
    ("language_changed", "✅ Language changed to **{language}**!"),
    ("logchannel_set", "✅ Log channel set to {channel}!"),
    ("logchannel_cleared", "ℹ️ Log channel cleared."),
    ("logchannel_none", "ℹ️ No log channel set."),
    ("logchannel_current", "📋 Current log channel: {channel}"),
    ("prefix_changed", "✅ Prefix changed to `{prefix}`"),
    ("dm_unblocked", "✅ {user} can message the bot again."),
    ("dm_not_blocked", "ℹ️ {user} was not blocked."),
];

const VI: &[(&str, &str)] = &[
    ("dm_title", "⚠️ Thông Báo Vi Phạm"),
    ("dm_description", "Bạn đã bị **{action}** tại server **{server}**"),
    ("dm_reason", "📝 Lý do"),
    ("dm_info", "ℹ️ Thông tin thêm"),
    ("dm_footer", "Vui lòng tuân thủ quy định của server"),
    ("dm_no_reason", "Không có lý do"),
    ("action_warned", "cảnh báo lần {count}/10"),
    ("action_kicked", "kick khỏi server"),
    ("action_banned", "ban vĩnh viễn"),
    ("action_timeout", "timeout {duration}"),
    ("action_muted_days", "mute {days} ngày"),
    ("extra_rejoin", "Bạn có thể join lại server nếu có invite link"),
    ("extra_cannot_rejoin", "Bạn sẽ không thể join lại server này"),
    ("extra_timeout_duration", "Thời gian mute: {duration}"),
    ("extra_spam_detected", "Trừng phạt tự động do hành vi spam"),
    ("extra_raid_detected", "Trừng phạt tự động do hành vi raid"),
    ("extra_nuke_detected", "Trừng phạt tự động do cố gắng phá hoại server"),
    ("warn_level_1", "⚠️ Cảnh báo lần 1: Vui lòng tuân thủ quy định!"),
    ("warn_level_2", "⚠️ Cảnh báo lần 2: Cẩn thận với hành vi của bạn!"),
    ("warn_level_3", "⚠️ Cảnh báo lần 3: Đây là lần cảnh báo cuối cùng!"),
    ("warn_level_4", "🔇 Cảnh báo lần 4: Bạn bị mute 5 phút!"),
    ("warn_level_5", "🔇 Cảnh báo lần 5: Bạn bị mute 30 phút!"),
    ("warn_level_6", "🔇 Cảnh báo lần 6: Bạn bị mute 1 giờ!"),
    ("warn_level_7", "🔇 Cảnh báo lần 7: Bạn bị mute 3 giờ!"),
    ("warn_level_8", "👢 Cảnh báo lần 8: Bạn bị kick khỏi server!"),
    ("warn_level_9", "🔨 Cảnh báo lần 9: Bạn bị ban khỏi server!"),
    ("warn_level_10", "🔨 Cảnh báo lần 10: Bạn bị ban vĩnh viễn!"),
    ("warning_auto", "⚠️ CẢNH BÁO TỰ ĐỘNG"),
    ("warning_title", "⚠️ CẢNH BÁO"),
    ("warning_member", "👤 Thành viên"),
    ("warning_count", "🔢 Lần cảnh báo"),
    ("warning_reason", "📝 Lý do"),
    ("warning_stats", "📊 Thống kê cảnh báo"),
    ("warning_next", "⏭️ Hình phạt tiếp theo"),
    ("warning_cleared", "✅ Đã xóa toàn bộ cảnh báo của {user}"),
    ("warning_none", "ℹ️ {user} không có cảnh báo nào!"),
    ("warning_excessive", "🔨 {user} đã vượt quá giới hạn cảnh báo và bị ban!"),
    ("security_alert", "🚨 Cảnh Báo Bảo Mật"),
    ("nuke_alert", "🚨 PHÁT HIỆN NỖ LỰC NUKE!"),
    ("nuke_description", "**{user}** đã cố phá hoại server!"),
    ("nuke_blocked", "🚨 ĐÃ CHẶN NỖ LỰC NUKE"),
    ("nuke_attempt_mass", "**{user}** đã cố {action} hàng loạt ({count} lần trong {window}s)"),
    ("nuke_response_action", "Đã xóa quyền và timeout"),
    ("nuke_label_action", "Hành động"),
    ("nuke_label_moderator", "Người thực hiện"),
    ("modlog_moderator", "👮 Người xử lý"),
    ("modlog_target", "👤 Đối tượng"),
    ("modlog_warning", "Cảnh báo #{count}"),
    ("modlog_clear_warnings", "Xóa cảnh báo"),
    ("modlog_remove_timeout", "Gỡ timeout"),
    ("command_spam_muted", "🚨 {user} đã bị mute {days} ngày do spam commands!"),
    ("security_title", "🛡️ Trạng Thái Bảo Mật"),
    ("security_on", "✅ Bật"),
    ("security_off", "❌ Tắt"),
    ("security_logs", "📋 Nhật ký gần đây"),
    ("feature_enabled", "✅ Đã **BẬT** {feature}!"),
    ("feature_disabled", "⚠️ Đã **TẮT** {feature}!"),
    ("blacklist_title", "📋 Danh sách từ cấm"),
    ("blacklist_empty", "ℹ️ Chưa có từ nào trong blacklist!"),
    ("blacklist_added", "✅ Đã thêm từ `{word}` vào blacklist!"),
    ("blacklist_removed", "✅ Đã xóa từ `{word}` khỏi blacklist!"),
    ("error_forbidden_timeout", "❌ Không có quyền timeout thành viên này!"),
    ("error_forbidden_kick", "❌ Không có quyền kick thành viên này!"),
    ("error_forbidden_ban", "❌ Không có quyền ban thành viên này!"),
    ("error_forbidden_unban", "❌ Không có quyền unban người dùng này!"),
    ("kick_success", "👢 {user} đã bị kick."),
    ("ban_success", "🔨 {user} đã bị ban."),
    ("unban_success", "✅ Đã unban {user}."),
    ("error_invalid_time", "❌ Format thời gian không hợp lệ! Dùng: 5m, 1h, 2h30m, etc."),
    ("error_prefix_long", "❌ Prefix không được dài quá 5 ký tự!"),
    ("error_bot_action", "❌ Không thể thực hiện hành động này với bot!"),
    ("error_no_permission", "❌ Bạn không có quyền sử dụng lệnh này!"),
    ("language_changed", "✅ Đã đổi ngôn ngữ sang **{language}**!"),
    ("logchannel_set", "✅ Đã đặt kênh log thành {channel}!"),
    ("logchannel_none", "ℹ️ Chưa đặt kênh log."),
    ("logchannel_current", "📋 Kênh log hiện tại: {channel}"),
];
