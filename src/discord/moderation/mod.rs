// Moderation feature: warnings, timeouts, kicks and bans.

pub mod commands;
