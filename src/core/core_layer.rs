// The core module contains all detection and response logic.
// Nothing in here knows about serenity - the Discord layer adapts events in
// and implements `PlatformActions` for the way out.

#[path = "storage/mod.rs"]
pub mod storage;

#[path = "tracking/mod.rs"]
pub mod tracking;

#[path = "policy/mod.rs"]
pub mod policy;

#[path = "localization/mod.rs"]
pub mod localization;

#[path = "security/mod.rs"]
pub mod security;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "response/mod.rs"]
pub mod response;

#[path = "dispatch/dispatcher.rs"]
pub mod dispatch;

#[cfg(test)]
#[path = "testing.rs"]
pub mod testing;
