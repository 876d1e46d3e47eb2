// Security feature: gateway translation, the serenity platform adapter and
// configuration commands.

pub mod commands;
pub mod events;
pub mod serenity_platform;

pub use serenity_platform::SerenityPlatform;
