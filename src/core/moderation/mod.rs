// Core moderation module - the warning ladder and admin duration helpers.
// Following the same pattern as the security module.

pub mod duration;
pub mod moderation_models;
pub mod moderation_service;

pub use duration::*;
pub use moderation_models::*;
pub use moderation_service::*;
