// Core security module - detectors that turn tracked history into verdicts.
// Detectors only decide; `core::response` carries verdicts out.

pub mod automod_filter;
pub mod command_guard;
pub mod dm_guard;
pub mod nuke_detector;
pub mod raid_detector;
pub mod security_log;
pub mod security_models;
pub mod spam_detector;

pub use automod_filter::*;
pub use command_guard::*;
pub use dm_guard::*;
pub use nuke_detector::*;
pub use raid_detector::*;
pub use security_log::*;
pub use security_models::*;
pub use spam_detector::*;
