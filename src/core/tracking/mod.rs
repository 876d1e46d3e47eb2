// Window tracking - capped per-key event histories that every detector reads.

pub mod clock;
pub mod tracking_models;
pub mod window_tracker;

pub use clock::*;
pub use tracking_models::*;
pub use window_tracker::*;
