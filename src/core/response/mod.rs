// Core response module - turns verdicts and escalations into platform actions.

pub mod platform;
pub mod response_executor;
pub mod security_responder;

pub use platform::*;
pub use response_executor::*;
pub use security_responder::*;
