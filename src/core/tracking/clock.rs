use chrono::{DateTime, Utc};

/// Source of "now" for every time-windowed decision.
///
/// Detectors never call `Utc::now()` directly so tests can replay bursts and
/// skewed timestamps deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
