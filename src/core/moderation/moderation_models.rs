// Moderation domain models - warning records and the escalation ladder.
//
// These are pure domain types with no Discord dependencies.
// The response layer turns an `Escalation` into platform actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest count that still has a ladder step. Anything above is an immediate ban.
pub const LADDER_TOP: usize = 10;

/// One warning. `count` is the record's 1-based position when it was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningRecord {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub reason: String,
}

/// What a warning count demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Counts 1-3: the notice is the whole punishment.
    Notice,
    Timeout { minutes: u32 },
    Kick,
    Ban { permanent: bool },
    /// Past the ladder: ban without the ladder message.
    ExcessiveBan,
}

impl Escalation {
    pub fn is_punitive(&self) -> bool {
        !matches!(self, Escalation::Notice)
    }
}

/// The fixed count -> action ladder.
pub fn escalation_for(count: usize) -> Escalation {
    match count {
        0..=3 => Escalation::Notice,
        4 => Escalation::Timeout { minutes: 5 },
        5 => Escalation::Timeout { minutes: 30 },
        6 => Escalation::Timeout { minutes: 60 },
        7 => Escalation::Timeout { minutes: 180 },
        8 => Escalation::Kick,
        9 => Escalation::Ban { permanent: false },
        10 => Escalation::Ban { permanent: true },
        _ => Escalation::ExcessiveBan,
    }
}

/// Text key of the ladder message for `count`, if the count is on the ladder.
pub fn ladder_message_key(count: usize) -> Option<String> {
    (1..=LADDER_TOP)
        .contains(&count)
        .then(|| format!("warn_level_{count}"))
}

/// Result of adding a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct WarningOutcome {
    pub count: usize,
    pub escalation: Escalation,
}
