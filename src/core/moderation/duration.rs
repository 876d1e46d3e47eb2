// Duration strings used by admin commands, e.g. "2h30m" or "90".

use crate::core::localization::Locale;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// The platform's longest timeout, in minutes (28 days).
pub const MAX_TIMEOUT_MINUTES: u32 = 40_320;

static DURATION_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)([dhms])").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("Invalid duration: {0}")]
    InvalidInput(String),
}

/// Parse into whole minutes. Units are d/h/m/s; a bare number means minutes.
/// Seconds round up, and the result is capped at `MAX_TIMEOUT_MINUTES`.
pub fn parse_duration(input: &str) -> Result<u32, DurationError> {
    let text = input.trim().to_lowercase();
    let invalid = || DurationError::InvalidInput(input.to_string());

    if text.is_empty() {
        return Err(invalid());
    }

    let total_seconds: u64 = if let Ok(minutes) = text.parse::<u64>() {
        minutes.saturating_mul(60)
    } else {
        // Every character must belong to a `<number><unit>` pair.
        let matched: usize = DURATION_PART
            .find_iter(&text)
            .map(|m| m.as_str().len())
            .sum();
        if matched != text.len() {
            return Err(invalid());
        }

        let mut seconds = 0u64;
        for caps in DURATION_PART.captures_iter(&text) {
            let value: u64 = caps[1].parse().map_err(|_| invalid())?;
            let unit = match &caps[2] {
                "d" => 86_400,
                "h" => 3_600,
                "m" => 60,
                _ => 1,
            };
            seconds = seconds.saturating_add(value.saturating_mul(unit));
        }
        seconds
    };

    if total_seconds == 0 {
        return Err(invalid());
    }

    let minutes = total_seconds.div_ceil(60);
    Ok(minutes.min(u64::from(MAX_TIMEOUT_MINUTES)) as u32)
}

/// Render minutes the way the locale reads them, largest two units only.
pub fn format_duration(minutes: u32, locale: Locale) -> String {
    let (day, hour, minute) = match locale {
        Locale::En => (("day", "days"), ("hour", "hours"), ("minute", "minutes")),
        Locale::Vi => (("ngày", "ngày"), ("giờ", "giờ"), ("phút", "phút")),
    };
    let unit = |value: u32, (one, many): (&str, &str)| {
        format!("{value} {}", if value == 1 { one } else { many })
    };

    if minutes < 60 {
        return unit(minutes, minute);
    }
    if minutes < 1_440 {
        let (hours, rest) = (minutes / 60, minutes % 60);
        return match rest {
            0 => unit(hours, hour),
            _ => format!("{} {}", unit(hours, hour), unit(rest, minute)),
        };
    }
    let (days, hours) = (minutes / 1_440, (minutes % 1_440) / 60);
    match hours {
        0 => unit(days, day),
        _ => format!("{} {}", unit(days, day), unit(hours, hour)),
    }
}
