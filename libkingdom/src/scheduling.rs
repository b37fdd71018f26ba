//! Schedule expression parsing
//!
//! Turns human-readable schedule strings into a UTC timestamp for
//! [`Scheduler::schedule`](crate::scheduler::Scheduler::schedule).

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::error::ValidationError;

const MIN_RANDOM_SECONDS: i64 = 30;
const MAX_RANDOM_SECONDS: i64 = 30 * 24 * 3600;

type ParseResult<T> = std::result::Result<T, ValidationError>;

/// Resolve a schedule expression relative to `now`
///
/// Accepted forms:
/// - Relative durations: "90s", "30m", "2h", "1 day"
/// - Natural language: "tomorrow", "next friday 9am", "2025-12-24 18:00"
/// - Random windows: "random:10m-2h" (a uniformly random offset, counted from
///   `after` when given, else from `now`)
///
/// # Errors
///
/// Returns `ValidationError::InvalidSchedule` for unrecognised input or an
/// out-of-range random window.
pub fn parse_schedule(
    input: &str,
    now: DateTime<Utc>,
    after: Option<DateTime<Utc>>,
) -> ParseResult<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::InvalidSchedule(
            "schedule cannot be empty".to_string(),
        ));
    }

    if let Some(window) = input.strip_prefix("random:") {
        return parse_random_window(window, after.unwrap_or(now));
    }

    if let Ok(duration) = parse_duration(input) {
        return offset_from(now, duration);
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us)
        .map_err(|_| ValidationError::InvalidSchedule(format!("unrecognised time '{}'", input)))
}

fn parse_duration(input: &str) -> ParseResult<Duration> {
    let std_duration = humantime::parse_duration(input)
        .map_err(|e| ValidationError::InvalidSchedule(e.to_string()))?;

    Duration::from_std(std_duration)
        .map_err(|_| ValidationError::InvalidSchedule("duration out of range".to_string()))
}

fn parse_random_window(window: &str, base: DateTime<Utc>) -> ParseResult<DateTime<Utc>> {
    let (min, max) = window.split_once('-').ok_or_else(|| {
        ValidationError::InvalidSchedule("random window must look like MIN-MAX".to_string())
    })?;

    let min_secs = parse_duration(min.trim())?.num_seconds();
    let max_secs = parse_duration(max.trim())?.num_seconds();

    if min_secs < MIN_RANDOM_SECONDS {
        return Err(ValidationError::InvalidSchedule(format!(
            "random window minimum must be at least {} seconds",
            MIN_RANDOM_SECONDS
        )));
    }
    if max_secs > MAX_RANDOM_SECONDS {
        return Err(ValidationError::InvalidSchedule(format!(
            "random window maximum must be at most {} days",
            MAX_RANDOM_SECONDS / (24 * 3600)
        )));
    }
    if min_secs >= max_secs {
        return Err(ValidationError::InvalidSchedule(
            "random window minimum must be below its maximum".to_string(),
        ));
    }

    let offset = rand::thread_rng().gen_range(min_secs..=max_secs);
    offset_from(base, Duration::seconds(offset))
}

fn offset_from(base: DateTime<Utc>, offset: Duration) -> ParseResult<DateTime<Utc>> {
    base.checked_add_signed(offset).ok_or_else(|| {
        ValidationError::InvalidSchedule("schedule too far in the future".to_string())
    })
}
