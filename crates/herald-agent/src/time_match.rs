use chrono::{DateTime, NaiveTime, TimeZone, Timelike};

/// Default tolerance around the preferred posting time, in minutes.
pub const DEFAULT_TOLERANCE_MINUTES: u32 = 5;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse an "HH:MM" posting time.
pub fn parse_posting_time(preferred: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(preferred.trim(), "%H:%M").ok()
}

/// Whether `now` is within the default window of `preferred`.
pub fn matches<Tz: TimeZone>(now: &DateTime<Tz>, preferred: &str) -> bool {
    matches_within(now, preferred, DEFAULT_TOLERANCE_MINUTES)
}

/// Whether `now` is within `tolerance_minutes` of `preferred` ("HH:MM").
///
/// Distance is measured on a 24-hour clock and wraps at midnight, so the
/// window is symmetric around the preferred time. Invalid input never matches.
pub fn matches_within<Tz: TimeZone>(now: &DateTime<Tz>, preferred: &str, tolerance_minutes: u32) -> bool {
    let Some(target) = parse_posting_time(preferred) else {
        return false;
    };

    let current = now.hour() * 60 + now.minute();
    let wanted = target.hour() * 60 + target.minute();

    if current == wanted {
        return true;
    }

    clock_distance(current, wanted) <= tolerance_minutes
}

/// Shortest distance in minutes between two minute-of-day values.
fn clock_distance(a: u32, b: u32) -> u32 {
    let diff = a.abs_diff(b);
    diff.min(MINUTES_PER_DAY - diff)
}
