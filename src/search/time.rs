// Timestamp normalization for the search API's `start_time` / `end_time`.
//
// The API only accepts `YYYY-MM-DDTHH:MM:SSZ`. Users type dates in whatever
// shape is convenient, so this module maps the common ones onto that format.
// Everything is UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use super::SearchError;

/// The one textual format the API accepts.
pub const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Normalize a date/time string relative to the current time.
///
/// See [`normalize_timestamp_at`] for the accepted shapes.
pub fn normalize_timestamp(input: &str) -> Result<String, SearchError> {
    normalize_timestamp_at(input, Utc::now())
}

/// Normalize a date/time string, resolving relative shorthands against `now`.
///
/// Accepted shapes:
/// - `YYYYMMDDHHMM`
/// - `YYYY-MM-DD` (midnight)
/// - `YYYY-MM-DD HH:MM` and `YYYY-MM-DDTHH:MM`, optionally with `:SS`
/// - `YYYY-MM-DDTHH:MM:SSZ` (already normalized)
/// - `<N>d`, `<N>h`, `<N>m`: N days, hours, or minutes before `now`
pub fn normalize_timestamp_at(input: &str, now: DateTime<Utc>) -> Result<String, SearchError> {
    let trimmed = input.trim();
    let invalid = || SearchError::InvalidTimestamp(input.to_string());

    let resolved = if let Some(offset) = parse_relative(trimmed) {
        now.checked_sub_signed(offset).ok_or_else(invalid)?.naive_utc()
    } else if !trimmed.contains(['-', ':']) {
        parse_compact(trimmed).ok_or_else(invalid)?
    } else {
        parse_dashed(trimmed).ok_or_else(invalid)?
    };

    Ok(resolved.format(API_TIMESTAMP_FORMAT).to_string())
}

/// Parse `<digits><unit>` where unit is one of `d`, `h`, `m`.
///
/// Anything else (including an empty number or trailing junk) is not a
/// relative shorthand and falls through to the absolute parsers.
fn parse_relative(s: &str) -> Option<TimeDelta> {
    let unit = s.chars().last()?;
    let digits = &s[..s.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: i64 = digits.parse().ok()?;
    match unit {
        'd' => TimeDelta::try_days(n),
        'h' => TimeDelta::try_hours(n),
        'm' => TimeDelta::try_minutes(n),
        _ => None,
    }
}

/// `YYYYMMDDHHMM`: exactly twelve digits.
fn parse_compact(s: &str) -> Option<NaiveDateTime> {
    if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| s[range].parse::<u32>().ok();
    let year = s[0..4].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?
        .and_hms_opt(field(8..10)?, field(10..12)?, 0)
}

fn parse_dashed(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, API_TIMESTAMP_FORMAT) {
        return Some(dt);
    }

    // A 'T' separator is treated the same as a space.
    let spaced = s.replacen('T', " ", 1);
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&spaced, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
