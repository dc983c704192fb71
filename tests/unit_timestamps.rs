// Unit tests for timestamp normalization.
//
// Absolute shapes must agree with each other; relative shorthands resolve
// against an injected `now`.

use chrono::{TimeZone, Utc};
use snowbot::search::time::{normalize_timestamp, normalize_timestamp_at};
use snowbot::search::SearchError;

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap()
}

// ============================================================
// Absolute shapes
// ============================================================

#[test]
fn equivalent_absolute_inputs_agree() {
    let expected = "2017-08-02T00:00:00Z";
    for input in ["201708020000", "2017-08-02 00:00", "2017-08-02T00:00", "2017-08-02"] {
        assert_eq!(normalize_timestamp(input).unwrap(), expected, "input {input}");
    }
}

#[test]
fn compact_form_keeps_time() {
    assert_eq!(
        normalize_timestamp("201708021345").unwrap(),
        "2017-08-02T13:45:00Z"
    );
}

#[test]
fn seconds_are_kept() {
    assert_eq!(
        normalize_timestamp("2021-01-01T06:07:08").unwrap(),
        "2021-01-01T06:07:08Z"
    );
    assert_eq!(
        normalize_timestamp("2021-01-01 06:07:08").unwrap(),
        "2021-01-01T06:07:08Z"
    );
}

#[test]
fn canonical_form_is_unchanged() {
    let canonical = "2020-02-29T23:59:59Z";
    assert_eq!(normalize_timestamp(canonical).unwrap(), canonical);
}

#[test]
fn surrounding_whitespace_ignored() {
    assert_eq!(
        normalize_timestamp("  2017-08-02  ").unwrap(),
        "2017-08-02T00:00:00Z"
    );
}

// ============================================================
// Relative shorthands
// ============================================================

#[test]
fn relative_days() {
    assert_eq!(
        normalize_timestamp_at("3d", fixed_now()).unwrap(),
        "2024-01-12T12:30:00Z"
    );
}

#[test]
fn relative_hours() {
    assert_eq!(
        normalize_timestamp_at("12h", fixed_now()).unwrap(),
        "2024-01-15T00:30:00Z"
    );
}

#[test]
fn relative_minutes() {
    assert_eq!(
        normalize_timestamp_at("15m", fixed_now()).unwrap(),
        "2024-01-15T12:15:00Z"
    );
}

#[test]
fn relative_zero_is_now() {
    assert_eq!(
        normalize_timestamp_at("0h", fixed_now()).unwrap(),
        "2024-01-15T12:30:00Z"
    );
}

// ============================================================
// Rejections
// ============================================================

#[test]
fn garbage_is_rejected() {
    for input in ["yesterday", "", "2017/08/02", "3w", "h", "2017-13-01"] {
        assert_eq!(
            normalize_timestamp(input),
            Err(SearchError::InvalidTimestamp(input.to_string())),
            "input {input:?}"
        );
    }
}
