//! Due-date normalization.
//!
//! A task can carry its due date under several field names and in several
//! shapes. Only the first *present* candidate field (see
//! [`DueField::PRECEDENCE`]) is consulted. A present but malformed value is
//! reported as unparseable; later fields are never tried in its place.
//!
//! Accepted shapes for that value:
//!   * string containing `T`: combined date-time (RFC 3339, or naive local)
//!   * string of digits: epoch milliseconds
//!   * any other string: a handful of common date layouts
//!   * `[y, m, d, h?, mi?, s?]` with a 1-based month: local calendar time
//!   * `{year, month, day, hour?, minute?, second?}`: local calendar time

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::DateUnparseable;
use crate::model::{DueDateFields, DueField, Task};

/// Digit strings below this are taken to be seconds, not milliseconds
/// (1973-03-03T09:46:40Z), and rejected.
pub const MIN_EPOCH_MILLIS: i64 = 100_000_000_000;

const COMBINED_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%b %d, %Y, %I:%M %p",
    "%b %d, %Y %H:%M",
    "%B %d, %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

// ─── Public API ───────────────────────────────────────────────────────────────

/// Parse a task's due date, reading naive values in the local time zone.
pub fn parse_due(task: &Task) -> Result<DateTime<Utc>, DateUnparseable> {
    normalize(&task.due)
}

pub fn normalize(fields: &DueDateFields) -> Result<DateTime<Utc>, DateUnparseable> {
    normalize_in(fields, &Local)
}

/// Same as [`normalize`] with naive values read in `tz`.
pub fn normalize_in<Tz: TimeZone>(
    fields: &DueDateFields,
    tz:     &Tz,
) -> Result<DateTime<Utc>, DateUnparseable> {
    let (field, value) = first_present(fields).ok_or(DateUnparseable::Absent)?;
    parse_value(value, tz).ok_or_else(|| DateUnparseable::Malformed {
        field,
        value: describe(value),
    })
}

/// The candidate that decides the due date: first non-null, non-blank field.
pub fn first_present(fields: &DueDateFields) -> Option<(DueField, &Value)> {
    DueField::PRECEDENCE.into_iter().find_map(|field| {
        fields.get(field).filter(|v| is_present(v)).map(|v| (field, v))
    })
}

pub fn parse_value<Tz: TimeZone>(value: &Value, tz: &Tz) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_text(s.trim(), tz),
        Value::Array(parts) => parse_parts(parts, tz),
        Value::Object(map) => parse_components(map, tz),
        _ => None,
    }
}

// ─── Shapes ───────────────────────────────────────────────────────────────────

fn parse_text<Tz: TimeZone>(s: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return parse_epoch_millis(s);
    }
    if s.contains('T') {
        if let Some(dt) = parse_combined(s, tz) {
            return Some(dt);
        }
    }
    parse_generic(s, tz)
}

fn parse_epoch_millis(s: &str) -> Option<DateTime<Utc>> {
    let ms: i64 = s.parse().ok()?;
    if ms < MIN_EPOCH_MILLIS {
        return None;
    }
    DateTime::from_timestamp_millis(ms)
}

fn parse_combined<Tz: TimeZone>(s: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    COMBINED_FORMATS.iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .and_then(|naive| resolve_local(tz, naive))
}

fn parse_generic<Tz: TimeZone>(s: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = DATE_TIME_FORMATS.iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return resolve_local(tz, naive);
    }
    DATE_FORMATS.iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| resolve_local(tz, naive))
}

/// `[year, month, day, hour?, minute?, second?]`; anything past the sixth
/// element is ignored.
fn parse_parts<Tz: TimeZone>(parts: &[Value], tz: &Tz) -> Option<DateTime<Utc>> {
    if parts.len() < 3 {
        return None;
    }
    let nums: Vec<i64> = parts.iter().take(6).map(Value::as_i64).collect::<Option<_>>()?;
    let at = |i: usize| nums.get(i).copied().unwrap_or(0);
    from_calendar(tz, [nums[0], nums[1], nums[2], at(3), at(4), at(5)])
}

fn parse_components<Tz: TimeZone>(map: &Map<String, Value>, tz: &Tz) -> Option<DateTime<Utc>> {
    let required = |key: &str| map.get(key).and_then(Value::as_i64);
    let optional = |key: &str| match map.get(key) {
        None | Some(Value::Null) => Some(0),
        Some(v) => v.as_i64(),
    };
    from_calendar(tz, [
        required("year")?,
        required("month")?,
        required("day")?,
        optional("hour")?,
        optional("minute")?,
        optional("second")?,
    ])
}

// ─── Calendar helpers ─────────────────────────────────────────────────────────

/// `[year, month (1-based), day, hour, minute, second]`; out-of-range parts
/// are rejected rather than rolled over.
fn from_calendar<Tz: TimeZone>(tz: &Tz, parts: [i64; 6]) -> Option<DateTime<Utc>> {
    let [year, month, day, hour, minute, second] = parts;
    let small = |n: i64| u32::try_from(n).ok();
    let naive = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, small(month)?, small(day)?)?
        .and_hms_opt(small(hour)?, small(minute)?, small(second)?)?;
    resolve_local(tz, naive)
}

/// Fold → earlier instant. Gap → shifted forward an hour.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    let local = tz.from_local_datetime(&naive).earliest().or_else(|| {
        let shifted = naive.checked_add_signed(Duration::hours(1))?;
        tz.from_local_datetime(&shifted).earliest()
    })?;
    Some(local.with_timezone(&Utc))
}

/// Whitespace-only strings count as absent, so a blank field never shadows
/// a real date further down the precedence list.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
