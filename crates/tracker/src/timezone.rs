use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{TrackerError, TrackerResult};

/// Abbreviations users commonly type, mapped to the IANA zone they mean.
/// Daylight-saving variants point at the same zone.
const SHORTCUTS: &[(&str, &str)] = &[
    ("CET", "Europe/Berlin"),
    ("CEST", "Europe/Berlin"),
    ("EST", "US/Eastern"),
    ("EDT", "US/Eastern"),
    ("CST", "US/Central"),
    ("CDT", "US/Central"),
    ("MST", "US/Mountain"),
    ("MDT", "US/Mountain"),
    ("PST", "US/Pacific"),
    ("PDT", "US/Pacific"),
    ("BST", "Europe/London"),
    ("JST", "Asia/Tokyo"),
    ("GMT", "GMT"),
    ("UTC", "UTC"),
    ("STOCKHOLM", "Europe/Stockholm"),
    ("SWEDEN", "Europe/Stockholm"),
];

/// Shortcut names, for help text.
pub fn shortcut_names() -> impl Iterator<Item = &'static str> {
    SHORTCUTS.iter().map(|(short, _)| *short)
}

/// Resolve user input to a zone: a known shortcut (any case) or an IANA name.
pub fn resolve_timezone(input: &str) -> TrackerResult<Tz> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::invalid_timezone(input));
    }

    let upper = trimmed.to_ascii_uppercase();
    let name = SHORTCUTS
        .iter()
        .find(|(short, _)| *short == upper)
        .map(|(_, zone)| *zone)
        .unwrap_or(trimmed);

    name.parse::<Tz>()
        .map_err(|_| TrackerError::invalid_timezone(trimmed))
}

/// Parse a zone name that came back from storage.  Missing or unreadable
/// names fall back to UTC.
pub fn stored_timezone(name: Option<&str>) -> Tz {
    match name {
        Some(name) => name.parse().unwrap_or_else(|_| {
            warn!(tz = name, "unrecognised stored timezone, using UTC");
            chrono_tz::UTC
        }),
        None => chrono_tz::UTC,
    }
}

/// The calendar date at `now` in `tz`.
pub fn local_date(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}
