//! Daily reminder times.
//!
//! Users give a local wall-clock time; it is stored as a UTC time of day so
//! the sweep can compare against `Utc::now()` without per-user conversion.
//! The UTC value is computed against the offset in force on the day the
//! reminder was set, so it drifts by an hour across DST changes.

use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{TrackerError, TrackerResult};
use crate::timezone::local_date;

const SECONDS_PER_DAY: i64 = 86_400;

/// A parsed reminder, ready to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSetting {
    pub local_time: NaiveTime,
    pub timezone: Tz,
    pub utc_time: NaiveTime,
}

/// Parse `HH:MM` or a bare hour `HH`, 24-hour clock.
pub fn parse_time_of_day(raw: &str) -> TrackerResult<NaiveTime> {
    let trimmed = raw.trim();
    let (hour, minute) = match trimmed.split_once(':') {
        Some((h, m)) => (h, m),
        None => (trimmed, "0"),
    };

    let hour: u32 = hour
        .parse()
        .map_err(|_| TrackerError::invalid_reminder(raw, "expected HH:MM (24-hour)"))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| TrackerError::invalid_reminder(raw, "expected HH:MM (24-hour)"))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| TrackerError::invalid_reminder(raw, "hour must be 0-23 and minute 0-59"))
}

/// Convert a local time in `tz` to UTC using the offset in force today.
///
/// Ambiguous local times (the repeated hour when clocks go back) take the
/// earlier instant.  Local times skipped by a spring-forward are rejected.
pub fn to_utc(local: NaiveTime, tz: Tz, now: DateTime<Utc>) -> TrackerResult<NaiveTime> {
    let date = local_date(tz, now);
    let instant = tz
        .from_local_datetime(&date.and_time(local))
        .earliest()
        .ok_or_else(|| {
            TrackerError::invalid_reminder(
                local.format("%H:%M").to_string(),
                format!("does not exist in {} on {date}", tz.name()),
            )
        })?;
    Ok(instant.with_timezone(&Utc).time())
}

pub fn reminder_setting(
    raw_time: &str,
    tz: Tz,
    now: DateTime<Utc>,
) -> TrackerResult<ReminderSetting> {
    let local_time = parse_time_of_day(raw_time)?;
    let utc_time = to_utc(local_time, tz, now)?;
    Ok(ReminderSetting {
        local_time,
        timezone: tz,
        utc_time,
    })
}

/// The reminder fires on the sweep whose window `(now - window, now]`
/// contains it.  The window wraps midnight, so sweeps spaced exactly
/// `window` apart fire each reminder once per day.
pub fn is_due(reminder_utc: NaiveTime, now: DateTime<Utc>, window: TimeDelta) -> bool {
    let window = window.num_seconds();
    if window <= 0 {
        return false;
    }
    if window >= SECONDS_PER_DAY {
        return true;
    }

    let now_secs = i64::from(now.time().num_seconds_from_midnight());
    let at_secs = i64::from(reminder_utc.num_seconds_from_midnight());
    let elapsed = (now_secs - at_secs).rem_euclid(SECONDS_PER_DAY);
    elapsed < window
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn parse_accepts_hour_and_minute_forms() {
        assert_eq!(parse_time_of_day("20:30").unwrap(), hm(20, 30));
        assert_eq!(parse_time_of_day("7").unwrap(), hm(7, 0));
        assert_eq!(parse_time_of_day(" 09:05 ").unwrap(), hm(9, 5));
        assert_eq!(parse_time_of_day("0:00").unwrap(), hm(0, 0));
    }

    #[test]
    fn parse_rejects_out_of_range_and_garbage() {
        for raw in ["24:00", "12:60", "noon", "", "8pm", "12:3x", "-1"] {
            assert!(
                matches!(parse_time_of_day(raw), Err(TrackerError::InvalidReminderTime { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn to_utc_uses_todays_offset() {
        // Stockholm is UTC+1 in winter and UTC+2 in summer.
        let winter = at(2024, 1, 15, 12, 0);
        let summer = at(2024, 7, 15, 12, 0);
        let tz = chrono_tz::Europe::Stockholm;
        assert_eq!(to_utc(hm(20, 0), tz, winter).unwrap(), hm(19, 0));
        assert_eq!(to_utc(hm(20, 0), tz, summer).unwrap(), hm(18, 0));
    }

    #[test]
    fn to_utc_wraps_past_midnight() {
        let now = at(2024, 1, 15, 12, 0);
        assert_eq!(to_utc(hm(20, 0), chrono_tz::US::Pacific, now).unwrap(), hm(4, 0));
    }

    #[test]
    fn to_utc_rejects_skipped_local_time() {
        // Clocks in Berlin jump 02:00 -> 03:00 on 31 March 2024.
        let now = at(2024, 3, 31, 10, 0);
        assert!(to_utc(hm(2, 30), chrono_tz::Europe::Berlin, now).is_err());
    }

    #[test]
    fn due_window_is_half_open() {
        let window = TimeDelta::minutes(30);
        let reminder = hm(20, 0);
        assert!(is_due(reminder, at(2024, 3, 1, 20, 0), window));
        assert!(is_due(reminder, at(2024, 3, 1, 20, 29), window));
        assert!(!is_due(reminder, at(2024, 3, 1, 20, 30), window));
        assert!(!is_due(reminder, at(2024, 3, 1, 19, 59), window));
    }

    #[test]
    fn due_window_wraps_midnight() {
        let window = TimeDelta::minutes(30);
        assert!(is_due(hm(23, 50), at(2024, 3, 2, 0, 10), window));
        assert!(!is_due(hm(0, 20), at(2024, 3, 1, 23, 55), window));
    }

    #[test]
    fn consecutive_sweeps_fire_once() {
        let window = TimeDelta::minutes(30);
        let reminder = hm(8, 15);
        let fired = (0..48)
            .map(|i| at(2024, 3, 1, 0, 0) + TimeDelta::minutes(30 * i))
            .filter(|&now| is_due(reminder, now, window))
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn degenerate_windows() {
        let now = at(2024, 3, 1, 12, 0);
        assert!(!is_due(hm(12, 0), now, TimeDelta::zero()));
        assert!(is_due(hm(3, 0), now, TimeDelta::days(1)));
    }
}
