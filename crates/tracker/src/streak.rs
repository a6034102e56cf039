//! Streaks over sparse sets of calendar dates.

use chrono::NaiveDate;
use serde::Serialize;

use habitual_store::Checkin;

/// Consecutive days ending at the latest check-in, provided that check-in is
/// `today` or the day before.  Otherwise 0.
pub fn current_streak(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let Some(&latest) = sorted.first() else {
        return 0;
    };
    if latest != today && Some(latest) != today.pred_opt() {
        return 0;
    }

    let mut streak = 1;
    let mut expected = latest;
    for &date in &sorted[1..] {
        if Some(date) != expected.pred_opt() {
            break;
        }
        streak += 1;
        expected = date;
    }
    streak
}

/// Longest run of consecutive days anywhere in `dates`.
pub fn best_streak(dates: &[NaiveDate]) -> u32 {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    if sorted.is_empty() {
        return 0;
    }

    let mut best = 1;
    let mut run = 1;
    for pair in sorted.windows(2) {
        if (pair[1] - pair[0]).num_days() == 1 {
            run += 1;
            best = best.max(run);
        } else {
            run = 1;
        }
    }
    best
}

/// Summary of a user's history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub current_streak: u32,
    pub best_streak: u32,
    /// Most recent first.
    pub recent: Vec<Checkin>,
}

impl Stats {
    pub fn from_checkins(mut checkins: Vec<Checkin>, today: NaiveDate, recent_limit: usize) -> Self {
        if checkins.is_empty() {
            return Self::default();
        }

        checkins.sort_by(|a, b| b.date.cmp(&a.date));
        let dates: Vec<NaiveDate> = checkins.iter().map(|c| c.date).collect();
        let total = checkins.len();
        checkins.truncate(recent_limit);

        Self {
            total,
            current_streak: current_streak(&dates, today),
            best_streak: best_streak(&dates),
            recent: checkins,
        }
    }
}
