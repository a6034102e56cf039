//! Habit check-in workflows: filing a day's check-in against the user's local
//! calendar, the confirm-to-overwrite flow, streak statistics, timezones and
//! daily reminders.

pub mod confirmation;
pub mod error;
pub mod input;
pub mod reminder;
pub mod streak;
pub mod timezone;
pub mod tracker;

pub use confirmation::{ConfirmationEvent, OverrideOutcome, PendingOverride};
pub use error::{TrackerError, TrackerResult};
pub use input::CheckinInput;
pub use reminder::{is_due, parse_time_of_day, ReminderSetting};
pub use streak::{best_streak, current_streak, Stats};
pub use timezone::{local_date, resolve_timezone, shortcut_names};
pub use tracker::{HabitTracker, SubmitOutcome};
