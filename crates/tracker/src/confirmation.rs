use chrono::{DateTime, NaiveDate, Utc};

use habitual_store::{Checkin, User};

use crate::input::CheckinInput;

/// A check-in that collided with an existing record for the same date and is
/// waiting for the user to approve the overwrite.
///
/// The date is captured when the conflict is detected so an approval that
/// lands after local midnight still targets the original day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOverride {
    pub user: User,
    pub date: NaiveDate,
    pub existing: Checkin,
    pub proposed: CheckinInput,
    pub deadline: DateTime<Utc>,
}

impl PendingOverride {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationEvent {
    Approve,
    Decline,
    Timeout,
}

impl ConfirmationEvent {
    /// Interpret a chat reply.  Anything unrecognised is not a confirmation.
    pub fn from_reply(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "/yes" | "yes" | "y" | "✅" => Some(Self::Approve),
            "/no" | "no" | "n" | "❌" => Some(Self::Decline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideOutcome {
    Overwritten,
    Declined,
    TimedOut,
    /// The record disappeared between the conflict and the approval.
    Missing,
}
