use thiserror::Error;

use habitual_store::StoreError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("external id must not be empty")]
    EmptyExternalId,

    #[error("unknown timezone `{input}`")]
    InvalidTimezone { input: String },

    #[error("invalid reminder time `{input}`: {reason}")]
    InvalidReminderTime { input: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl TrackerError {
    pub fn invalid_timezone(input: impl Into<String>) -> Self {
        Self::InvalidTimezone {
            input: input.into(),
        }
    }

    pub fn invalid_reminder(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReminderTime {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
