use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Failures surfaced by a [`crate::CheckinStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or did not answer usefully.  The
    /// only variant that triggers the local-file fallback.
    #[error("{backend} storage unavailable: {message}")]
    BackendUnavailable {
        backend: &'static str,
        message: String,
    },

    #[error("a check-in already exists for {date}")]
    Duplicate { date: NaiveDate },

    #[error("{backend} storage rejected the request ({status}): {message}")]
    Rejected {
        backend: &'static str,
        status: u16,
        message: String,
    },

    #[error("local store file {} is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
}

impl StoreError {
    pub fn unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            message: message.into(),
        }
    }

    pub fn rejected(backend: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            backend,
            status,
            message: message.into(),
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
