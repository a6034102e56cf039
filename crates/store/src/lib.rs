//! Persistence for check-ins and per-user settings.
//!
//! Everything above this crate talks to a [`CheckinStore`].  Two backends
//! implement it: [`HostedStore`], a PostgREST database reached over HTTP, and
//! [`LocalFileStore`], JSON files on disk.  [`FallbackStore`] chains them so a
//! hosted outage degrades to the local files one call at a time.

pub mod error;
pub mod fallback;
pub mod hosted;
pub mod local;
pub mod model;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use habitual_config::{StorageBackend, StorageConfig};

pub use error::{StoreError, StoreResult};
pub use fallback::FallbackStore;
pub use hosted::HostedStore;
pub use local::LocalFileStore;
pub use model::{Checkin, Mood, User, UserUpdate};

// ── Storage contract ─────────────────────────────────────────────────────────

/// The storage contract shared by every backend.
///
/// Check-in operations take the resolved [`User`] rather than a bare id so
/// that each backend can key by whichever identifier it owns.
#[async_trait]
pub trait CheckinStore: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend_name(&self) -> &'static str;

    /// Existing user for `external_id`, or a new one with default settings.
    /// Repeated calls never create duplicates.
    async fn resolve_user(&self, external_id: &str, display_name: &str) -> StoreResult<User>;

    async fn get_user_timezone(&self, external_id: &str) -> StoreResult<Option<String>>;

    /// Apply every field of `update` in one write.
    async fn update_user(&self, external_id: &str, update: &UserUpdate) -> StoreResult<()>;

    async fn set_user_timezone(&self, external_id: &str, timezone: &str) -> StoreResult<()> {
        let update = UserUpdate {
            timezone: Some(timezone.to_string()),
            ..UserUpdate::default()
        };
        self.update_user(external_id, &update).await
    }

    /// `reminder` is a UTC time of day; `None` clears it.
    async fn set_user_reminder(
        &self,
        external_id: &str,
        reminder: Option<NaiveTime>,
    ) -> StoreResult<()> {
        let update = UserUpdate {
            reminder_time: Some(reminder),
            ..UserUpdate::default()
        };
        self.update_user(external_id, &update).await
    }

    async fn find_checkin(&self, user: &User, date: NaiveDate) -> StoreResult<Option<Checkin>>;

    /// Fails with [`StoreError::Duplicate`] when a record for `date` exists.
    async fn create_checkin(
        &self,
        user: &User,
        date: NaiveDate,
        message: Option<&str>,
        mood: Option<Mood>,
    ) -> StoreResult<Checkin>;

    /// Replaces message and mood of the record for `date`.  Returns `false`
    /// when there is no such record.
    async fn overwrite_checkin(
        &self,
        user: &User,
        date: NaiveDate,
        message: Option<&str>,
        mood: Option<Mood>,
    ) -> StoreResult<bool>;

    /// All check-ins of `user`, most recent date first.
    async fn list_checkins(&self, user: &User) -> StoreResult<Vec<Checkin>>;

    /// Users with a reminder time set.
    async fn users_with_reminders(&self) -> StoreResult<Vec<User>>;
}

/// Open the storage adapter selected by `config`.
///
/// Local-only when forced or when hosted credentials are missing; otherwise
/// the hosted backend wrapped in a [`FallbackStore`] over the local files.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn CheckinStore>> {
    let local = LocalFileStore::from_config(config);

    match config.effective_backend() {
        StorageBackend::Local => {
            info!(path = %local.checkins_path().display(), "storage: local files");
            Ok(Arc::new(local))
        }
        StorageBackend::Hosted => {
            let hosted = HostedStore::new(
                &config.hosted_url,
                &config.hosted_key,
                Duration::from_secs(config.request_timeout_secs),
            )?;
            info!(
                url = %config.hosted_url,
                fallback = %local.checkins_path().display(),
                "storage: hosted with local fallback"
            );
            Ok(Arc::new(FallbackStore::new(Arc::new(hosted), Arc::new(local))))
        }
    }
}
