use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use habitual_config::BotConfig;
use habitual_store::{CheckinStore, StoreError, User, UserUpdate};

use crate::confirmation::{ConfirmationEvent, OverrideOutcome, PendingOverride};
use crate::error::{TrackerError, TrackerResult};
use crate::input::CheckinInput;
use crate::reminder::{self, ReminderSetting};
use crate::streak::Stats;
use crate::timezone::{local_date, resolve_timezone, stored_timezone};

const DEFAULT_CONFIRM_TIMEOUT: TimeDelta = TimeDelta::seconds(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(habitual_store::Checkin),
    /// A record already exists for the user's local date.  Nothing was
    /// written; the caller must confirm or drop the override.
    ConflictsWith(Box<PendingOverride>),
}

/// Check-in workflows over a [`CheckinStore`].
///
/// Every time-dependent operation takes `now` explicitly.  Callers pass
/// `Utc::now()`; tests pin it.
pub struct HabitTracker {
    store: Arc<dyn CheckinStore>,
    confirm_timeout: TimeDelta,
    recent_limit: usize,
}

impl HabitTracker {
    pub fn new(store: Arc<dyn CheckinStore>, config: &BotConfig) -> Self {
        let confirm_timeout = i64::try_from(config.confirm_timeout_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(DEFAULT_CONFIRM_TIMEOUT);
        Self {
            store,
            confirm_timeout,
            recent_limit: config.recent_limit,
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckinStore> {
        &self.store
    }

    pub fn confirm_timeout(&self) -> TimeDelta {
        self.confirm_timeout
    }

    pub async fn resolve_user(&self, external_id: &str, display_name: &str) -> TrackerResult<User> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(TrackerError::EmptyExternalId);
        }
        Ok(self.store.resolve_user(external_id, display_name).await?)
    }

    /// The user's zone as currently stored, UTC when unset.  A storage
    /// failure falls back to whatever the `User` record carried.
    pub async fn user_timezone(&self, user: &User) -> Tz {
        match self.store.get_user_timezone(&user.external_id).await {
            Ok(name) => stored_timezone(name.as_deref()),
            Err(err) => {
                warn!(user = %user.external_id, error = %err, "tracker: timezone lookup failed");
                stored_timezone(user.timezone.as_deref())
            }
        }
    }

    /// Today's date in the user's zone.
    pub async fn resolve_local_date(&self, user: &User, now: DateTime<Utc>) -> NaiveDate {
        local_date(self.user_timezone(user).await, now)
    }

    /// File a check-in for the user's local today, or report the conflict.
    pub async fn submit_checkin(
        &self,
        user: &User,
        input: CheckinInput,
        now: DateTime<Utc>,
    ) -> TrackerResult<SubmitOutcome> {
        let date = self.resolve_local_date(user, now).await;

        if let Some(existing) = self.store.find_checkin(user, date).await? {
            debug!(user = %user.external_id, %date, "tracker: check-in already exists");
            return Ok(self.conflict(user, date, existing, input, now));
        }

        match self
            .store
            .create_checkin(user, date, input.message.as_deref(), input.mood)
            .await
        {
            Ok(checkin) => {
                info!(
                    user = %user.external_id,
                    %date,
                    mood = ?checkin.mood.map(|m| m.value()),
                    "tracker: check-in recorded"
                );
                Ok(SubmitOutcome::Created(checkin))
            }
            // Another request filed the same day between our read and write.
            Err(StoreError::Duplicate { .. }) => match self.store.find_checkin(user, date).await? {
                Some(existing) => Ok(self.conflict(user, date, existing, input, now)),
                None => Err(StoreError::Duplicate { date }.into()),
            },
            Err(err) => Err(err.into()),
        }
    }

    fn conflict(
        &self,
        user: &User,
        date: NaiveDate,
        existing: habitual_store::Checkin,
        proposed: CheckinInput,
        now: DateTime<Utc>,
    ) -> SubmitOutcome {
        SubmitOutcome::ConflictsWith(Box::new(PendingOverride {
            user: user.clone(),
            date,
            existing,
            proposed,
            deadline: now
                .checked_add_signed(self.confirm_timeout)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }))
    }

    /// Overwrite today's record unconditionally.  Returns false when there is
    /// nothing to overwrite.
    pub async fn confirm_override(
        &self,
        user: &User,
        input: &CheckinInput,
        now: DateTime<Utc>,
    ) -> TrackerResult<bool> {
        let date = self.resolve_local_date(user, now).await;
        self.overwrite(user, date, input).await
    }

    async fn overwrite(
        &self,
        user: &User,
        date: NaiveDate,
        input: &CheckinInput,
    ) -> TrackerResult<bool> {
        let replaced = self
            .store
            .overwrite_checkin(user, date, input.message.as_deref(), input.mood)
            .await?;
        if replaced {
            info!(user = %user.external_id, %date, "tracker: check-in overwritten");
        } else {
            warn!(user = %user.external_id, %date, "tracker: nothing to overwrite");
        }
        Ok(replaced)
    }

    /// Drive a pending override to its terminal state.  An approval that
    /// arrives after the deadline counts as a timeout.
    pub async fn resolve_confirmation(
        &self,
        pending: &PendingOverride,
        event: ConfirmationEvent,
        now: DateTime<Utc>,
    ) -> TrackerResult<OverrideOutcome> {
        let event = match event {
            ConfirmationEvent::Approve if pending.is_expired(now) => ConfirmationEvent::Timeout,
            other => other,
        };

        match event {
            ConfirmationEvent::Approve => {
                if self.overwrite(&pending.user, pending.date, &pending.proposed).await? {
                    Ok(OverrideOutcome::Overwritten)
                } else {
                    Ok(OverrideOutcome::Missing)
                }
            }
            ConfirmationEvent::Decline => {
                debug!(user = %pending.user.external_id, date = %pending.date, "tracker: override declined");
                Ok(OverrideOutcome::Declined)
            }
            ConfirmationEvent::Timeout => {
                debug!(user = %pending.user.external_id, date = %pending.date, "tracker: override timed out");
                Ok(OverrideOutcome::TimedOut)
            }
        }
    }

    /// Totals, streaks, and recent entries.  Degrades to all zeros when the
    /// history cannot be read.
    pub async fn compute_stats(&self, user: &User, now: DateTime<Utc>) -> Stats {
        let today = self.resolve_local_date(user, now).await;
        match self.store.list_checkins(user).await {
            Ok(checkins) => Stats::from_checkins(checkins, today, self.recent_limit),
            Err(err) => {
                warn!(user = %user.external_id, error = %err, "tracker: stats unavailable");
                Stats::default()
            }
        }
    }

    pub async fn set_timezone(&self, user: &User, input: &str) -> TrackerResult<Tz> {
        let tz = resolve_timezone(input)?;
        self.store
            .set_user_timezone(&user.external_id, tz.name())
            .await?;
        info!(user = %user.external_id, tz = tz.name(), "tracker: timezone updated");
        Ok(tz)
    }

    /// Store a daily reminder.  With an explicit zone the user's timezone is
    /// updated too; otherwise the zone already on file is used.
    pub async fn set_reminder(
        &self,
        user: &User,
        time: &str,
        zone: Option<&str>,
        now: DateTime<Utc>,
    ) -> TrackerResult<ReminderSetting> {
        let tz = match zone {
            Some(zone) => resolve_timezone(zone)?,
            None => self.user_timezone(user).await,
        };
        let setting = reminder::reminder_setting(time, tz, now)?;

        let update = UserUpdate {
            timezone: zone.map(|_| tz.name().to_string()),
            reminder_time: Some(Some(setting.utc_time)),
        };
        self.store.update_user(&user.external_id, &update).await?;

        info!(
            user = %user.external_id,
            local = %setting.local_time,
            utc = %setting.utc_time,
            tz = tz.name(),
            "tracker: reminder set"
        );
        Ok(setting)
    }

    pub async fn clear_reminder(&self, user: &User) -> TrackerResult<()> {
        self.store.set_user_reminder(&user.external_id, None).await?;
        info!(user = %user.external_id, "tracker: reminder cleared");
        Ok(())
    }

    /// Users whose reminder falls in `(now - window, now]` and who have not
    /// checked in yet today.  Per-user lookup failures are logged and skipped.
    pub async fn due_reminders(
        &self,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> TrackerResult<Vec<User>> {
        let candidates = self.store.users_with_reminders().await?;
        let mut due = Vec::new();

        for user in candidates {
            let Some(at) = user.reminder_time else {
                continue;
            };
            if !reminder::is_due(at, now, window) {
                continue;
            }

            let today = local_date(stored_timezone(user.timezone.as_deref()), now);
            match self.store.find_checkin(&user, today).await {
                Ok(None) => due.push(user),
                Ok(Some(_)) => {
                    debug!(user = %user.external_id, "tracker: already checked in, skipping reminder");
                }
                Err(err) => {
                    warn!(user = %user.external_id, error = %err, "tracker: reminder check failed");
                }
            }
        }
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use async_trait::async_trait;
    use chrono::{Days, NaiveTime, TimeZone};
    use tempfile::TempDir;

    use habitual_store::{Checkin, LocalFileStore, Mood, StoreResult};

    use super::*;

    fn tracker(dir: &TempDir) -> HabitTracker {
        let store = LocalFileStore::new(
            dir.path().join("checkins.json"),
            dir.path().join("users.json"),
        );
        HabitTracker::new(Arc::new(store), &BotConfig::default())
    }

    /// Local files where another writer files the same day between the
    /// tracker's lookup and its create.
    struct RacingStore {
        inner: LocalFileStore,
    }

    #[async_trait]
    impl CheckinStore for RacingStore {
        fn backend_name(&self) -> &'static str {
            "racing"
        }
        async fn resolve_user(&self, external_id: &str, display_name: &str) -> StoreResult<User> {
            self.inner.resolve_user(external_id, display_name).await
        }
        async fn get_user_timezone(&self, external_id: &str) -> StoreResult<Option<String>> {
            self.inner.get_user_timezone(external_id).await
        }
        async fn update_user(&self, external_id: &str, update: &UserUpdate) -> StoreResult<()> {
            self.inner.update_user(external_id, update).await
        }
        async fn find_checkin(&self, user: &User, date: NaiveDate) -> StoreResult<Option<Checkin>> {
            self.inner.find_checkin(user, date).await
        }
        async fn create_checkin(
            &self,
            user: &User,
            date: NaiveDate,
            _: Option<&str>,
            _: Option<Mood>,
        ) -> StoreResult<Checkin> {
            self.inner
                .create_checkin(user, date, Some("from the other device"), Mood::new(2))
                .await?;
            Err(StoreError::Duplicate { date })
        }
        async fn overwrite_checkin(
            &self,
            user: &User,
            date: NaiveDate,
            message: Option<&str>,
            mood: Option<Mood>,
        ) -> StoreResult<bool> {
            self.inner.overwrite_checkin(user, date, message, mood).await
        }
        async fn list_checkins(&self, user: &User) -> StoreResult<Vec<Checkin>> {
            self.inner.list_checkins(user).await
        }
        async fn users_with_reminders(&self) -> StoreResult<Vec<User>> {
            self.inner.users_with_reminders().await
        }
    }

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn created(outcome: SubmitOutcome) -> habitual_store::Checkin {
        match outcome {
            SubmitOutcome::Created(checkin) => checkin,
            other => panic!("expected Created, got {other:?}"),
        }
    }

    fn conflict(outcome: SubmitOutcome) -> PendingOverride {
        match outcome {
            SubmitOutcome::ConflictsWith(pending) => *pending,
            other => panic!("expected ConflictsWith, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_external_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = tracker(&dir).resolve_user("  ", "nobody").await.unwrap_err();
        assert!(matches!(err, TrackerError::EmptyExternalId));
    }

    #[tokio::test]
    async fn first_checkin_is_created_for_local_today() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let now = noon(2024, 3, 1);

        let checkin = created(
            t.submit_checkin(&user, CheckinInput::parse("4 feeling okay"), now)
                .await
                .unwrap(),
        );
        assert_eq!(checkin.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(checkin.mood, Mood::new(4));
        assert_eq!(checkin.message.as_deref(), Some("feeling okay"));
    }

    #[tokio::test]
    async fn second_submission_conflicts_and_leaves_first_untouched() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let now = noon(2024, 3, 1);

        let first = created(
            t.submit_checkin(&user, CheckinInput::parse("2 rough"), now)
                .await
                .unwrap(),
        );
        let pending = conflict(
            t.submit_checkin(&user, CheckinInput::parse("5 better"), now)
                .await
                .unwrap(),
        );

        assert_eq!(pending.existing, first);
        assert_eq!(pending.proposed.mood, Mood::new(5));
        assert_eq!(pending.deadline, now + TimeDelta::seconds(30));

        let stored = t
            .store()
            .find_checkin(&user, pending.date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn approved_override_replaces_content_and_keeps_created_at() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let now = noon(2024, 3, 1);

        let first = created(
            t.submit_checkin(&user, CheckinInput::parse("2 rough"), now)
                .await
                .unwrap(),
        );
        let pending = conflict(
            t.submit_checkin(&user, CheckinInput::parse("5 better"), now)
                .await
                .unwrap(),
        );
        let outcome = t
            .resolve_confirmation(&pending, ConfirmationEvent::Approve, now + TimeDelta::seconds(5))
            .await
            .unwrap();
        assert_eq!(outcome, OverrideOutcome::Overwritten);

        let stored = t
            .store()
            .find_checkin(&user, pending.date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.mood, Mood::new(5));
        assert_eq!(stored.message.as_deref(), Some("better"));
        assert_eq!(stored.created_at, first.created_at);
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn declined_and_late_approvals_change_nothing() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let now = noon(2024, 3, 1);

        let first = created(
            t.submit_checkin(&user, CheckinInput::parse("3 meh"), now)
                .await
                .unwrap(),
        );
        let pending = conflict(
            t.submit_checkin(&user, CheckinInput::parse("1 worse"), now)
                .await
                .unwrap(),
        );

        let declined = t
            .resolve_confirmation(&pending, ConfirmationEvent::Decline, now)
            .await
            .unwrap();
        assert_eq!(declined, OverrideOutcome::Declined);

        let late = t
            .resolve_confirmation(&pending, ConfirmationEvent::Approve, now + TimeDelta::seconds(31))
            .await
            .unwrap();
        assert_eq!(late, OverrideOutcome::TimedOut);

        let stored = t
            .store()
            .find_checkin(&user, pending.date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn override_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let now = noon(2024, 3, 1);
        let input = CheckinInput::parse("4 steady");

        created(t.submit_checkin(&user, CheckinInput::parse("1 low"), now).await.unwrap());
        assert!(t.confirm_override(&user, &input, now).await.unwrap());
        let once = t.store().list_checkins(&user).await.unwrap();
        assert!(t.confirm_override(&user, &input, now).await.unwrap());
        let twice = t.store().list_checkins(&user).await.unwrap();

        assert_eq!(twice.len(), 1);
        assert_eq!(once[0].mood, twice[0].mood);
        assert_eq!(once[0].message, twice[0].message);
        assert_eq!(once[0].created_at, twice[0].created_at);
    }

    #[tokio::test]
    async fn override_without_record_reports_false() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let replaced = t
            .confirm_override(&user, &CheckinInput::parse("4"), noon(2024, 3, 1))
            .await
            .unwrap();
        assert!(!replaced);
    }

    #[tokio::test]
    async fn local_date_follows_user_timezone() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let late_evening_utc = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();

        assert_eq!(
            t.resolve_local_date(&user, late_evening_utc).await,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );

        let tz = t.set_timezone(&user, "JST").await.unwrap();
        assert_eq!(tz.name(), "Asia/Tokyo");
        assert_eq!(
            t.resolve_local_date(&user, late_evening_utc).await,
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );

        let checkin = created(
            t.submit_checkin(&user, CheckinInput::parse("5"), late_evening_utc)
                .await
                .unwrap(),
        );
        assert_eq!(checkin.date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[tokio::test]
    async fn invalid_timezone_leaves_setting_alone() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        t.set_timezone(&user, "Europe/Paris").await.unwrap();

        let err = t.set_timezone(&user, "Atlantis/Capital").await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTimezone { .. }));
        assert_eq!(
            t.store().get_user_timezone("42").await.unwrap().as_deref(),
            Some("Europe/Paris")
        );
    }

    #[tokio::test]
    async fn stats_reflect_history() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let today = noon(2024, 3, 10);

        for back in [0u64, 1, 2, 5, 6] {
            let day = today.checked_sub_days(Days::new(back)).unwrap();
            created(
                t.submit_checkin(&user, CheckinInput::parse("3"), day)
                    .await
                    .unwrap(),
            );
        }

        let stats = t.compute_stats(&user, today).await;
        assert_eq!(stats.total, 5);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.recent.len(), 5);
        assert_eq!(stats.recent[0].date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());

        let later = t.compute_stats(&user, noon(2024, 3, 12)).await;
        assert_eq!(later.current_streak, 0);
        assert_eq!(later.best_streak, 3);
    }

    #[tokio::test]
    async fn stats_for_new_user_are_zero() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("7", "new").await.unwrap();
        assert_eq!(t.compute_stats(&user, noon(2024, 3, 1)).await, Stats::default());
    }

    #[tokio::test]
    async fn stats_degrade_to_zero_when_history_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let now = noon(2024, 3, 1);
        created(t.submit_checkin(&user, CheckinInput::parse("4"), now).await.unwrap());

        fs::write(dir.path().join("checkins.json"), "{ not json").unwrap();
        assert!(t.store().list_checkins(&user).await.is_err());
        assert_eq!(t.compute_stats(&user, now).await, Stats::default());
    }

    #[tokio::test]
    async fn create_race_reports_conflict_with_the_winning_record() {
        let dir = TempDir::new().unwrap();
        let store = RacingStore {
            inner: LocalFileStore::new(
                dir.path().join("checkins.json"),
                dir.path().join("users.json"),
            ),
        };
        let t = HabitTracker::new(Arc::new(store), &BotConfig::default());
        let user = t.resolve_user("42", "ana").await.unwrap();
        let now = noon(2024, 3, 1);

        let pending = conflict(
            t.submit_checkin(&user, CheckinInput::parse("5 mine"), now)
                .await
                .unwrap(),
        );
        assert_eq!(pending.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(pending.existing.message.as_deref(), Some("from the other device"));
        assert_eq!(pending.proposed.message.as_deref(), Some("mine"));

        let outcome = t
            .resolve_confirmation(&pending, ConfirmationEvent::Approve, now)
            .await
            .unwrap();
        assert_eq!(outcome, OverrideOutcome::Overwritten);
        let stored = t.store().list_checkins(&user).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].mood, Mood::new(5));
    }

    #[test]
    fn oversized_confirm_timeout_falls_back_instead_of_panicking() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path().join("c.json"), dir.path().join("u.json"));
        let config = BotConfig {
            confirm_timeout_secs: u64::MAX,
            ..BotConfig::default()
        };
        let t = HabitTracker::new(Arc::new(store), &config);
        assert_eq!(t.confirm_timeout(), TimeDelta::seconds(30));

        let config = BotConfig {
            confirm_timeout_secs: i64::MAX as u64,
            ..BotConfig::default()
        };
        let store = LocalFileStore::new(dir.path().join("c.json"), dir.path().join("u.json"));
        let t = HabitTracker::new(Arc::new(store), &config);
        assert_eq!(t.confirm_timeout(), TimeDelta::seconds(30));
    }

    #[tokio::test]
    async fn deadline_saturates_for_long_timeouts() {
        let dir = TempDir::new().unwrap();
        let config = BotConfig {
            confirm_timeout_secs: (i64::MAX / 1_000) as u64,
            ..BotConfig::default()
        };
        let store = LocalFileStore::new(
            dir.path().join("checkins.json"),
            dir.path().join("users.json"),
        );
        let t = HabitTracker::new(Arc::new(store), &config);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let now = noon(2024, 3, 1);

        created(t.submit_checkin(&user, CheckinInput::parse("1"), now).await.unwrap());
        let pending = conflict(
            t.submit_checkin(&user, CheckinInput::parse("2"), now)
                .await
                .unwrap(),
        );
        assert_eq!(pending.deadline, DateTime::<Utc>::MAX_UTC);
        assert!(!pending.is_expired(now));
    }

    #[tokio::test]
    async fn users_do_not_see_each_other() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let ana = t.resolve_user("1", "ana").await.unwrap();
        let ben = t.resolve_user("2", "ben").await.unwrap();
        let now = noon(2024, 3, 1);

        created(t.submit_checkin(&ana, CheckinInput::parse("5"), now).await.unwrap());
        created(t.submit_checkin(&ben, CheckinInput::parse("1"), now).await.unwrap());

        assert_eq!(t.compute_stats(&ana, now).await.recent[0].mood, Mood::new(5));
        assert_eq!(t.compute_stats(&ben, now).await.recent[0].mood, Mood::new(1));
    }

    #[tokio::test]
    async fn reminder_with_zone_stores_utc_time_and_zone() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();

        let setting = t
            .set_reminder(&user, "20:00", Some("CET"), noon(2024, 1, 15))
            .await
            .unwrap();
        assert_eq!(setting.utc_time, NaiveTime::from_hms_opt(19, 0, 0).unwrap());
        assert_eq!(
            t.store().get_user_timezone("42").await.unwrap().as_deref(),
            Some("Europe/Berlin")
        );

        let users = t.store().users_with_reminders().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].reminder_time, Some(setting.utc_time));
    }

    #[tokio::test]
    async fn reminder_without_zone_uses_stored_zone() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        t.set_timezone(&user, "Asia/Tokyo").await.unwrap();

        let setting = t
            .set_reminder(&user, "9", None, noon(2024, 1, 15))
            .await
            .unwrap();
        assert_eq!(setting.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(setting.utc_time, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn bad_reminder_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();
        let now = noon(2024, 1, 15);

        assert!(matches!(
            t.set_reminder(&user, "25:00", None, now).await,
            Err(TrackerError::InvalidReminderTime { .. })
        ));
        assert!(matches!(
            t.set_reminder(&user, "08:00", Some("Nowhere"), now).await,
            Err(TrackerError::InvalidTimezone { .. })
        ));
        assert!(t.store().users_with_reminders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reminder_and_zone_are_written_together() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let user = t.resolve_user("42", "ana").await.unwrap();

        t.set_reminder(&user, "07:30", Some("PST"), noon(2024, 1, 15))
            .await
            .unwrap();

        let users = t.store().users_with_reminders().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].timezone.as_deref(), Some("US/Pacific"));
        assert_eq!(users[0].reminder_time, NaiveTime::from_hms_opt(15, 30, 0));
    }

    #[tokio::test]
    async fn due_reminders_skip_users_who_checked_in() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let ana = t.resolve_user("1", "ana").await.unwrap();
        let ben = t.resolve_user("2", "ben").await.unwrap();
        let set_at = noon(2024, 1, 15);

        t.set_reminder(&ana, "20:00", Some("UTC"), set_at).await.unwrap();
        t.set_reminder(&ben, "20:00", Some("UTC"), set_at).await.unwrap();

        let sweep = Utc.with_ymd_and_hms(2024, 1, 15, 20, 10, 0).unwrap();
        created(t.submit_checkin(&ben, CheckinInput::parse("4"), sweep).await.unwrap());

        let due = t.due_reminders(sweep, TimeDelta::minutes(30)).await.unwrap();
        let ids: Vec<_> = due.iter().map(|u| u.external_id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);

        let next = sweep + TimeDelta::minutes(30);
        assert!(t.due_reminders(next, TimeDelta::minutes(30)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleared_reminder_is_not_due() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let ana = t.resolve_user("1", "ana").await.unwrap();
        t.set_reminder(&ana, "20:00", Some("UTC"), noon(2024, 1, 15)).await.unwrap();
        t.clear_reminder(&ana).await.unwrap();

        let sweep = Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap();
        assert!(t.due_reminders(sweep, TimeDelta::minutes(30)).await.unwrap().is_empty());
    }
}
