//! JSON-file backend.
//!
//! Two files live side by side: `checkins.json` maps an external user id to
//! the user's check-ins, `users.json` maps it to the user's settings.  Every
//! mutation rewrites the affected file through a `.tmp` sibling and an atomic
//! rename.  Read-modify-write cycles hold an advisory lock on a `.lock`
//! sibling so a CLI invocation and a running bot can share the files.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use habitual_config::StorageConfig;

use crate::error::{StoreError, StoreResult};
use crate::model::{Checkin, Mood, User, UserUpdate};
use crate::CheckinStore;

const BACKEND: &str = "local";

/// Settings kept for a user in `users.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct LocalUser {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    reminder_time: Option<NaiveTime>,
}

impl LocalUser {
    fn to_user(&self, external_id: &str) -> User {
        User {
            id: external_id.to_string(),
            external_id: external_id.to_string(),
            display_name: self.display_name.clone(),
            timezone: self.timezone.clone(),
            reminder_time: self.reminder_time,
            backend: Some(BACKEND),
        }
    }
}

/// In-memory view of both files for the duration of one locked transaction.
#[derive(Debug, Default)]
struct Ledger {
    checkins: BTreeMap<String, Vec<Checkin>>,
    users: BTreeMap<String, LocalUser>,
    checkins_dirty: bool,
    users_dirty: bool,
}

impl Ledger {
    fn checkins_mut(&mut self) -> &mut BTreeMap<String, Vec<Checkin>> {
        self.checkins_dirty = true;
        &mut self.checkins
    }

    fn users_mut(&mut self) -> &mut BTreeMap<String, LocalUser> {
        self.users_dirty = true;
        &mut self.users
    }
}

#[derive(Debug, Clone)]
pub struct LocalFileStore {
    checkins_path: PathBuf,
    users_path: PathBuf,
}

impl LocalFileStore {
    pub fn new(checkins_path: impl Into<PathBuf>, users_path: impl Into<PathBuf>) -> Self {
        Self {
            checkins_path: checkins_path.into(),
            users_path: users_path.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.checkins_path(), config.users_path())
    }

    pub fn checkins_path(&self) -> &Path {
        &self.checkins_path
    }

    pub fn users_path(&self) -> &Path {
        &self.users_path
    }

    /// Run `op` against a freshly loaded ledger under the file lock, then
    /// persist whatever it touched.  File I/O runs on the blocking pool.
    async fn transact<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Ledger) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.transact_blocking(op))
            .await
            .map_err(|err| StoreError::unavailable(BACKEND, format!("storage task failed: {err}")))?
    }

    fn transact_blocking<T>(&self, op: impl FnOnce(&mut Ledger) -> StoreResult<T>) -> StoreResult<T> {
        let lock = self.acquire_lock()?;

        let mut ledger = Ledger {
            checkins: read_map(&self.checkins_path)?,
            users: read_map(&self.users_path)?,
            ..Ledger::default()
        };
        let out = op(&mut ledger)?;

        if ledger.checkins_dirty {
            write_atomic(&self.checkins_path, &ledger.checkins)?;
        }
        if ledger.users_dirty {
            write_atomic(&self.users_path, &ledger.users)?;
        }

        FileExt::unlock(&lock).map_err(io_unavailable)?;
        Ok(out)
    }

    fn acquire_lock(&self) -> StoreResult<File> {
        if let Some(parent) = self.checkins_path.parent() {
            fs::create_dir_all(parent).map_err(io_unavailable)?;
        }
        let lock_path = sibling(&self.checkins_path, "lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_unavailable)?;
        file.lock_exclusive().map_err(io_unavailable)?;
        Ok(file)
    }
}

#[async_trait]
impl CheckinStore for LocalFileStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn resolve_user(&self, external_id: &str, display_name: &str) -> StoreResult<User> {
        let external_id = external_id.to_string();
        let display_name = display_name.to_string();
        self.transact(move |ledger| {
            if let Some(existing) = ledger.users.get(&external_id) {
                if display_name.is_empty() || existing.display_name == display_name {
                    return Ok(existing.to_user(&external_id));
                }
            }
            let entry = ledger.users_mut().entry(external_id.clone()).or_default();
            if !display_name.is_empty() {
                entry.display_name = display_name;
            }
            debug!(external_id = %external_id, "local store: user upserted");
            Ok(entry.to_user(&external_id))
        })
        .await
    }

    async fn get_user_timezone(&self, external_id: &str) -> StoreResult<Option<String>> {
        let external_id = external_id.to_string();
        self.transact(move |ledger| {
            Ok(ledger
                .users
                .get(&external_id)
                .and_then(|user| user.timezone.clone()))
        })
        .await
    }

    async fn update_user(&self, external_id: &str, update: &UserUpdate) -> StoreResult<()> {
        let external_id = external_id.to_string();
        let update = update.clone();
        self.transact(move |ledger| {
            let entry = ledger.users_mut().entry(external_id).or_default();
            if let Some(timezone) = update.timezone {
                entry.timezone = Some(timezone);
            }
            if let Some(reminder) = update.reminder_time {
                entry.reminder_time = reminder;
            }
            Ok(())
        })
        .await
    }

    async fn find_checkin(&self, user: &User, date: NaiveDate) -> StoreResult<Option<Checkin>> {
        let key = user.external_id.clone();
        self.transact(move |ledger| {
            Ok(ledger
                .checkins
                .get(&key)
                .and_then(|entries| entries.iter().find(|c| c.date == date))
                .cloned())
        })
        .await
    }

    async fn create_checkin(
        &self,
        user: &User,
        date: NaiveDate,
        message: Option<&str>,
        mood: Option<Mood>,
    ) -> StoreResult<Checkin> {
        let key = user.external_id.clone();
        let message = message.map(str::to_string);
        self.transact(move |ledger| {
            let exists = ledger
                .checkins
                .get(&key)
                .is_some_and(|entries| entries.iter().any(|c| c.date == date));
            if exists {
                return Err(StoreError::Duplicate { date });
            }
            let checkin = Checkin::new(date, message, mood, Utc::now());
            ledger
                .checkins_mut()
                .entry(key)
                .or_default()
                .push(checkin.clone());
            Ok(checkin)
        })
        .await
    }

    async fn overwrite_checkin(
        &self,
        user: &User,
        date: NaiveDate,
        message: Option<&str>,
        mood: Option<Mood>,
    ) -> StoreResult<bool> {
        let key = user.external_id.clone();
        let message = message.map(str::to_string);
        self.transact(move |ledger| {
            let found = ledger
                .checkins
                .get(&key)
                .is_some_and(|entries| entries.iter().any(|c| c.date == date));
            if !found {
                return Ok(false);
            }
            let entries = ledger.checkins_mut().entry(key).or_default();
            if let Some(checkin) = entries.iter_mut().find(|c| c.date == date) {
                checkin.message = message;
                checkin.mood = mood;
                checkin.updated_at = Some(Utc::now());
            }
            Ok(true)
        })
        .await
    }

    async fn list_checkins(&self, user: &User) -> StoreResult<Vec<Checkin>> {
        let key = user.external_id.clone();
        self.transact(move |ledger| {
            let mut entries = ledger.checkins.get(&key).cloned().unwrap_or_default();
            entries.sort_by(|a, b| b.date.cmp(&a.date));
            Ok(entries)
        })
        .await
    }

    async fn users_with_reminders(&self) -> StoreResult<Vec<User>> {
        self.transact(|ledger| {
            Ok(ledger
                .users
                .iter()
                .filter(|(_, user)| user.reminder_time.is_some())
                .map(|(external_id, user)| user.to_user(external_id))
                .collect())
        })
        .await
    }
}

// ── File helpers ─────────────────────────────────────────────────────────────

fn io_unavailable(err: std::io::Error) -> StoreError {
    StoreError::unavailable(BACKEND, err.to_string())
}

/// `path` with `.{suffix}` appended to the full file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "checkins.json".to_string());
    path.with_file_name(format!("{filename}.{suffix}"))
}

fn read_map<V: DeserializeOwned>(path: &Path) -> StoreResult<BTreeMap<String, V>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(io_unavailable(err)),
    };
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&raw).map_err(|err| StoreError::corrupt(path, err.to_string()))
}

/// Write `value` as pretty JSON to a `.tmp` sibling, fsync, then rename over
/// `path`.  The `.tmp` file is removed on any error path.
fn write_atomic<V: Serialize>(path: &Path, value: &V) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_unavailable)?;
    }
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| StoreError::corrupt(path, err.to_string()))?;
    let tmp_path = sibling(path, "tmp");

    let write_result = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(rendered.as_bytes())?;
        file.flush()?;
        file.sync_all()
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_unavailable(err));
    }
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_unavailable(err));
    }
    Ok(())
}
