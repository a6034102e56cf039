use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

// ── Storage backend ───────────────────────────────────────────────────────────

/// Which storage adapter the process opens at startup.
///
/// | Backend  | Behaviour                                                        |
/// |----------|------------------------------------------------------------------|
/// | `hosted` | Hosted database first; each failed call retries on the local file.|
/// | `local`  | Local JSON files only.                                           |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Hosted,
    Local,
}

/// Upper bound for `bot.confirm_timeout_secs`: one day.
pub const MAX_CONFIRM_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub name: String,
    /// How long an override confirmation stays open before it counts as a
    /// decline.
    pub confirm_timeout_secs: u64,
    /// Number of check-ins returned in the "recent" part of a summary.
    pub recent_limit: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "Habitual".to_string(),
            confirm_timeout_secs: 30,
            recent_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Forces the local backend regardless of `backend`.  Overridden by the
    /// `USE_LOCAL_ONLY` environment variable when set.
    pub use_local_only: bool,
    pub data_dir: String,
    pub checkins_file: String,
    pub users_file: String,
    /// Project URL of the hosted database (the REST API lives under
    /// `/rest/v1`).  Can also be set via `SUPABASE_URL`.
    pub hosted_url: String,
    /// Service key for the hosted database.  Can also be set via
    /// `SUPABASE_SERVICE_ROLE` (env takes precedence).
    pub hosted_key: String,
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Hosted,
            use_local_only: false,
            data_dir: ".habitual".to_string(),
            checkins_file: "checkins.json".to_string(),
            users_file: "users.json".to_string(),
            hosted_url: String::new(),
            hosted_key: String::new(),
            request_timeout_secs: 10,
        }
    }
}

impl StorageConfig {
    pub fn checkins_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.checkins_file)
    }

    pub fn users_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.users_file)
    }

    /// The backend that will actually be opened: local when forced, when
    /// configured, or when hosted credentials are missing.
    pub fn effective_backend(&self) -> StorageBackend {
        if self.use_local_only
            || self.backend == StorageBackend::Local
            || self.hosted_url.trim().is_empty()
            || self.hosted_key.trim().is_empty()
        {
            StorageBackend::Local
        } else {
            StorageBackend::Hosted
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Overridden by `OPENAI_API_KEY` when set.
    pub openai_api_key: String,
    pub ollama_model: String,
    /// Base URL for the Ollama API.  Overridden at runtime by the
    /// `OLLAMA_BASE_URL` environment variable when set.
    pub ollama_base_url: String,
    pub reflect_max_tokens: u32,
    pub short_max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: String::new(),
            ollama_model: "llama3.1:8b".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            reflect_max_tokens: 200,
            short_max_tokens: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    pub enabled: bool,
    /// Period of the reminder sweep.  A reminder fires when its time falls in
    /// the last sweep period.
    pub sweep_interval_minutes: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub poll_timeout_secs: u64,
    pub max_message_chars: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 25,
            max_message_chars: 3500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub reminders: ReminderConfig,
    pub telegram: TelegramConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        config.apply_env_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.  Empty
    /// values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("USE_LOCAL_ONLY") {
            self.storage.use_local_only = value.trim().eq_ignore_ascii_case("true");
        }
        if let Some(url) = get("SUPABASE_URL") {
            self.storage.hosted_url = url;
        }
        if let Some(key) = get("SUPABASE_SERVICE_ROLE") {
            self.storage.hosted_key = key;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.openai_api_key = key;
        }
        if let Some(url) = get("OLLAMA_BASE_URL") {
            self.llm.ollama_base_url = url;
            self.llm.provider = "ollama".to_string();
        }
        if let Some(level) = get("HABITUAL_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }
    }

    /// Reject values the rest of the app cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CONFIRM_TIMEOUT_SECS).contains(&self.bot.confirm_timeout_secs) {
            bail!(
                "bot.confirm_timeout_secs must be between 1 and {MAX_CONFIRM_TIMEOUT_SECS}, got {}",
                self.bot.confirm_timeout_secs
            );
        }
        Ok(())
    }

    /// Model name for the selected provider.
        pub fn active_model(&self) -> &str {
        if self.llm.provider.eq_ignore_ascii_case("ollama") {
            &self.llm.ollama_model
        } else {
            &self.llm.openai_model
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
