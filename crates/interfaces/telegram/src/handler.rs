use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use habitual_llm::Coach;
use habitual_store::User;
use habitual_tracker::{
    CheckinInput, ConfirmationEvent, HabitTracker, PendingOverride, SubmitOutcome, TrackerError,
};

use crate::commands::Command;
use crate::format;

/// Who sent a message.  In a private chat `chat_id == user_id`.
#[derive(Debug, Clone)]
pub struct Sender {
    pub chat_id: i64,
    pub user_id: i64,
    pub display_name: String,
}

type ConversationKey = (i64, i64);

/// Per-bot command dispatcher.  Holds confirmations that are waiting on a
/// `/yes` or `/no`, one per user per chat.
pub struct Handler {
    tracker: Arc<HabitTracker>,
    coach: Coach,
    bot_name: String,
    pending: HashMap<ConversationKey, PendingOverride>,
}

impl Handler {
    pub fn new(tracker: Arc<HabitTracker>, coach: Coach, bot_name: impl Into<String>) -> Self {
        Self {
            tracker,
            coach,
            bot_name: bot_name.into(),
            pending: HashMap::new(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Handle one parsed message and produce the reply.  Errors are logged and
    /// turned into a generic apology.
    pub async fn handle(&mut self, from: &Sender, command: Command, now: DateTime<Utc>) -> String {
        match self.dispatch(from, command, now).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(chat = from.chat_id, user = from.user_id, error = %err, "telegram: handler error");
                "❌ Something went wrong. Try again?".to_string()
            }
        }
    }

    /// Resolve confirmations whose deadline has passed.  Returns the chats
    /// to notify and the message for each.
    pub async fn expire_pending(&mut self, now: DateTime<Utc>) -> Vec<(i64, String)> {
        let expired: Vec<ConversationKey> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.is_expired(now))
            .map(|(key, _)| *key)
            .collect();

        let mut notices = Vec::with_capacity(expired.len());
        for key in expired {
            let Some(pending) = self.pending.remove(&key) else {
                continue;
            };
            match self
                .tracker
                .resolve_confirmation(&pending, ConfirmationEvent::Timeout, now)
                .await
            {
                Ok(outcome) => notices.push((key.0, format::override_outcome(outcome, &pending.proposed))),
                Err(err) => warn!(chat = key.0, error = %err, "telegram: timeout resolution failed"),
            }
        }
        notices
    }

    async fn dispatch(&mut self, from: &Sender, command: Command, now: DateTime<Utc>) -> Result<String> {
        let key = (from.chat_id, from.user_id);

        let command = match command {
            Command::Help => return Ok(format::help_text(&self.bot_name)),
            Command::Unknown(name) => {
                debug!(command = %name, "telegram: unknown command");
                return Ok(format::UNKNOWN_COMMAND.to_string());
            }
            Command::Text(_) => {
                return Ok("Send /checkin to log today, or /help for everything else.".to_string());
            }
            Command::Confirm(event) => {
                let Some(pending) = self.pending.remove(&key) else {
                    return Ok(format::NOTHING_TO_CONFIRM.to_string());
                };
                let outcome = self.tracker.resolve_confirmation(&pending, event, now).await?;
                return Ok(format::override_outcome(outcome, &pending.proposed));
            }
            other => other,
        };

        let user = self
            .tracker
            .resolve_user(&from.user_id.to_string(), &from.display_name)
            .await?;

        match command {
            Command::Checkin(raw) => Ok(self.checkin(key, &user, &raw, now).await),
            Command::Summary => Ok(format::summary(&self.tracker.compute_stats(&user, now).await)),
            Command::Timezone(None) => {
                let tz = self.tracker.store().get_user_timezone(&user.external_id).await?;
                let tz = tz.and_then(|name| name.parse().ok());
                Ok(format::timezone_current(tz, now))
            }
            Command::Timezone(Some(zone)) => match self.tracker.set_timezone(&user, &zone).await {
                Ok(tz) => Ok(format::timezone_set(tz, now)),
                Err(TrackerError::InvalidTimezone { input }) => Ok(format::unknown_timezone(&input)),
                Err(err) => Err(err.into()),
            },
            Command::RemindMe { time: None, .. } => Ok(format::REMINDER_USAGE.to_string()),
            Command::RemindMe {
                time: Some(time),
                zone,
            } => match self
                .tracker
                .set_reminder(&user, &time, zone.as_deref(), now)
                .await
            {
                Ok(setting) => Ok(format::reminder_set(&setting)),
                Err(TrackerError::InvalidTimezone { input }) => Ok(format::unknown_timezone(&input)),
                Err(TrackerError::InvalidReminderTime { reason, .. }) => {
                    Ok(format::invalid_reminder_time(&reason))
                }
                Err(err) => Err(err.into()),
            },
            Command::StopReminder => {
                self.tracker.clear_reminder(&user).await?;
                Ok(format::REMINDER_STOPPED.to_string())
            }
            Command::Reflect => Ok(self.reflect(&user, now).await),
            Command::Rewrite(text) => Ok(self.rewrite(&text).await),
            Command::Idea => Ok(self.idea().await),
            Command::Help | Command::Unknown(_) | Command::Text(_) | Command::Confirm(_) => {
                Ok(format::UNKNOWN_COMMAND.to_string())
            }
        }
    }

    async fn checkin(&mut self, key: ConversationKey, user: &User, raw: &str, now: DateTime<Utc>) -> String {
        let input = CheckinInput::parse(raw);
        match self.tracker.submit_checkin(user, input, now).await {
            Ok(SubmitOutcome::Created(checkin)) => format::checkin_recorded(&checkin),
            Ok(SubmitOutcome::ConflictsWith(pending)) => {
                let reply = format::override_prompt(
                    &pending.existing,
                    &pending.proposed,
                    self.tracker.confirm_timeout(),
                );
                self.pending.insert(key, *pending);
                reply
            }
            Err(err) => {
                warn!(user = %user.external_id, error = %err, "telegram: check-in failed");
                format::CHECKIN_FAILED.to_string()
            }
        }
    }

    async fn reflect(&self, user: &User, now: DateTime<Utc>) -> String {
        if !self.coach.is_configured() {
            return format::AI_NOT_CONFIGURED.to_string();
        }
        let stats = self.tracker.compute_stats(user, now).await;
        if stats.total == 0 {
            return format::REFLECT_NO_HISTORY.to_string();
        }
        match self.coach.reflect(&stats).await {
            Ok(text) => format::reflection(&text),
            Err(err) => {
                warn!(error = %err, "telegram: reflection failed");
                format::REFLECT_FAILED.to_string()
            }
        }
    }

    async fn rewrite(&self, thought: &str) -> String {
        if thought.trim().is_empty() {
            return format::REWRITE_USAGE.to_string();
        }
        if !self.coach.is_configured() {
            return format::AI_NOT_CONFIGURED.to_string();
        }
        match self.coach.rewrite(thought).await {
            Ok(text) => format::reframed(&text),
            Err(err) => {
                warn!(error = %err, "telegram: rewrite failed");
                format::REWRITE_FAILED.to_string()
            }
        }
    }

    async fn idea(&self) -> String {
        if !self.coach.is_configured() {
            return format::AI_NOT_CONFIGURED.to_string();
        }
        match self.coach.idea().await {
            Ok(text) => format::idea(&text),
            Err(err) => {
                warn!(error = %err, "telegram: idea failed");
                format::IDEA_FAILED.to_string()
            }
        }
    }
}
