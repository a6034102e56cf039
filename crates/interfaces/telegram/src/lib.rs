pub mod commands;
pub mod format;
pub mod handler;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{TimeDelta, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use habitual_config::AppConfig;
use habitual_llm::Coach;
use habitual_tracker::HabitTracker;

pub use commands::{Command, normalize_telegram_command};
pub use format::chunk_message;
pub use handler::{Handler, Sender};

/// Poll timeout while a confirmation is waiting, so expiry is noticed promptly.
const PENDING_POLL_TIMEOUT_SECS: u64 = 2;

pub async fn start_bot(config: &AppConfig, tracker: Arc<HabitTracker>, coach: Coach) -> Result<()> {
    let token = std::env::var("TELEGRAM_BOT_TOKEN")
        .map_err(|_| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is not set"))?;
    if token.trim().is_empty() {
        bail!("TELEGRAM_BOT_TOKEN is empty");
    }

    let client = Client::new();
    let base_url = format!("https://api.telegram.org/bot{}", token.trim());
    let max_chars = config.telegram.max_message_chars;
    let backend = tracker.store().backend_name();
    let mut handler = Handler::new(tracker.clone(), coach, config.bot.name.clone());
    let mut offset: i64 = 0;

    if config.reminders.enabled {
        let interval = Duration::from_secs(config.reminders.sweep_interval_minutes.max(1) * 60);
        tokio::spawn(run_reminders(
            tracker,
            client.clone(),
            base_url.clone(),
            interval,
            max_chars,
        ));
    }

    info!(backend, "telegram: listening for updates");

    loop {
        let poll_timeout = if handler.has_pending() {
            PENDING_POLL_TIMEOUT_SECS
        } else {
            config.telegram.poll_timeout_secs
        };

        let updates = match fetch_updates(&client, &base_url, offset, poll_timeout).await {
            Ok(u) => u,
            Err(err) => {
                let err_str = err.to_string();
                if err_str.contains("409") {
                    // Another instance is polling; back off and let it win.
                    warn!("telegram: 409 Conflict, another bot instance is running; waiting 15s");
                    tokio::time::sleep(Duration::from_secs(15)).await;
                } else {
                    warn!(error = %err, "telegram: getUpdates failed, retrying in 5s");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                continue;
            }
        };

        for update in updates {
            offset = update.update_id + 1;

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            let Some(from) = message.from else {
                continue;
            };

            let sender = Sender {
                chat_id: message.chat.id,
                user_id: from.id,
                display_name: from.display_name(),
            };

            let command = Command::parse(&text);
            let slow = matches!(command, Command::Reflect | Command::Rewrite(_) | Command::Idea);
            if slow {
                let _ = send_chat_action(&client, &base_url, sender.chat_id, "typing").await;
            }

            debug!(chat = sender.chat_id, user = sender.user_id, "telegram: message");
            let response = handler.handle(&sender, command, Utc::now()).await;
            send_chunked(&client, &base_url, sender.chat_id, &response, max_chars).await;
        }

        for (chat_id, notice) in handler.expire_pending(Utc::now()).await {
            send_chunked(&client, &base_url, chat_id, &notice, max_chars).await;
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
    }
}

/// Periodic sweep: message every user whose reminder fell in the last
/// interval and who has not checked in today.
async fn run_reminders(
    tracker: Arc<HabitTracker>,
    client: Client,
    base_url: String,
    interval: Duration,
    max_chars: usize,
) {
    let window = TimeDelta::from_std(interval).unwrap_or(TimeDelta::minutes(30));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let due = match tracker.due_reminders(Utc::now(), window).await {
            Ok(due) => due,
            Err(err) => {
                warn!(error = %err, "telegram: reminder sweep failed");
                continue;
            }
        };

        for user in due {
            let Ok(chat_id) = user.external_id.parse::<i64>() else {
                warn!(user = %user.external_id, "telegram: reminder target is not a chat id");
                continue;
            };
            send_chunked(&client, &base_url, chat_id, &format::reminder_message(), max_chars).await;
            info!(user = %user.external_id, "telegram: reminder sent");
        }
    }
}

async fn send_chunked(client: &Client, base_url: &str, chat_id: i64, text: &str, max_chars: usize) {
    for chunk in chunk_message(text, max_chars) {
        if let Err(err) = send_message(client, base_url, chat_id, &chunk).await {
            warn!(chat = chat_id, error = %err, "telegram: sendMessage failed");
        }
    }
}

async fn fetch_updates(
    client: &Client,
    base_url: &str,
    offset: i64,
    timeout_secs: u64,
) -> Result<Vec<TelegramUpdate>> {
    let url = format!("{base_url}/getUpdates");
    let response = client
        .get(url)
        .query(&[
            ("timeout", timeout_secs.to_string()),
            ("offset", offset.to_string()),
        ])
        .send()
        .await?
        .error_for_status()?;

    let payload: TelegramResponse<Vec<TelegramUpdate>> = response.json().await?;
    if !payload.ok {
        let description = payload
            .description
            .unwrap_or_else(|| "telegram getUpdates failed".to_string());
        bail!(description);
    }

    Ok(payload.result.unwrap_or_default())
}

async fn send_message(client: &Client, base_url: &str, chat_id: i64, text: &str) -> Result<()> {
    let url = format!("{base_url}/sendMessage");
    let body = SendMessageRequest {
        chat_id,
        text,
        disable_web_page_preview: true,
    };

    let response = client
        .post(url)
        .json(&body)
        .send()
        .await?
        .error_for_status()?;

    let payload: TelegramResponse<serde_json::Value> = response.json().await?;
    if !payload.ok {
        let description = payload
            .description
            .unwrap_or_else(|| "telegram sendMessage failed".to_string());
        bail!(description);
    }

    Ok(())
}

/// Best-effort `sendChatAction`; failures are ignored.
async fn send_chat_action(client: &Client, base_url: &str, chat_id: i64, action: &str) -> Result<()> {
    let url = format!("{base_url}/sendChatAction");
    let body = serde_json::json!({ "chat_id": chat_id, "action": action });
    let _ = client.post(url).json(&body).send().await;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    from: Option<TelegramUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    first_name: Option<String>,
    username: Option<String>,
}

impl TelegramUser {
    fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}
