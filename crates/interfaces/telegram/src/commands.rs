use habitual_tracker::ConfirmationEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Raw text after `/checkin`, parsed later into mood and message.
    Checkin(String),
    Summary,
    Timezone(Option<String>),
    RemindMe {
        time: Option<String>,
        zone: Option<String>,
    },
    StopReminder,
    Reflect,
    Rewrite(String),
    Idea,
    Confirm(ConfirmationEvent),
    Unknown(String),
    Text(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let line = normalize_telegram_command(text);

        if let Some(event) = ConfirmationEvent::from_reply(&line) {
            return Self::Confirm(event);
        }
        if !line.starts_with('/') {
            return Self::Text(line);
        }

        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line.as_str(), ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        match command.to_lowercase().as_str() {
            "/start" | "/help" | "/commands" => Self::Help,
            "/checkin" => Self::Checkin(rest.to_string()),
            "/summary" => Self::Summary,
            "/timezone" => Self::Timezone(arg),
            "/remindme" => {
                let mut parts = rest.split_whitespace();
                Self::RemindMe {
                    time: parts.next().map(ToString::to_string),
                    zone: parts.next().map(ToString::to_string),
                }
            }
            "/stopreminder" => Self::StopReminder,
            "/reflect" => Self::Reflect,
            "/rewrite" => Self::Rewrite(rest.to_string()),
            "/idea" => Self::Idea,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Trim and drop the `@botname` suffix Telegram appends to commands in groups.
pub fn normalize_telegram_command(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return trimmed.to_string();
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();

    let command = command
        .split_once('@')
        .map(|(base, _)| base)
        .unwrap_or(command);

    if rest.is_empty() {
        command.to_string()
    } else {
        format!("{command} {rest}")
    }
}
