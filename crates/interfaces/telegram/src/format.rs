//! Reply text for chat and terminal surfaces.

use std::fmt::Write as _;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;

use habitual_store::{Checkin, Mood};
use habitual_tracker::{CheckinInput, OverrideOutcome, ReminderSetting, Stats, shortcut_names};

/// Recent entries shown in a summary.
pub const SUMMARY_RECENT: usize = 3;

pub const AI_NOT_CONFIGURED: &str =
    "🤖 AI features aren't configured yet. The bot admin needs to add an OpenAI API key!";
pub const REFLECT_NO_HISTORY: &str =
    "🤖 You haven't checked in yet! Try /checkin first, then I can give you some perspective.";
pub const REFLECT_FAILED: &str =
    "🤖 Couldn't generate reflection right now. The AI is probably having a moment.";
pub const REWRITE_USAGE: &str = "✍️ Tell me the thought to reframe, e.g. /rewrite I never finish anything";
pub const REWRITE_FAILED: &str = "🤖 Couldn't rewrite that right now. Sometimes the AI needs a break too.";
pub const IDEA_FAILED: &str = "💡 The idea generator is taking a nap. Try again in a bit!";
pub const CHECKIN_FAILED: &str = "❌ Something went wrong with your check-in. Try again?";
pub const NOTHING_TO_CONFIRM: &str = "🤷 There's nothing waiting for confirmation.";
pub const UNKNOWN_COMMAND: &str = "unknown command. use /help";
pub const REMINDER_STOPPED: &str =
    "🔕 Daily reminders stopped. You can set them again with /remindme HH:MM";
pub const REMINDER_USAGE: &str = "🕐 Please specify a time! Examples:\n\
/remindme 20:00 CET - 8 PM Central European Time\n\
/remindme 9 EST - 9 AM Eastern Time\n\
/remindme 14:30 - 2:30 PM in your current timezone";

pub fn mood_emoji(mood: Mood) -> &'static str {
    match mood.value() {
        1 => "😔",
        2 => "😕",
        3 => "😐",
        4 => "😊",
        _ => "😄",
    }
}

/// `4/5 😊`
pub fn mood_short(mood: Mood) -> String {
    format!("{}/5 {}", mood.value(), mood_emoji(mood))
}

/// `4/5 😊 (good)`
pub fn mood_long(mood: Mood) -> String {
    format!("{} ({})", mood_short(mood), mood.label())
}

fn entry_brief(mood: Option<Mood>, message: Option<&str>) -> String {
    let mut text = String::new();
    if let Some(mood) = mood {
        text.push_str(&mood_short(mood));
        text.push(' ');
    }
    if let Some(message) = message {
        let _ = write!(text, "\"{message}\"");
    }
    let text = text.trim_end().to_string();
    if text.is_empty() {
        "simple check-in".to_string()
    } else {
        text
    }
}

fn entry_details(out: &mut String, mood_heading: &str, mood: Option<Mood>, message: Option<&str>) {
    if let Some(mood) = mood {
        let _ = write!(out, "\n🎭 {mood_heading}: {}", mood_long(mood));
    }
    if let Some(message) = message {
        let _ = write!(out, "\n💭 \"{message}\"");
    }
}

pub fn checkin_recorded(checkin: &Checkin) -> String {
    let mut out = String::from("✅ Checked in for today!");
    entry_details(&mut out, "Mood", checkin.mood, checkin.message.as_deref());
    out.push_str("\n\nNice work showing up! 🌱");
    out
}

pub fn override_prompt(existing: &Checkin, proposed: &CheckinInput, timeout: TimeDelta) -> String {
    let timeout_secs = timeout.num_seconds();
    format!(
        "🤔 You already checked in today!\n\n\
Current: {}\n\
New: {}\n\n\
Do you want to override your existing check-in?\n\
/yes (✅) = update it\n\
/no (❌) = keep the original\n\n\
This expires in {timeout_secs} seconds.",
        entry_brief(existing.mood, existing.message.as_deref()),
        entry_brief(proposed.mood, proposed.message.as_deref()),
    )
}

pub fn override_outcome(outcome: OverrideOutcome, proposed: &CheckinInput) -> String {
    match outcome {
        OverrideOutcome::Overwritten => {
            let mut out = String::from("✅ Updated your check-in for today!");
            entry_details(&mut out, "New mood", proposed.mood, proposed.message.as_deref());
            out.push_str("\n\nNice work staying mindful! 🌱");
            out
        }
        OverrideOutcome::Declined => "👍 Keeping your original check-in. No changes made!".to_string(),
        OverrideOutcome::TimedOut => "⏰ Confirmation timed out. Keeping your original check-in!".to_string(),
        OverrideOutcome::Missing => "❌ Something went wrong updating your check-in. Try again?".to_string(),
    }
}

pub fn summary(stats: &Stats) -> String {
    let mut out = String::from("📊 Your Habit Summary\n\n");
    let _ = writeln!(out, "Total check-ins: {}", stats.total);
    let _ = writeln!(out, "Current streak: {} days", stats.current_streak);
    let _ = write!(out, "Best streak: {} days", stats.best_streak);

    if !stats.recent.is_empty() {
        out.push_str("\n\nRecent check-ins:");
        for checkin in stats.recent.iter().take(SUMMARY_RECENT) {
            let _ = write!(
                out,
                "\n{}: {}",
                checkin.date,
                checkin.message.as_deref().unwrap_or("No message")
            );
            if let Some(mood) = checkin.mood {
                let _ = write!(out, " ({})", mood_short(mood));
            }
        }
    }
    out
}

pub fn timezone_current(tz: Option<Tz>, now: DateTime<Utc>) -> String {
    match tz {
        Some(tz) => format!(
            "🌍 Your timezone: {}\nLocal time: {}\n\nCheck-ins reset at midnight in your local time! 🕛",
            tz.name(),
            now.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
        ),
        None => "🌍 No timezone set. Using UTC.\n\n\
Set your timezone with: /timezone Europe/Stockholm or /timezone CET"
            .to_string(),
    }
}

pub fn timezone_set(tz: Tz, now: DateTime<Utc>) -> String {
    format!(
        "🌍 Timezone set to {}!\nYour local time: {}\n\n✨ Check-ins now reset at midnight in your local time!",
        tz.name(),
        now.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
    )
}

pub fn unknown_timezone(input: &str) -> String {
    let shortcuts: Vec<_> = shortcut_names().collect();
    format!(
        "❌ Unknown timezone: {input}\n\n\
Supported shortcuts: {}\n\
Or use full names: Europe/Stockholm, US/Eastern, Asia/Tokyo",
        shortcuts.join(", ")
    )
}

pub fn reminder_set(setting: &ReminderSetting) -> String {
    format!(
        "⏰ Daily reminder set for {} {}!\n\n\
I'll send you a message if you haven't checked in by then. 🌱\n\n\
Stored as {} UTC internally",
        setting.local_time.format("%H:%M"),
        setting.timezone.name(),
        setting.utc_time.format("%H:%M"),
    )
}

pub fn invalid_reminder_time(reason: &str) -> String {
    format!("❌ Invalid time: {reason}\n\n{REMINDER_USAGE}")
}

pub fn reminder_message() -> String {
    "🌱 Gentle Reminder\n\n\
Hey there! Just checking in, you haven't logged your daily check-in yet.\n\n\
Just send /checkin, or add a message like /checkin had a good day!\n\n\
Consistency isn't about perfection. Even checking in with 'struggled today' counts as showing up. 💚\n\n\
Use /stopreminder if you want to turn these off."
        .to_string()
}

pub fn reflection(text: &str) -> String {
    format!("🤖 Reflection:\n{text}")
}

pub fn reframed(text: &str) -> String {
    format!("🤖 Reframed:\n{text}")
}

pub fn idea(text: &str) -> String {
    format!("💡 Small idea:\n{text}")
}

pub fn help_text(bot_name: &str) -> String {
    [
        format!("🌱 {bot_name}: your gentle companion for building consistency"),
        String::new(),
        "📝 Basics".to_string(),
        "/checkin [mood] [message] - log today's check-in".to_string(),
        "/summary - stats and recent entries".to_string(),
        "/timezone [zone] - show or set your timezone".to_string(),
        "/remindme 20:00 CET - daily reminder".to_string(),
        "/stopreminder - turn off reminders".to_string(),
        String::new(),
        "🎭 Mood examples".to_string(),
        "/checkin - simple check-in".to_string(),
        "/checkin 4 - mood only (4/5 😊)".to_string(),
        "/checkin 3 had an okay day - mood + message".to_string(),
        "/checkin feeling great! - message only".to_string(),
        String::new(),
        "🤖 AI".to_string(),
        "/reflect - perspective on your progress".to_string(),
        "/rewrite [text] - reframe a negative thought".to_string(),
        "/idea - a small habit-building suggestion".to_string(),
    ]
    .join("\n")
}

/// Split long replies on line boundaries to fit Telegram's message limit.
/// A single line longer than the limit is cut between characters.
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for piece in text.lines().flat_map(|line| split_line(line, max_chars)) {
        let piece_len = piece.chars().count() + 1;
        if current_len > 0 && current_len + piece_len > max_chars {
            chunks.push(current.trim_end().to_string());
            current.clear();
            current_len = 0;
        }
        current.push_str(piece);
        current.push('\n');
        current_len += piece_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }

    if chunks.is_empty() {
        chunks.push(text.to_string());
    }
    chunks
}

/// `line` cut into pieces of at most `max_chars` characters.
fn split_line(line: &str, max_chars: usize) -> Vec<&str> {
    if line.is_empty() {
        return vec![line];
    }
    let mut pieces = Vec::new();
    let mut rest = line;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(index, _)| index);
        let (piece, tail) = rest.split_at(end);
        pieces.push(piece);
        rest = tail;
    }
    pieces
}
