use std::fmt::Write as _;

use anyhow::Result;

use habitual_config::LlmConfig;
use habitual_tracker::Stats;

use crate::{ChatMessage, LlmRouter};

pub const SYSTEM_PROMPT: &str = "\
You are a compassionate but realistic habit coach.

Your tone is:
- Encouraging, never toxic positivity
- Honest about struggles without being harsh
- Accepting of human imperfection
- Focused on progress, not perfection
- Clear that building habits is genuinely hard

Avoid:
- Generic motivational quotes
- Shame or judgment for missed days
- Unrealistic expectations
- Corporate wellness speak

Keep responses concise (2-3 sentences max) and conversational.";

pub const REWRITE_GUIDANCE: &str = "\
Reframe the user's negative self-talk in a more compassionate, realistic way. \
Don't dismiss their feelings, but help them see a more balanced perspective.";

pub const IDEA_GUIDANCE: &str = "\
Suggest a small, actionable habit-building idea. Keep it simple and achievable. \
Focus on tiny steps that build momentum.";

pub const IDEA_REQUEST: &str = "Give me a small idea for building better habits or self-care.";

/// User turn for a reflection: totals, streaks and up to five recent entries.
pub fn reflection_prompt(stats: &Stats) -> String {
    let mut prompt = String::from("Give me some perspective on my habit tracking progress.\n\n");
    let _ = writeln!(prompt, "Total check-ins: {}", stats.total);
    let _ = writeln!(prompt, "Current streak: {} days", stats.current_streak);
    let _ = writeln!(prompt, "Best streak: {} days", stats.best_streak);

    if !stats.recent.is_empty() {
        prompt.push_str("\nRecent check-ins:\n");
        for checkin in stats.recent.iter().take(5) {
            let _ = write!(prompt, "- {}:", checkin.date);
            if let Some(mood) = checkin.mood {
                let _ = write!(prompt, " mood {}/5 ({})", mood.value(), mood.label());
            }
            match checkin.message.as_deref() {
                Some(message) => {
                    let _ = writeln!(prompt, " {message}");
                }
                None => prompt.push_str(" no message\n"),
            }
        }
    }
    prompt
}

pub fn rewrite_prompt(text: &str) -> String {
    format!("Help me reframe this thought: {}", text.trim())
}

/// Short coaching replies on top of [`LlmRouter`].
#[derive(Debug, Clone)]
pub struct Coach {
    router: LlmRouter,
    reflect_max_tokens: u32,
    short_max_tokens: u32,
}

impl Coach {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            router: LlmRouter::from_config(config)?,
            reflect_max_tokens: config.reflect_max_tokens,
            short_max_tokens: config.short_max_tokens,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.router.is_configured()
    }

    pub async fn reflect(&self, stats: &Stats) -> Result<String> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(reflection_prompt(stats)),
        ];
        let (_, text) = self.router.chat(&messages, self.reflect_max_tokens).await?;
        Ok(text)
    }

    pub async fn rewrite(&self, thought: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(format!("{SYSTEM_PROMPT}\n\n{REWRITE_GUIDANCE}")),
            ChatMessage::user(rewrite_prompt(thought)),
        ];
        let (_, text) = self.router.chat(&messages, self.short_max_tokens).await?;
        Ok(text)
    }

    pub async fn idea(&self) -> Result<String> {
        let messages = [
            ChatMessage::system(format!("{SYSTEM_PROMPT}\n\n{IDEA_GUIDANCE}")),
            ChatMessage::user(IDEA_REQUEST),
        ];
        let (_, text) = self.router.chat(&messages, self.short_max_tokens).await?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use habitual_store::{Checkin, Mood};

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn reflection_prompt_lists_stats_and_recent_entries() {
        let stats = Stats {
            total: 12,
            current_streak: 3,
            best_streak: 7,
            recent: vec![
                Checkin::new(day(3), Some("went for a walk".into()), Mood::new(4), Utc::now()),
                Checkin::new(day(2), None, Mood::new(1), Utc::now()),
                Checkin::new(day(1), Some("tired".into()), None, Utc::now()),
            ],
        };
        let prompt = reflection_prompt(&stats);

        assert!(prompt.contains("Total check-ins: 12"));
        assert!(prompt.contains("Current streak: 3 days"));
        assert!(prompt.contains("Best streak: 7 days"));
        assert!(prompt.contains("- 2024-03-03: mood 4/5 (good) went for a walk"));
        assert!(prompt.contains("- 2024-03-02: mood 1/5 (struggling) no message"));
        assert!(prompt.contains("- 2024-03-01: tired"));
    }

    #[test]
    fn reflection_prompt_caps_recent_at_five() {
        let stats = Stats {
            total: 8,
            current_streak: 8,
            best_streak: 8,
            recent: (1..=8)
                .rev()
                .map(|d| Checkin::new(day(d), Some(format!("entry {d}")), None, Utc::now()))
                .collect(),
        };
        let prompt = reflection_prompt(&stats);
        assert!(prompt.contains("entry 8"));
        assert!(prompt.contains("entry 4"));
        assert!(!prompt.contains("entry 3"));
    }

    #[test]
    fn reflection_prompt_without_history() {
        let prompt = reflection_prompt(&Stats::default());
        assert!(prompt.contains("Total check-ins: 0"));
        assert!(!prompt.contains("Recent check-ins"));
    }

    #[test]
    fn rewrite_prompt_trims_input() {
        assert_eq!(
            rewrite_prompt("  I never finish anything \n"),
            "Help me reframe this thought: I never finish anything"
        );
    }

    #[test]
    fn coach_without_key_is_not_configured() {
        let coach = Coach::from_config(&LlmConfig::default()).unwrap();
        assert!(!coach.is_configured());
    }

    #[tokio::test]
    async fn unconfigured_coach_errors_instead_of_calling_out() {
        let coach = Coach::from_config(&LlmConfig {
            openai_base_url: "http://127.0.0.1:9".into(),
            ..LlmConfig::default()
        })
        .unwrap();
        assert!(coach.idea().await.is_err());
    }
}
