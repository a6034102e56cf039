use habitual_store::Mood;

/// What a user submitted with a check-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckinInput {
    pub mood: Option<Mood>,
    pub message: Option<String>,
}

impl CheckinInput {
    pub fn new(mood: Option<Mood>, message: Option<String>) -> Self {
        let message = message.filter(|m| !m.trim().is_empty());
        Self { mood, message }
    }

    /// Split raw command text into mood and message.
    ///
    /// The first token is taken as the mood when it is an integer in 1–5 and
    /// the remainder becomes the message.  Anything else (a word, `0`, `7`)
    /// leaves the mood unset and keeps the whole text as the message.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        let (first, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((first, rest)) => (first, rest.trim()),
            None => (trimmed, ""),
        };

        match first.parse::<i64>().ok().and_then(Mood::new) {
            Some(mood) => Self::new(Some(mood), Some(rest.to_string())),
            None => Self::new(None, Some(trimmed.to_string())),
        }
    }
}
